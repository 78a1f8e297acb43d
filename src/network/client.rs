use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use std::time::Duration;

use crate::blockchain::Block;

/// A node's full chain as served on `GET /` and fetched by its neighbors
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ChainResponse {
    /// The blocks in the chain, genesis first
    pub blocks: Vec<Block>,
}

/// Errors that can occur while talking to a neighbor
#[derive(Debug, Error)]
pub enum PeerError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Unexpected status: {0}")]
    Status(StatusCode),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),
}

/// Calls a node makes against its neighbors
#[async_trait]
pub trait PeerClient: Send + Sync {
    /// Fetches the full chain a neighbor currently holds
    async fn fetch_chain(&self, peer: &str) -> Result<Vec<Block>, PeerError>;

    /// Asks a neighbor to run conflict resolution
    async fn notify_consensus(&self, peer: &str) -> Result<(), PeerError>;
}

/// `PeerClient` over the node HTTP API
#[derive(Debug, Clone)]
pub struct HttpPeerClient {
    client: reqwest::Client,
}

impl HttpPeerClient {
    pub fn new(timeout: Duration) -> Result<Self, PeerError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(HttpPeerClient { client })
    }
}

#[async_trait]
impl PeerClient for HttpPeerClient {
    async fn fetch_chain(&self, peer: &str) -> Result<Vec<Block>, PeerError> {
        let response = self.client.get(format!("http://{}/", peer)).send().await?;
        if !response.status().is_success() {
            return Err(PeerError::Status(response.status()));
        }

        let body: ChainResponse = response.json().await?;
        Ok(body.blocks)
    }

    async fn notify_consensus(&self, peer: &str) -> Result<(), PeerError> {
        let response = self
            .client
            .put(format!("http://{}/consensus", peer))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(PeerError::Status(response.status()));
        }

        Ok(())
    }
}
