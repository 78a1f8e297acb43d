// Longest-valid-chain conflict resolution and peer fan-out.

use futures::future::join_all;
use log::{info, warn};

use std::time::Duration;

use super::client::{PeerClient, PeerError};
use crate::blockchain::{Block, BlockChain};

async fn fetch_with_timeout(
    client: &dyn PeerClient,
    peer: &str,
    timeout: Duration,
) -> Result<Vec<Block>, PeerError> {
    tokio::time::timeout(timeout, client.fetch_chain(peer))
        .await
        .unwrap_or(Err(PeerError::Timeout(timeout)))
}

/// Polls every peer and adopts the longest valid chain that beats ours.
///
/// Unreachable peers and invalid chains are skipped.
///
/// # Arguments
///
/// * `blockchain` - The local ledger
/// * `peers` - Neighbor `host:port` addresses
/// * `client` - Transport used to fetch each neighbor's chain
/// * `timeout` - Upper bound for every single fetch
///
/// # Returns
///
/// True if the local chain was replaced
pub async fn resolve_conflicts(
    blockchain: &BlockChain,
    peers: &[String],
    client: &dyn PeerClient,
    timeout: Duration,
) -> bool {
    let fetches = peers
        .iter()
        .map(|peer| fetch_with_timeout(client, peer, timeout));
    let responses = join_all(fetches).await;

    let mut max_length = blockchain.chain().len();
    let mut longest_chain: Option<Vec<Block>> = None;

    for (peer, response) in peers.iter().zip(responses) {
        let chain = match response {
            Ok(chain) => chain,
            Err(err) => {
                warn!("skipping peer {}: {}", peer, err);
                continue;
            }
        };

        if chain.len() <= max_length {
            continue;
        }
        if !blockchain.valid_chain(&chain) {
            warn!("peer {} sent an invalid chain of length {}", peer, chain.len());
            continue;
        }

        max_length = chain.len();
        longest_chain = Some(chain);
    }

    if let Some(chain) = longest_chain {
        if blockchain.replace_chain(chain) {
            info!(
                "Resolve conflicts replaced, height={}, tip={}",
                max_length - 1,
                blockchain.last_block().hash()
            );
            return true;
        }
    }

    info!("Resolve conflicts not replaced");
    false
}

/// Asks every peer to resolve conflicts. Failures are logged and otherwise ignored.
pub async fn notify_peers(peers: &[String], client: &dyn PeerClient, timeout: Duration) {
    let calls = peers.iter().map(|peer| async move {
        let result = tokio::time::timeout(timeout, client.notify_consensus(peer))
            .await
            .unwrap_or(Err(PeerError::Timeout(timeout)));
        (peer, result)
    });

    for (peer, result) in join_all(calls).await {
        match result {
            Ok(()) => info!("notified {} of new block", peer),
            Err(err) => warn!("failed to notify {}: {}", peer, err),
        }
    }
}
