use log::{error, info};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::blockchain::BlockChain;
use crate::config::NodeConfig;
use crate::network::{notify_peers, resolve_conflicts, Neighbors, PeerClient};

/// A running node: its ledger, its neighbors and the background loops that
/// keep both fresh.
///
/// Cloning is cheap and every clone drives the same node.
#[derive(Clone)]
pub struct Node {
    blockchain: Arc<BlockChain>,
    neighbors: Arc<Neighbors>,
    client: Arc<dyn PeerClient>,
    config: Arc<NodeConfig>,
    mining_started: Arc<AtomicBool>,
    shutdown: Arc<watch::Sender<bool>>,
}

impl Node {
    /// Creates a node with a fresh ledger and an empty neighbor set
    ///
    /// # Arguments
    ///
    /// * `config` - Node settings
    /// * `blockchain_address` - Address credited with mining rewards
    /// * `client` - Transport for neighbor calls
    pub fn new(config: NodeConfig, blockchain_address: &str, client: Arc<dyn PeerClient>) -> Self {
        let blockchain = BlockChain::new(blockchain_address, config.mining_difficulty);
        let (shutdown, _) = watch::channel(false);

        Node {
            blockchain: Arc::new(blockchain),
            neighbors: Arc::new(Neighbors::new()),
            client,
            config: Arc::new(config),
            mining_started: Arc::new(AtomicBool::new(false)),
            shutdown: Arc::new(shutdown),
        }
    }

    pub fn blockchain(&self) -> &BlockChain {
        &self.blockchain
    }

    /// Initial neighbor scan, the periodic rescan loop, then one round of
    /// conflict resolution
    pub async fn start(&self) {
        self.sync_neighbors().await;

        let node = self.clone();
        let interval = self.config.neighbor_sync_interval();
        self.spawn_periodic("neighbor sync", interval, interval, move || {
            let node = node.clone();
            async move {
                node.sync_neighbors().await;
            }
        });

        self.resolve_conflicts().await;
    }

    /// Stops the background loops. A mining round already in progress finishes first.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    pub async fn sync_neighbors(&self) {
        self.neighbors.sync(&self.config.scan_range()).await;
    }

    /// Mines one block from the pool and tells every neighbor about it
    pub async fn mine(&self) -> bool {
        let blockchain = Arc::clone(&self.blockchain);

        // Proof of work is CPU-bound and holds the ledger lock
        let mined = match tokio::task::spawn_blocking(move || blockchain.mining()).await {
            Ok(block) => block,
            Err(err) => {
                error!("mining task failed: {}", err);
                None
            }
        };

        if mined.is_none() {
            return false;
        }

        let peers = self.neighbors.snapshot();
        notify_peers(&peers, self.client.as_ref(), self.config.peer_timeout()).await;
        true
    }

    /// Starts mining immediately and then every mining interval.
    ///
    /// Calling this while the loop already runs does nothing.
    pub fn start_mining(&self) {
        if self.mining_started.swap(true, Ordering::SeqCst) {
            return;
        }

        let node = self.clone();
        self.spawn_periodic("mining", Duration::ZERO, self.config.mining_interval(), move || {
            let node = node.clone();
            async move {
                node.mine().await;
            }
        });
    }

    pub async fn resolve_conflicts(&self) -> bool {
        let peers = self.neighbors.snapshot();
        let timeout = self.config.peer_timeout();
        resolve_conflicts(&self.blockchain, &peers, self.client.as_ref(), timeout).await
    }

    /// Runs `task` after `first_delay` and then again `interval` after each run
    /// finishes, until shutdown.
    fn spawn_periodic<F, Fut>(
        &self,
        name: &'static str,
        first_delay: Duration,
        interval: Duration,
        mut task: F,
    ) -> JoinHandle<()>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut shutdown = self.shutdown.subscribe();

        tokio::spawn(async move {
            let mut delay = first_delay;
            loop {
                if *shutdown.borrow() {
                    break;
                }

                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = shutdown.changed() => break,
                }

                task().await;
                delay = interval;
            }
            info!("{} loop stopped", name);
        })
    }
}
