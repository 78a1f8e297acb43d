use futures::future::join_all;
use log::{debug, info};
use tokio::net::TcpStream;

use std::net::Ipv4Addr;
use std::ops::RangeInclusive;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

/// Where to look for neighbors
#[derive(Debug, Clone)]
pub struct ScanRange {
    /// Our own host; candidates vary its last octet
    pub host: Ipv4Addr,

    /// Our own port, so we can skip ourselves
    pub port: u16,

    /// Offsets added to the last octet of `host`
    pub ip_offsets: RangeInclusive<u8>,

    /// Ports probed on every candidate host
    pub ports: RangeInclusive<u16>,

    /// How long a single TCP probe may take
    pub probe_timeout: Duration,
}

/// Every `host:port` in the scan range except our own
pub fn candidate_targets(range: &ScanRange) -> Vec<String> {
    let own = format!("{}:{}", range.host, range.port);
    let [a, b, c, last] = range.host.octets();

    let mut targets = Vec::new();
    for port in range.ports.clone() {
        for offset in range.ip_offsets.clone() {
            let Some(octet) = last.checked_add(offset) else {
                continue;
            };
            let target = format!("{}:{}", Ipv4Addr::new(a, b, c, octet), port);
            if target != own {
                targets.push(target);
            }
        }
    }
    targets
}

/// True if something accepts TCP connections at `target` within `timeout`
pub async fn is_found_host(target: &str, timeout: Duration) -> bool {
    match tokio::time::timeout(timeout, TcpStream::connect(target)).await {
        Ok(Ok(_)) => true,
        Ok(Err(err)) => {
            debug!("probe {} failed: {}", target, err);
            false
        }
        Err(_) => false,
    }
}

/// Probes every candidate concurrently and returns the ones that answered
pub async fn find_neighbors(range: &ScanRange) -> Vec<String> {
    let targets = candidate_targets(range);
    let probes = targets
        .iter()
        .map(|target| is_found_host(target, range.probe_timeout));
    let found = join_all(probes).await;

    targets
        .into_iter()
        .zip(found)
        .filter_map(|(target, up)| up.then_some(target))
        .collect()
}

/// The current neighbor set.
///
/// Readers get a cheap snapshot. Rescans are single-flight and never hold the
/// list lock while probing.
#[derive(Debug, Default)]
pub struct Neighbors {
    peers: RwLock<Arc<Vec<String>>>,
    sync_lock: tokio::sync::Mutex<()>,
}

impl Neighbors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Arc<Vec<String>> {
        let peers = self.peers.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&peers)
    }

    pub fn set(&self, peers: Vec<String>) {
        let mut current = self.peers.write().unwrap_or_else(PoisonError::into_inner);
        *current = Arc::new(peers);
    }

    /// Rescans `range` and replaces the neighbor set with what answered
    pub async fn sync(&self, range: &ScanRange) -> Arc<Vec<String>> {
        let _guard = self.sync_lock.lock().await;

        let found = find_neighbors(range).await;
        info!("neighbors: {:?}", found);
        self.set(found);

        self.snapshot()
    }
}
