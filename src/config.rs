use clap::builder::RangedU64ValueParser;
use clap::Parser;

use std::net::Ipv4Addr;
use std::time::Duration;

use crate::blockchain::MINING_DIFFICULTY;
use crate::network::ScanRange;

/// A SHA-256 digest has 64 hex characters; more leading zeros can never be found
const MAX_MINING_DIFFICULTY: u64 = 64;

/// Node settings, read from flags first and environment variables second
#[derive(Debug, Clone, Parser)]
#[command(name = "pow_ledger", about = "Proof-of-work ledger node")]
pub struct NodeConfig {
    /// TCP port for the node HTTP API
    #[arg(long, env = "PORT", default_value_t = 5000)]
    pub port: u16,

    /// IPv4 address this node is reachable on; also the base of the neighbor scan
    #[arg(long, env = "HOST", default_value = "127.0.0.1")]
    pub host: Ipv4Addr,

    /// Leading hex zeros required in a block hash (0 to 64)
    #[arg(
        long,
        env = "MINING_DIFFICULTY",
        default_value_t = MINING_DIFFICULTY,
        value_parser = RangedU64ValueParser::<usize>::new().range(0..=MAX_MINING_DIFFICULTY)
    )]
    pub mining_difficulty: usize,

    /// Seconds between automatic mining attempts
    #[arg(long, env = "MINING_TIMER_SEC", default_value_t = 20)]
    pub mining_timer_sec: u64,

    /// Seconds between neighbor rescans
    #[arg(long, env = "NEIGHBOR_SYNC_SEC", default_value_t = 20)]
    pub neighbor_sync_sec: u64,

    /// First port probed during neighbor discovery
    #[arg(long, env = "PORT_RANGE_START", default_value_t = 5000)]
    pub port_range_start: u16,

    /// Last port probed during neighbor discovery (inclusive)
    #[arg(long, env = "PORT_RANGE_END", default_value_t = 5003)]
    pub port_range_end: u16,

    /// First offset added to the host's last octet during discovery
    #[arg(long, env = "NEIGHBOR_IP_RANGE_START", default_value_t = 0)]
    pub ip_range_start: u8,

    /// Last offset added to the host's last octet (inclusive)
    #[arg(long, env = "NEIGHBOR_IP_RANGE_END", default_value_t = 1)]
    pub ip_range_end: u8,

    /// Milliseconds allowed for a single call to a neighbor
    #[arg(long, env = "PEER_TIMEOUT_MS", default_value_t = 3000)]
    pub peer_timeout_ms: u64,

    /// Milliseconds allowed for a single discovery probe
    #[arg(long, env = "PROBE_TIMEOUT_MS", default_value_t = 1000)]
    pub probe_timeout_ms: u64,
}

impl NodeConfig {
    pub fn mining_interval(&self) -> Duration {
        Duration::from_secs(self.mining_timer_sec)
    }

    pub fn neighbor_sync_interval(&self) -> Duration {
        Duration::from_secs(self.neighbor_sync_sec)
    }

    pub fn peer_timeout(&self) -> Duration {
        Duration::from_millis(self.peer_timeout_ms)
    }

    pub fn scan_range(&self) -> ScanRange {
        ScanRange {
            host: self.host,
            port: self.port,
            ip_offsets: self.ip_range_start..=self.ip_range_end,
            ports: self.port_range_start..=self.port_range_end,
            probe_timeout: Duration::from_millis(self.probe_timeout_ms),
        }
    }
}
