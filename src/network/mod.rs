// Network module
//
// Everything a node does with its neighbors:
// - HTTP client for fetching chains and sending notifications
// - Neighbor discovery by scanning an address/port range
// - Longest-chain conflict resolution

pub mod client;
pub mod consensus;
pub mod neighbors;

pub use client::{ChainResponse, HttpPeerClient, PeerClient, PeerError};
pub use consensus::{notify_peers, resolve_conflicts};
pub use neighbors::{Neighbors, ScanRange};
