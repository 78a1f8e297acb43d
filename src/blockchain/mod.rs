// Blockchain module
//
// This module contains the ledger engine:
// - Canonical encoding and hashing
// - Keys, signatures and addresses
// - Block and transaction structures
// - Proof of work
// - The ledger itself (chain + transaction pool)

pub mod block;
pub mod chain;
pub mod crypto;
pub mod hash;
pub mod pow;
pub mod transaction;

// Re-export main components for easier access
pub use block::Block;
pub use chain::BlockChain;
pub use crypto::{PublicKey, Signature, Wallet};
pub use hash::BlockHash;
pub use transaction::{Transaction, TransactionError};

/// Number of leading hex zeros a block hash needs
pub const MINING_DIFFICULTY: usize = 3;

/// Sender of reward transactions
pub const MINING_SENDER: &str = "THE BLOCKCHAIN";

/// Value paid to the miner of each block
pub const MINING_REWARD: f64 = 1.0;
