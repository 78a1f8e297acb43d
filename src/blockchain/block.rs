use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::hash::{digest, BlockHash};
use super::transaction::Transaction;

/// Represents a block in the blockchain.
///
/// The serialized form doubles as the canonical encoding that is hashed, so
/// field order is fixed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Block {
    /// Creation time in nanoseconds since the Unix epoch
    pub timestamp: i64,

    /// Proof of work
    pub nonce: u64,

    /// Hash of the previous block
    pub previous_hash: BlockHash,

    /// List of transactions included in this block
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Creates a new block stamped with the current time
    pub fn new(nonce: u64, previous_hash: BlockHash, transactions: Vec<Transaction>) -> Self {
        Block {
            timestamp: now_nanos(),
            nonce,
            previous_hash,
            transactions,
        }
    }

    /// SHA-256 of the block's canonical encoding
    pub fn hash(&self) -> BlockHash {
        digest(self)
    }
}

fn now_nanos() -> i64 {
    let now = Utc::now();
    // Out of range only after the year 2262
    now.timestamp_nanos_opt().unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_block() {
        let transactions = vec![
            Transaction::new_reward("recipient1", 1.0),
            Transaction::new("a", "b", 0.5),
        ];

        let block = Block::new(100, BlockHash([7; 32]), transactions.clone());

        assert_eq!(block.nonce, 100);
        assert_eq!(block.previous_hash, BlockHash([7; 32]));
        assert_eq!(block.transactions, transactions);
        assert!(block.timestamp > 0);
    }

    #[test]
    fn test_hash_is_stable() {
        let block = Block::new(1, BlockHash::default(), vec![Transaction::new("a", "b", 1.0)]);

        assert_eq!(block.hash(), block.clone().hash());
        assert_eq!(block.hash().to_hex().len(), 64);
    }

    #[test]
    fn test_hash_depends_on_transaction_order() {
        let first = Transaction::new("a", "b", 1.0);
        let second = Transaction::new("c", "d", 2.0);

        let mut block = Block::default();
        block.transactions = vec![first.clone(), second.clone()];
        let forward = block.hash();

        block.transactions = vec![second, first];
        assert_ne!(forward, block.hash());
    }

    #[test]
    fn test_wire_format() {
        let block = Block {
            timestamp: 42,
            nonce: 3,
            previous_hash: BlockHash([0xff; 32]),
            transactions: vec![],
        };

        let json = serde_json::to_string(&block).unwrap();
        assert_eq!(
            json,
            format!(
                r#"{{"timestamp":42,"nonce":3,"previous_hash":"{}","transactions":[]}}"#,
                "ff".repeat(32)
            )
        );

        let decoded: Block = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, block);
    }
}
