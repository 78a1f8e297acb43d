// Proof of work: a nonce is valid when the block digest starts with
// `difficulty` hex zeros.

use super::block::Block;
use super::hash::BlockHash;
use super::transaction::Transaction;

/// Checks a candidate nonce.
///
/// The candidate block uses a zero timestamp so that any node can reproduce the
/// digest the miner found.
pub fn valid_proof(
    nonce: u64,
    previous_hash: BlockHash,
    transactions: &[Transaction],
    difficulty: usize,
) -> bool {
    let guess = Block {
        timestamp: 0,
        nonce,
        previous_hash,
        transactions: transactions.to_vec(),
    };

    has_leading_zeros(&guess.hash(), difficulty)
}

/// Searches nonces from zero upward until one satisfies `valid_proof`
///
/// # Arguments
///
/// * `transactions` - The transactions the block will carry
/// * `previous_hash` - Hash of the block being extended
/// * `difficulty` - Required leading hex zeros, at most 64
///
/// # Returns
///
/// The first nonce that solves the puzzle
pub fn proof_of_work(
    transactions: &[Transaction],
    previous_hash: BlockHash,
    difficulty: usize,
) -> u64 {
    let mut nonce = 0;
    while !valid_proof(nonce, previous_hash, transactions, difficulty) {
        nonce += 1;
    }
    nonce
}

/// True when the first `difficulty` hex characters of `hash` are all '0'
pub fn has_leading_zeros(hash: &BlockHash, difficulty: usize) -> bool {
    let hex = hash.to_hex();
    difficulty <= hex.len() && hex.bytes().take(difficulty).all(|c| c == b'0')
}
