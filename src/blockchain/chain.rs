use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, info, warn};

use super::block::Block;
use super::crypto::{derive_address, signatures_match, PublicKey, Signature};
use super::hash::BlockHash;
use super::pow::{proof_of_work, valid_proof};
use super::transaction::{Transaction, TransactionError};
use super::MINING_REWARD;

/// Chain and pool, always mutated together under one lock
#[derive(Debug)]
struct LedgerState {
    /// Committed blocks. Shared with readers as an immutable snapshot.
    chain: Arc<Vec<Block>>,

    /// Transactions waiting for the next block
    transaction_pool: Vec<Transaction>,
}

impl LedgerState {
    fn last_block(&self) -> &Block {
        // Never empty: the genesis block is created in `BlockChain::new`
        &self.chain[self.chain.len() - 1]
    }

    /// Moves the pool into a new block and appends it.
    ///
    /// Only reachable through `BlockChain::mining` and genesis, so every
    /// appended block is solved under the same lock that took the pool.
    fn create_block(&mut self, nonce: u64, previous_hash: BlockHash) -> Block {
        let transactions = std::mem::take(&mut self.transaction_pool);
        let block = Block::new(nonce, previous_hash, transactions);

        Arc::make_mut(&mut self.chain).push(block.clone());
        block
    }
}

/// The ledger: committed chain plus pending transaction pool.
///
/// Every mutating operation takes the same mutex, so admission, mining and
/// chain replacement never interleave.
#[derive(Debug)]
pub struct BlockChain {
    state: Mutex<LedgerState>,

    /// Address credited with mining rewards
    blockchain_address: String,

    /// Mining difficulty (number of leading hex zeros required in a block hash)
    difficulty: usize,
}

impl BlockChain {
    /// Creates a ledger holding only the genesis block
    pub fn new(blockchain_address: impl Into<String>, difficulty: usize) -> Self {
        let mut state = LedgerState {
            chain: Arc::new(Vec::new()),
            transaction_pool: Vec::new(),
        };
        state.create_block(0, Block::default().hash());

        BlockChain {
            state: Mutex::new(state),
            blockchain_address: blockchain_address.into(),
            difficulty,
        }
    }

    fn lock(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of the committed chain
    pub fn chain(&self) -> Arc<Vec<Block>> {
        Arc::clone(&self.lock().chain)
    }

    /// Copy of the pending transactions
    pub fn transaction_pool(&self) -> Vec<Transaction> {
        self.lock().transaction_pool.clone()
    }

    /// The tip of the chain
    pub fn last_block(&self) -> Block {
        self.lock().last_block().clone()
    }

    /// Admits a transaction to the pool.
    ///
    /// Reward transactions are admitted unconditionally. Every other
    /// transaction must be signed by the key its sender address derives from
    /// and must be covered by the sender's committed balance.
    ///
    /// # Arguments
    ///
    /// * `sender` - The sender's address, or `MINING_SENDER` for rewards
    /// * `recipient` - The recipient's address
    /// * `value` - Amount to transfer, finite and not negative
    /// * `sender_public_key` - Key the sender address must derive from
    /// * `signature` - Signature over the canonical transaction
    ///
    /// # Returns
    ///
    /// `Ok(())` once the transaction is in the pool. A rejected transaction
    /// leaves the pool untouched.
    pub fn add_transaction(
        &self,
        sender: &str,
        recipient: &str,
        value: f64,
        sender_public_key: Option<&PublicKey>,
        signature: Option<&Signature>,
    ) -> Result<(), TransactionError> {
        let mut state = self.lock();
        Self::admit(
            &mut state,
            Transaction::new(sender, recipient, value),
            sender_public_key,
            signature,
        )
    }

    fn admit(
        state: &mut LedgerState,
        transaction: Transaction,
        sender_public_key: Option<&PublicKey>,
        signature: Option<&Signature>,
    ) -> Result<(), TransactionError> {
        if !transaction.value.is_finite() || transaction.value < 0.0 {
            return Err(TransactionError::InvalidValue(transaction.value));
        }

        if transaction.is_reward() {
            state.transaction_pool.push(transaction);
            return Ok(());
        }

        let (public_key, signature) = match (sender_public_key, signature) {
            (Some(public_key), Some(signature)) => (public_key, signature),
            _ => return Err(TransactionError::MissingSignature),
        };

        let derived = derive_address(public_key);
        if derived != transaction.sender {
            warn!("ERROR: sender {} does not match public key", transaction.sender);
            return Err(TransactionError::SenderMismatch {
                sender: transaction.sender,
                derived,
            });
        }

        if !signatures_match(public_key, &transaction.signing_bytes(), signature) {
            warn!("ERROR: Verify Transaction");
            return Err(TransactionError::InvalidSignature);
        }

        let available = total_amount(&state.chain, &transaction.sender);
        if available < transaction.value {
            warn!("ERROR: Not enough balance in wallet {}", transaction.sender);
            return Err(TransactionError::InsufficientFunds {
                required: transaction.value,
                available,
            });
        }

        state.transaction_pool.push(transaction);
        Ok(())
    }

    /// Balance of `address` replayed from the committed chain.
    ///
    /// Pending transactions are not counted.
    pub fn calculate_total_amount(&self, address: &str) -> f64 {
        let chain = self.chain();
        total_amount(&chain, address)
    }

    /// Mines one block out of the pending pool.
    ///
    /// Returns `None` without touching any state if the pool is empty.
    /// The lock is held from the pool check until the block is appended.
    pub fn mining(&self) -> Option<Block> {
        let mut state = self.lock();
        if state.transaction_pool.is_empty() {
            debug!("action=mining, status=skipped, reason=empty pool");
            return None;
        }

        state
            .transaction_pool
            .push(Transaction::new_reward(&self.blockchain_address, MINING_REWARD));

        let transactions = state.transaction_pool.clone();
        let previous_hash = state.last_block().hash();
        let nonce = proof_of_work(&transactions, previous_hash, self.difficulty);

        let block = state.create_block(nonce, previous_hash);
        info!("action=mining, status=success, nonce={}, height={}", nonce, state.chain.len() - 1);

        Some(block)
    }

    /// Validates linkage and proof of work for every block after genesis
    pub fn valid_chain(&self, chain: &[Block]) -> bool {
        if chain.is_empty() {
            return false;
        }

        chain.windows(2).all(|pair| {
            let (previous, block) = (&pair[0], &pair[1]);
            block.previous_hash == previous.hash()
                && valid_proof(
                    block.nonce,
                    block.previous_hash,
                    &block.transactions,
                    self.difficulty,
                )
        })
    }

    /// Swaps in `candidate` if it is still strictly longer than the local chain.
    ///
    /// The caller is responsible for validating the candidate first.
    pub fn replace_chain(&self, candidate: Vec<Block>) -> bool {
        let mut state = self.lock();
        if candidate.len() <= state.chain.len() {
            return false;
        }

        state.chain = Arc::new(candidate);
        true
    }
}

fn total_amount(chain: &[Block], address: &str) -> f64 {
    chain
        .iter()
        .flat_map(|block| block.transactions.iter())
        .fold(0.0, |mut total, transaction| {
            if transaction.recipient == address {
                total += transaction.value;
            }
            if transaction.sender == address {
                total -= transaction.value;
            }
            total
        })
}
