use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use super::crypto::{CryptoError, Signature, Wallet};
use super::hash::canonical_bytes;
use super::MINING_SENDER;

/// Reasons a transaction is refused admission to the pool
#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("Invalid value: {0}")]
    InvalidValue(f64),

    #[error("Missing public key or signature")]
    MissingSignature,

    #[error("Sender address {sender} does not belong to the signing key ({derived})")]
    SenderMismatch { sender: String, derived: String },

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: f64, available: f64 },

    #[error("Crypto error: {0}")]
    CryptoError(#[from] CryptoError),
}

/// A value transfer between two addresses.
///
/// Field order is part of the canonical encoding, so it must not change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Transaction {
    /// Sender's address, or the reward sentinel
    #[serde(rename = "sender_blockchain_address")]
    pub sender: String,

    /// Recipient's address
    #[serde(rename = "recipient_blockchain_address")]
    pub recipient: String,

    /// Amount being transferred
    pub value: f64,
}

impl Transaction {
    pub fn new(sender: impl Into<String>, recipient: impl Into<String>, value: f64) -> Self {
        Transaction {
            sender: sender.into(),
            recipient: recipient.into(),
            value,
        }
    }

    /// Creates a reward transaction paid out of the sentinel address
    pub fn new_reward(recipient: impl Into<String>, value: f64) -> Self {
        Transaction::new(MINING_SENDER, recipient, value)
    }

    /// Checks if the transaction mints new value
    pub fn is_reward(&self) -> bool {
        self.sender == MINING_SENDER
    }

    /// The bytes a sender signs
    pub fn signing_bytes(&self) -> Vec<u8> {
        canonical_bytes(self)
    }

    /// Signs the transaction on behalf of `wallet`
    ///
    /// # Arguments
    ///
    /// * `wallet` - The wallet holding the sender's private key
    ///
    /// # Returns
    ///
    /// The signature over the canonical encoding of the transaction
    pub fn sign(&self, wallet: &Wallet) -> Signature {
        wallet.sign(&self.signing_bytes())
    }
}
