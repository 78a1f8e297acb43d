use p256::ecdsa::signature::{Signer, Verifier};
use p256::ecdsa::{Signature as EcdsaSignature, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use rand::RngCore;
use ripemd::Ripemd160;
use sha2::Digest;
use thiserror::Error;

use std::fmt;

use super::hash::sha256;

/// Version byte prefixed to the public key hash before checksumming
pub const ADDRESS_VERSION: u8 = 0x00;

const CHECKSUM_LEN: usize = 4;
const ADDRESS_PAYLOAD_LEN: usize = 1 + 20 + CHECKSUM_LEN;

/// Errors that can occur during cryptographic operations
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Failed to generate keypair: {0}")]
    KeyGeneration(String),

    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error("Decoding error: {0}")]
    Decoding(#[from] hex::FromHexError),
}

/// A P-256 public key, exchanged as 128 hex chars holding the X and Y coordinates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey(VerifyingKey);

impl PublicKey {
    /// Parses the `X || Y` hex form used by the transaction API
    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        let mut sec1 = [0u8; 65];
        sec1[0] = 0x04;
        hex::decode_to_slice(s, &mut sec1[1..])?;

        VerifyingKey::from_sec1_bytes(&sec1)
            .map(PublicKey)
            .map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))
    }

    /// Big-endian X coordinate followed by big-endian Y coordinate
    pub fn coordinates(&self) -> [u8; 64] {
        let point = self.0.to_encoded_point(false);
        let mut out = [0u8; 64];
        out.copy_from_slice(&point.as_bytes()[1..]);
        out
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.coordinates())
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// An ECDSA signature, exchanged as 128 hex chars holding `r || s`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature(EcdsaSignature);

impl Signature {
    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        let mut bytes = [0u8; 64];
        hex::decode_to_slice(s, &mut bytes)?;

        EcdsaSignature::from_slice(&bytes)
            .map(Signature)
            .map_err(|e| CryptoError::InvalidSignature(e.to_string()))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0.to_bytes())
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// A keypair together with its derived address
#[derive(Debug, Clone)]
pub struct Wallet {
    signing_key: SigningKey,
    public_key: PublicKey,
    address: String,
}

impl Wallet {
    /// Creates a new wallet from the operating system's CSPRNG
    ///
    /// # Returns
    ///
    /// The wallet, or `CryptoError::KeyGeneration` if the CSPRNG fails
    pub fn new() -> Result<Self, CryptoError> {
        Self::from_entropy(|secret| {
            OsRng
                .try_fill_bytes(secret)
                .map_err(|e| CryptoError::KeyGeneration(e.to_string()))
        })
    }

    /// Draws 32-byte candidates from `fill` until one is a valid P-256 scalar
    fn from_entropy<F>(mut fill: F) -> Result<Self, CryptoError>
    where
        F: FnMut(&mut [u8; 32]) -> Result<(), CryptoError>,
    {
        let mut secret = [0u8; 32];
        loop {
            fill(&mut secret)?;

            // Zero and anything at or above the curve order is redrawn
            if let Ok(signing_key) = SigningKey::from_slice(&secret) {
                return Ok(Self::from_signing_key(signing_key));
            }
        }
    }

    /// Restores a wallet from a hex-encoded 32-byte private scalar
    pub fn from_private_key_hex(s: &str) -> Result<Self, CryptoError> {
        let mut secret = [0u8; 32];
        hex::decode_to_slice(s, &mut secret)?;

        let signing_key = SigningKey::from_slice(&secret)
            .map_err(|e| CryptoError::InvalidPrivateKey(e.to_string()))?;

        Ok(Self::from_signing_key(signing_key))
    }

    fn from_signing_key(signing_key: SigningKey) -> Self {
        let public_key = PublicKey(VerifyingKey::from(&signing_key));
        let address = derive_address(&public_key);

        Wallet {
            signing_key,
            public_key,
            address,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    pub fn private_key_hex(&self) -> String {
        hex::encode(self.signing_key.to_bytes())
    }

    /// Signs SHA-256(message) with the wallet's private key
    pub fn sign(&self, message: &[u8]) -> Signature {
        Signature(self.signing_key.sign(message))
    }
}

/// Derives the Base58Check address of a public key.
///
/// SHA-256 over the coordinates, then RIPEMD-160, then a version byte in front
/// and the first four bytes of a double SHA-256 behind.
///
/// # Arguments
///
/// * `public_key` - The key whose address is derived
///
/// # Returns
///
/// The Base58 address, identical for the same key on every run
pub fn derive_address(public_key: &PublicKey) -> String {
    let key_hash = Ripemd160::digest(sha256(&public_key.coordinates()));

    let mut payload = Vec::with_capacity(ADDRESS_PAYLOAD_LEN);
    payload.push(ADDRESS_VERSION);
    payload.extend_from_slice(&key_hash);

    let checksum = sha256(&sha256(&payload));
    payload.extend_from_slice(&checksum[..CHECKSUM_LEN]);

    bs58::encode(payload).into_string()
}

/// Checks the length, version byte and checksum of an address
pub fn validate_address(address: &str) -> bool {
    let payload = match bs58::decode(address).into_vec() {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };

    if payload.len() != ADDRESS_PAYLOAD_LEN || payload[0] != ADDRESS_VERSION {
        return false;
    }

    let (body, checksum) = payload.split_at(ADDRESS_PAYLOAD_LEN - CHECKSUM_LEN);
    sha256(&sha256(body))[..CHECKSUM_LEN] == *checksum
}

/// Verifies an ECDSA signature over SHA-256(message)
pub fn signatures_match(public_key: &PublicKey, message: &[u8], signature: &Signature) -> bool {
    public_key.0.verify(message, &signature.0).is_ok()
}
