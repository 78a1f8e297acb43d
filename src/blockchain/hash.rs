use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use utoipa::ToSchema;

use std::fmt;

/// A 32-byte SHA-256 digest, rendered as lowercase hex everywhere it leaves the process
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, ToSchema)]
#[schema(value_type = String, example = "000a3f...")]
pub struct BlockHash(pub [u8; 32]);

impl BlockHash {
    /// Parses a 64-character hex string
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes)?;
        Ok(BlockHash(bytes))
    }

    /// Lowercase hex representation
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for BlockHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for BlockHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        BlockHash::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Returns the canonical byte encoding of a block or transaction.
///
/// Encoding is serde_json over the typed structs: fields appear in declaration
/// order, there are no maps, and hashes are lowercase hex, so equal values
/// always produce equal bytes.
pub fn canonical_bytes<T: Serialize>(value: &T) -> Vec<u8> {
    // Only fails for maps with non-string keys or failing writers; neither occurs here.
    serde_json::to_vec(value).expect("canonical encoding of ledger types cannot fail")
}

/// SHA-256 of raw bytes
pub fn sha256(bytes: &[u8]) -> [u8; 32] {
    Sha256::digest(bytes).into()
}

/// SHA-256 of the canonical encoding of `value`
pub fn digest<T: Serialize>(value: &T) -> BlockHash {
    BlockHash(sha256(&canonical_bytes(value)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_round_trip() {
        let hash = BlockHash([0xab; 32]);
        let hex = hash.to_hex();

        assert_eq!(hex.len(), 64);
        assert_eq!(hex, hex.to_lowercase());
        assert_eq!(BlockHash::from_hex(&hex).unwrap(), hash);
    }

    #[test]
    fn test_from_hex_rejects_wrong_length() {
        assert!(BlockHash::from_hex("abcd").is_err());
        assert!(BlockHash::from_hex(&"0".repeat(66)).is_err());
        assert!(BlockHash::from_hex(&"zz".repeat(32)).is_err());
    }

    #[test]
    fn test_serializes_as_hex_string() {
        let hash = BlockHash([1; 32]);
        let json = serde_json::to_string(&hash).unwrap();

        assert_eq!(json, format!("\"{}\"", "01".repeat(32)));

        let decoded: BlockHash = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, hash);
    }

    #[test]
    fn test_sha256_known_vector() {
        assert_eq!(
            hex::encode(sha256(b"abc")),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
