use ripemd::{Ripemd160, Digest as RipemdDigest};
use sha2::{Sha256, Digest};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Hash256([u8; 32]);

impl Hash256 {
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn zero() -> Self {
        Self([0u8; 32])
    }

    pub fn hash(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        Self(hasher.finalize().into())
    }

    pub fn double_hash(data: &[u8]) -> Self {
        let first_hash = Self::hash(data);
        Self::hash(first_hash.as_bytes())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(hex_str: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(hex_str)?;
        Self::from_slice(&bytes).ok_or(hex::FromHexError::InvalidStringLength)
    }

    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        let array: [u8; 32] = slice.try_into().ok()?;
        Some(Self(array))
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl From<[u8; 32]> for Hash256 {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Hash256 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// RIPEMD160 over SHA256, the locking hash of a public key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Hash160([u8; 20]);

impl Hash160 {
    pub fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn hash(data: &[u8]) -> Self {
        let mut hasher = Ripemd160::new();
        RipemdDigest::update(&mut hasher, data);
        Self(hasher.finalize().into())
    }

    pub fn hash_sha256(data: &[u8]) -> Self {
        let sha256_hash = Hash256::hash(data);
        Self::hash(sha256_hash.as_bytes())
    }

    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        let array: [u8; 20] = slice.try_into().ok()?;
        Some(Self(array))
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Hash160 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash256() {
        let data = b"hello world";
        let hash1 = Hash256::hash(data);
        let hash2 = Hash256::hash(data);

        assert_eq!(hash1, hash2);
        assert_ne!(hash1, Hash256::zero());
    }

    #[test]
    fn test_hash256_hex() {
        let hash = Hash256::hash(b"test");
        let hex_str = hash.to_hex();
        let parsed_hash = Hash256::from_hex(&hex_str).unwrap();

        assert_eq!(hash, parsed_hash);
        assert!(Hash256::from_hex("abcd").is_err());
    }

    #[test]
    fn test_double_hash() {
        let data = b"test";
        let single = Hash256::hash(data);
        let double = Hash256::double_hash(data);

        assert_ne!(single, double);
        assert_eq!(double, Hash256::hash(single.as_bytes()));
    }

    #[test]
    fn test_hash160_known_vector() {
        // RIPEMD160(SHA256("")) as used for empty-key locking hashes
        let hash = Hash160::hash_sha256(b"");
        assert_eq!(hash.to_hex(), "b472a266d0bd89c13706a4132ccfb16f7c3b9fcb");
    }
}
