use crate::crypto::hash::{Hash256, Hash160};
use crate::crypto::signatures::Signature;
use crate::{LedgerError, Result};
use secp256k1::{Secp256k1, SecretKey, PublicKey as Secp256k1PublicKey, Message};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Version byte prefixed to the locking hash before base58 encoding.
pub const ADDRESS_VERSION: u8 = 0x00;
const CHECKSUM_LENGTH: usize = 4;
const ADDRESS_LENGTH: usize = 1 + 20 + CHECKSUM_LENGTH;

#[derive(Debug, Clone)]
pub struct PrivateKey {
    key: SecretKey,
}

/// Uncompressed secp256k1 point stored as the raw `X || Y` coordinates (64 bytes).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKey {
    key: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct KeyPair {
    pub private_key: PrivateKey,
    pub public_key: PublicKey,
}

impl PrivateKey {
    pub fn new() -> Result<Self> {
        let mut rng = OsRng;
        let mut secret_bytes = [0u8; 32];
        rng.fill_bytes(&mut secret_bytes);

        let secret_key = SecretKey::from_slice(&secret_bytes)
            .map_err(|e| LedgerError::Crypto(format!("Failed to create private key: {}", e)))?;

        Ok(Self { key: secret_key })
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != 32 {
            return Err(LedgerError::Crypto("Private key must be 32 bytes".to_string()));
        }

        let secret_key = SecretKey::from_slice(bytes)
            .map_err(|e| LedgerError::Crypto(format!("Invalid private key: {}", e)))?;

        Ok(Self { key: secret_key })
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.key.secret_bytes()
    }

    pub fn public_key(&self) -> PublicKey {
        let secp = Secp256k1::new();
        let public_key = Secp256k1PublicKey::from_secret_key(&secp, &self.key);
        PublicKey::from_secp256k1(&public_key)
    }

    pub fn sign(&self, digest: &Hash256) -> Signature {
        let secp = Secp256k1::new();
        let message = Message::from_digest(*digest.as_bytes());

        let signature = secp.sign_ecdsa(&message, &self.key);
        Signature::from_secp256k1(&signature)
    }
}

impl PublicKey {
    pub const COORDINATES_LENGTH: usize = 64;

    fn from_secp256k1(public_key: &Secp256k1PublicKey) -> Self {
        // Drop the 0x04 uncompressed tag, keep X || Y
        let uncompressed = public_key.serialize_uncompressed();
        Self {
            key: uncompressed[1..].to_vec(),
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let public_key = Self::to_secp256k1(bytes)?;
        Ok(Self::from_secp256k1(&public_key))
    }

    fn to_secp256k1(coordinates: &[u8]) -> Result<Secp256k1PublicKey> {
        if coordinates.len() != Self::COORDINATES_LENGTH {
            return Err(LedgerError::Crypto("Invalid public key length".to_string()));
        }

        let (x, y) = coordinates.split_at(Self::COORDINATES_LENGTH / 2);
        let mut uncompressed = Vec::with_capacity(65);
        uncompressed.push(0x04);
        uncompressed.extend_from_slice(x);
        uncompressed.extend_from_slice(y);

        Secp256k1PublicKey::from_slice(&uncompressed)
            .map_err(|e| LedgerError::Crypto(format!("Invalid public key: {}", e)))
    }

    pub fn to_bytes(&self) -> &[u8] {
        &self.key
    }

    pub fn hash160(&self) -> Hash160 {
        Hash160::hash_sha256(&self.key)
    }

    pub fn to_address(&self) -> Address {
        Address::from_locking_hash(&self.hash160())
    }

    pub fn verify(&self, digest: &Hash256, signature: &Signature) -> Result<bool> {
        let secp = Secp256k1::new();
        let public_key = Self::to_secp256k1(&self.key)?;
        let message = Message::from_digest(*digest.as_bytes());

        let secp_signature = signature.to_secp256k1()?;

        match secp.verify_ecdsa(&message, &secp_signature, &public_key) {
            Ok(()) => Ok(true),
            Err(_) => Ok(false),
        }
    }
}

impl KeyPair {
    pub fn new() -> Result<Self> {
        let private_key = PrivateKey::new()?;
        Ok(Self::from_private_key(private_key))
    }

    pub fn from_private_key(private_key: PrivateKey) -> Self {
        let public_key = private_key.public_key();

        Self {
            private_key,
            public_key,
        }
    }

    pub fn address(&self) -> Address {
        self.public_key.to_address()
    }

    pub fn locking_hash(&self) -> Hash160 {
        self.public_key.hash160()
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.key))
    }
}

/// Base58 of `version || locking_hash || checksum4`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Address(String);

impl Address {
    pub fn from_locking_hash(locking_hash: &Hash160) -> Self {
        let mut data = Vec::with_capacity(ADDRESS_LENGTH);
        data.push(ADDRESS_VERSION);
        data.extend_from_slice(locking_hash.as_bytes());
        data.extend_from_slice(&checksum(&data));

        Address(bs58::encode(data).into_string())
    }

    pub fn locking_hash(&self) -> Result<Hash160> {
        address_to_hash160(&self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Address {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        address_to_hash160(s)?;
        Ok(Address(s.to_string()))
    }
}

fn checksum(versioned_hash: &[u8]) -> [u8; CHECKSUM_LENGTH] {
    let hash = Hash256::double_hash(versioned_hash);
    let mut checksum = [0u8; CHECKSUM_LENGTH];
    checksum.copy_from_slice(&hash.as_bytes()[..CHECKSUM_LENGTH]);
    checksum
}

// Address utilities
pub fn address_to_hash160(address: &str) -> Result<Hash160> {
    let decoded = bs58::decode(address).into_vec()
        .map_err(|e| LedgerError::InvalidAddress(format!("{}: {}", address, e)))?;

    if decoded.len() != ADDRESS_LENGTH {
        return Err(LedgerError::InvalidAddress(format!("{}: wrong length", address)));
    }

    // Verify checksum over whatever version byte is present
    let (versioned_hash, actual_checksum) = decoded.split_at(ADDRESS_LENGTH - CHECKSUM_LENGTH);
    if checksum(versioned_hash) != actual_checksum {
        return Err(LedgerError::InvalidAddress(format!("{}: checksum mismatch", address)));
    }

    Hash160::from_slice(&versioned_hash[1..])
        .ok_or_else(|| LedgerError::InvalidAddress(format!("{}: bad locking hash", address)))
}

pub fn validate_address(address: &str) -> bool {
    address_to_hash160(address).is_ok()
}
