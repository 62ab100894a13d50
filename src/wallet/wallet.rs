use crate::crypto::keys::{Address, KeyPair, PrivateKey, PublicKey};
use crate::{LedgerError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Raw key material for one address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    pub private_key: Vec<u8>,
    pub public_key: Vec<u8>,
}

impl Wallet {
    pub fn from_keypair(keypair: &KeyPair) -> Self {
        Self {
            private_key: keypair.private_key.to_bytes().to_vec(),
            public_key: keypair.public_key.to_bytes().to_vec(),
        }
    }

    pub fn keypair(&self) -> Result<KeyPair> {
        let keypair = KeyPair::from_private_key(PrivateKey::from_bytes(&self.private_key)?);
        if keypair.public_key.to_bytes() != self.public_key.as_slice() {
            return Err(LedgerError::Wallet("Stored public key does not match private key".to_string()));
        }
        Ok(keypair)
    }

    pub fn address(&self) -> Result<Address> {
        Ok(PublicKey::from_bytes(&self.public_key)?.to_address())
    }
}

/// Every wallet known to a key store, keyed by address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallets {
    wallets: BTreeMap<Address, Wallet>,
}

impl Wallets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_wallet(&mut self, keypair: &KeyPair) -> Address {
        let address = keypair.address();
        self.wallets.insert(address.clone(), Wallet::from_keypair(keypair));
        address
    }

    pub fn get_wallet(&self, address: &Address) -> Option<&Wallet> {
        self.wallets.get(address)
    }

    /// Addresses in sorted order.
    pub fn addresses(&self) -> Vec<Address> {
        self.wallets.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.wallets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wallets.is_empty()
    }
}

/// Where key pairs come from and where they are kept between runs.
pub trait KeyStore {
    fn generate(&self) -> Result<KeyPair> {
        KeyPair::new()
    }

    fn address_of(&self, public_key: &PublicKey) -> Address {
        public_key.to_address()
    }

    fn load(&self) -> Result<Wallets>;

    fn save(&self, wallets: &Wallets) -> Result<()>;
}

/// Keeps all wallets bincode-encoded in a single file.
#[derive(Debug, Clone)]
pub struct FileKeyStore {
    path: PathBuf,
}

impl FileKeyStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Generates a key pair, records it and persists the store.
    pub fn create_wallet(&self) -> Result<Address> {
        let mut wallets = self.load()?;
        let keypair = self.generate()?;
        let address = wallets.add_wallet(&keypair);
        self.save(&wallets)?;

        log::info!("🔑 Created wallet {}", address);
        Ok(address)
    }
}

impl KeyStore for FileKeyStore {
    fn load(&self) -> Result<Wallets> {
        if !self.path.exists() {
            return Ok(Wallets::new());
        }

        let data = fs::read(&self.path)?;
        let wallets: Wallets = bincode::deserialize(&data)
            .map_err(|e| LedgerError::Wallet(format!("Failed to read {}: {}", self.path.display(), e)))?;

        log::debug!("Loaded {} wallets from {}", wallets.len(), self.path.display());
        Ok(wallets)
    }

    fn save(&self, wallets: &Wallets) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let data = bincode::serialize(wallets)?;
        fs::write(&self.path, data)?;

        log::debug!("💾 Saved {} wallets to {}", wallets.len(), self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_loads_empty() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let store = FileKeyStore::new(temp_dir.path().join("wallets.dat"));

        assert!(store.load()?.is_empty());
        Ok(())
    }

    #[test]
    fn test_wallets_survive_save_and_load() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let store = FileKeyStore::new(temp_dir.path().join("nested").join("wallets.dat"));

        let first = store.create_wallet()?;
        let second = store.create_wallet()?;

        let wallets = store.load()?;
        assert_eq!(wallets.len(), 2);

        let mut expected = vec![first.clone(), second];
        expected.sort();
        assert_eq!(wallets.addresses(), expected);

        let wallet = wallets.get_wallet(&first).ok_or_else(|| LedgerError::Wallet("missing".to_string()))?;
        assert_eq!(wallet.address()?, first);
        assert_eq!(wallet.keypair()?.address(), first);
        Ok(())
    }

    #[test]
    fn test_address_of_matches_keypair() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let store = FileKeyStore::new(temp_dir.path().join("wallets.dat"));

        let keypair = store.generate()?;
        assert_eq!(store.address_of(&keypair.public_key), keypair.address());
        Ok(())
    }

    #[test]
    fn test_mismatched_key_material_is_rejected() -> Result<()> {
        let mut wallet = Wallet::from_keypair(&KeyPair::new()?);
        wallet.public_key = KeyPair::new()?.public_key.to_bytes().to_vec();

        assert!(wallet.keypair().is_err());
        Ok(())
    }

    #[test]
    fn test_corrupt_file_is_a_wallet_error() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("wallets.dat");
        fs::write(&path, b"\xFF\xFF\xFF\xFF\xFF\xFF\xFF\xFF")?;

        let err = FileKeyStore::new(&path).load().unwrap_err();
        assert!(matches!(err, LedgerError::Wallet(_)));
        Ok(())
    }
}
