use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

/// Overrides the ledger directory regardless of the config file.
pub const LEDGER_DB_ENV: &str = "LEDGER_DB";
/// Overrides the wallet file regardless of the config file.
pub const LEDGER_WALLETS_ENV: &str = "LEDGER_WALLETS";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub storage: StorageConfig,
    pub mining: MiningConfig,
    pub genesis: GenesisConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    pub wallet_file: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MiningConfig {
    pub threads: usize,
    /// Highest nonce the search may try before giving up.
    pub max_nonce: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenesisConfig {
    pub memo: String,
}

impl Default for MiningConfig {
    fn default() -> Self {
        Self {
            threads: num_cpus::get(),
            max_nonce: u64::MAX,
        }
    }
}

impl MiningConfig {
    pub fn single_threaded() -> Self {
        Self {
            threads: 1,
            ..Self::default()
        }
    }
}

impl Default for GenesisConfig {
    fn default() -> Self {
        Self {
            memo: "First Transaction from Genesis".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let base_dir = Self::base_dir();

        Self {
            storage: StorageConfig {
                data_dir: base_dir.join("blocks"),
                wallet_file: base_dir.join("wallets.dat"),
            },
            mining: MiningConfig::default(),
            genesis: GenesisConfig::default(),
        }
    }
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(config_path: &Path) -> anyhow::Result<Self> {
        let config = if config_path.exists() {
            let content = std::fs::read_to_string(config_path)?;
            serde_json::from_str(&content)?
        } else {
            let config = Self::default();
            config.save_to(config_path)?;
            config
        };

        Ok(config.with_env_overrides())
    }

    pub fn save_to(&self, config_path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;

        Ok(())
    }

    /// Applies `LEDGER_DB` and `LEDGER_WALLETS` on top of whatever was loaded.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(dir) = env::var(LEDGER_DB_ENV) {
            if !dir.is_empty() {
                self.storage.data_dir = PathBuf::from(dir);
            }
        }
        if let Ok(file) = env::var(LEDGER_WALLETS_ENV) {
            if !file.is_empty() {
                self.storage.wallet_file = PathBuf::from(file);
            }
        }
        self
    }

    fn base_dir() -> PathBuf {
        let home_dir = env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home_dir).join(".utxo-ledger")
    }

    fn config_path() -> PathBuf {
        Self::base_dir().join("config.json")
    }
}
