//! CLI configuration management.
//!
//! Governance parameters, storage locations and logging defaults, loaded from
//! `~/.cipher-grant/config.toml` or an explicit `--config` path.

use cipher_grant_crypto::KdfParams;
use cipher_grant_governance::GovernanceConfig;
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

/// CLI configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Quorum, threshold and field limits
    pub governance: GovernanceConfig,
    /// Ledger and keystore locations
    pub storage: StorageConfig,
    /// Key derivation cost for the keystore
    pub keystore: KeystoreConfig,
    /// Default log output
    pub logging: LoggingConfig,
}

/// Storage configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the ledger journal
    pub data_dir: PathBuf,
    /// Sealing keystore; defaults to `<data_dir>/sealing-key.json`
    pub keystore_path: Option<PathBuf>,
    /// Flush every journal append to disk
    pub sync_writes: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_home().join("data"),
            keystore_path: None,
            sync_writes: true,
        }
    }
}

impl StorageConfig {
    pub fn ledger_path(&self) -> PathBuf {
        self.data_dir.join("ledger.jsonl")
    }

    pub fn keystore_path(&self) -> PathBuf {
        self.keystore_path
            .clone()
            .unwrap_or_else(|| self.data_dir.join("sealing-key.json"))
    }
}

/// Argon2id cost parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeystoreConfig {
    pub memory_cost: u32,
    pub time_cost: u32,
    pub parallelism: u32,
}

impl Default for KeystoreConfig {
    fn default() -> Self {
        let params = KdfParams::default();
        Self {
            memory_cost: params.memory_cost,
            time_cost: params.time_cost,
            parallelism: params.parallelism,
        }
    }
}

impl KeystoreConfig {
    pub fn kdf_params(&self) -> KdfParams {
        KdfParams {
            memory_cost: self.memory_cost,
            time_cost: self.time_cost,
            parallelism: self.parallelism,
            ..KdfParams::default()
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `info` or `cipher_grant_governance=debug`
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            json: false,
        }
    }
}

impl CliConfig {
    /// Load from `path`, or from the default location when `path` is `None`.
    /// A missing default file yields the built-in defaults.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = Self::config_path()?;
                if default_path.exists() {
                    Self::from_file(&default_path)?
                } else {
                    Self::default()
                }
            }
        };
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file.
    /// Paths containing `..` are refused.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        reject_traversal(path)?;

        let contents = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e))?;
        let config: CliConfig = toml::from_str(&contents)
            .map_err(|e| anyhow::anyhow!("Failed to parse config file '{}': {}", path.display(), e))?;
        Ok(config)
    }

    /// Save configuration to file.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        reject_traversal(path)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)
            .map_err(|e| anyhow::anyhow!("Failed to write config file '{}': {}", path.display(), e))?;
        Ok(())
    }

    /// Get default configuration file path.
    pub fn config_path() -> anyhow::Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find home directory"))?;
        Ok(home.join(".cipher-grant").join("config.toml"))
    }

    /// Validate configuration.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.governance.validate()?;

        reject_traversal(&self.storage.data_dir)?;
        if let Some(keystore) = &self.storage.keystore_path {
            reject_traversal(keystore)?;
        }

        if self.keystore.memory_cost < 8 * self.keystore.parallelism {
            anyhow::bail!("keystore.memory_cost must be at least 8 KiB per lane");
        }
        if self.keystore.time_cost == 0 || self.keystore.parallelism == 0 {
            anyhow::bail!("keystore.time_cost and keystore.parallelism must be positive");
        }

        if self.logging.level.trim().is_empty() {
            anyhow::bail!("logging.level cannot be empty");
        }

        Ok(())
    }
}

fn default_home() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".cipher-grant")
}

fn reject_traversal(path: &Path) -> anyhow::Result<()> {
    if path.components().any(|c| matches!(c, Component::ParentDir)) {
        anyhow::bail!("Invalid path '{}': directory traversal detected", path.display());
    }
    Ok(())
}
