//! Connector configuration, read from YAML.
//!
//! ```yaml
//! storage_key: stashdb
//! id_strategy: ulid
//! faults: { errorRate: 0.1, simulateDelay: 200 }
//! remote: { base_url: "http://localhost:3000/api", timeout_ms: 5000 }
//! seed_file: seed.yaml
//! schemas:
//!   todos:
//!     fields:
//!       done: { type: boolean, default: false }
//! ```

use crate::document::IdStrategy;
use crate::error::{Result, StashDbError};
use crate::fault::FaultConfig;
use crate::schema::CollectionSchema;
use crate::seed::SeedDescriptor;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const DEFAULT_STORAGE_KEY: &str = "stashdb";
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StashConfig {
    /// Key the blob is stored under.
    #[serde(default = "default_storage_key")]
    pub storage_key: String,
    #[serde(default)]
    pub id_strategy: IdStrategy,
    #[serde(default)]
    pub faults: FaultConfig,
    #[serde(default)]
    pub remote: Option<RemoteConfig>,
    /// Inline seed descriptor. Takes precedence over `seed_file`.
    #[serde(default)]
    pub seed: Option<SeedDescriptor>,
    /// Seed descriptor file, relative to the config file.
    #[serde(default)]
    pub seed_file: Option<PathBuf>,
    #[serde(default)]
    pub schemas: HashMap<String, CollectionSchema>,
}

/// Settings for the HTTP-backed connector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub base_url: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_storage_key() -> String {
    DEFAULT_STORAGE_KEY.to_string()
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

impl Default for StashConfig {
    fn default() -> Self {
        StashConfig {
            storage_key: default_storage_key(),
            id_strategy: IdStrategy::default(),
            faults: FaultConfig::default(),
            remote: None,
            seed: None,
            seed_file: None,
            schemas: HashMap::new(),
        }
    }
}

impl StashConfig {
    /// Load a config file. A `seed_file` is resolved against the config's
    /// directory and loaded into `seed`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::parse_str(&content)?;

        if config.seed.is_none() {
            if let Some(seed_file) = &config.seed_file {
                let base = path.parent().unwrap_or_else(|| Path::new("."));
                let seed_path = base.join(seed_file);
                log::debug!("Loading seed data from {}", seed_path.display());
                config.seed = Some(SeedDescriptor::load(&seed_path)?);
            }
        }

        Ok(config)
    }

    pub fn parse_str(content: &str) -> Result<Self> {
        let config: StashConfig = serde_yaml::from_str(content)?;
        config.check()?;
        Ok(config)
    }

    fn check(&self) -> Result<()> {
        if self.storage_key.trim().is_empty() {
            return Err(StashDbError::Config("storage_key must not be empty".into()));
        }
        if !(0.0..=1.0).contains(&self.faults.error_rate) {
            return Err(StashDbError::Config(format!(
                "faults.errorRate must be within [0, 1], got {}",
                self.faults.error_rate
            )));
        }
        if let Some(remote) = &self.remote {
            url::Url::parse(&remote.base_url).map_err(|e| {
                StashDbError::Config(format!("Invalid remote.base_url '{}': {e}", remote.base_url))
            })?;
        }
        Ok(())
    }
}
