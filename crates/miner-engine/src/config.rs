//! Mining configuration, its persistence seam, and coordinator timing.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::{MinerError, Result};

/// User-facing mining settings, reloaded on every refresh cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MiningConfig {
    /// Number of worker threads per epoch.
    pub threads: usize,
    /// Address the coinbase pays.
    pub address: String,
}

impl Default for MiningConfig {
    fn default() -> Self {
        MiningConfig {
            threads: 1,
            address: String::new(),
        }
    }
}

impl MiningConfig {
    pub fn new(threads: usize, address: impl Into<String>) -> Self {
        MiningConfig {
            threads,
            address: address.into(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.threads == 0 {
            return Err(MinerError::InvalidConfig(
                "threads must be at least 1".to_string(),
            ));
        }
        if self.address.trim().is_empty() {
            return Err(MinerError::InvalidConfig(
                "payout address is empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Persistence for [`MiningConfig`].
pub trait ConfigStore: Send + Sync {
    fn load(&self) -> Result<MiningConfig>;
    fn save(&self, config: &MiningConfig) -> Result<()>;
}

/// Keeps the configuration in memory only.
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    config: Mutex<MiningConfig>,
}

impl MemoryConfigStore {
    pub fn new(config: MiningConfig) -> Self {
        MemoryConfigStore {
            config: Mutex::new(config),
        }
    }
}

impl ConfigStore for MemoryConfigStore {
    fn load(&self) -> Result<MiningConfig> {
        Ok(self.config.lock().clone())
    }

    fn save(&self, config: &MiningConfig) -> Result<()> {
        *self.config.lock() = config.clone();
        Ok(())
    }
}

/// Stores the configuration as a JSON file.
///
/// A missing file loads as [`MiningConfig::default`].
#[derive(Debug, Clone)]
pub struct JsonConfigStore {
    path: PathBuf,
}

impl JsonConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonConfigStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigStore for JsonConfigStore {
    fn load(&self) -> Result<MiningConfig> {
        if !self.path.exists() {
            return Ok(MiningConfig::default());
        }
        let contents = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    fn save(&self, config: &MiningConfig) -> Result<()> {
        let contents = serde_json::to_string_pretty(config)?;
        fs::write(&self.path, contents)?;
        Ok(())
    }
}

/// Timing knobs of the coordinator and its workers.
#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    /// Delay between successful template refreshes.
    pub refresh_interval: Duration,
    /// Delay before retrying a failed refresh.
    pub retry_backoff: Duration,
    /// Pause between stop and start when the configuration changes.
    pub restart_delay: Duration,
    /// How often a worker publishes its counters.
    pub report_interval: Duration,
    /// Hash attempts between `yield_now` calls in the worker loop.
    pub yield_interval: u64,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        CoordinatorSettings {
            refresh_interval: Duration::from_secs(30),
            retry_backoff: Duration::from_secs(5),
            restart_delay: Duration::from_millis(500),
            report_interval: Duration::from_secs(1),
            yield_interval: 10_000,
        }
    }
}
