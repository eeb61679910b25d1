//! Timelock configuration
//!
//! `TimelockConfig` is per-account state set by the account itself.
//! `TimelockSettings` bounds the module as a whole and is loaded from JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use multiguard_core::{Address, Transaction, TxHash};
use multiguard_hooks::MAX_DELAY_SECS;

/// Per-account timelock configuration
///
/// A freshly added timelock has zero delay and no cancellor, so scheduled
/// transactions are executable immediately until the account sets a delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TimelockConfig {
    /// Wait between scheduling and execution
    pub delay_secs: u64,

    /// Identity allowed to cancel scheduled transactions
    pub cancellor: Option<Address>,
}

impl TimelockConfig {
    /// Get delay as chrono Duration
    pub fn delay(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.delay_secs.min(MAX_DELAY_SECS) as i64)
    }
}

/// A transaction waiting for its delay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledTransaction {
    pub tx_hash: TxHash,
    pub transaction: Transaction,
    pub scheduled_at: DateTime<Utc>,
    pub eligible_at: DateTime<Utc>,
}

/// Module-wide limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelockSettings {
    /// Maximum number of pending transactions per account
    #[serde(default = "default_max_scheduled")]
    pub max_scheduled_per_account: usize,
}

fn default_max_scheduled() -> usize {
    64
}

impl Default for TimelockSettings {
    fn default() -> Self {
        Self {
            max_scheduled_per_account: default_max_scheduled(),
        }
    }
}

impl TimelockSettings {
    /// Load settings from JSON file
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        let settings: Self = serde_json::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        settings
            .validate()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_scheduled_per_account == 0 {
            return Err("max_scheduled_per_account must be at least 1".to_string());
        }
        Ok(())
    }
}
