//! Registry configuration
//!
//! Loaded from JSON; every field falls back to its default when omitted.

use serde::{Deserialize, Serialize};

/// Upper bound accepted for any configured delay (100 years)
pub const MAX_DELAY_SECS: u64 = 100 * 365 * 24 * 60 * 60;

/// Configuration for the guard registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Wait between initiating and completing a guard removal or uninstall
    #[serde(default = "default_removal_delay_secs")]
    pub removal_delay_secs: u64,

    /// Maximum number of guards per account
    #[serde(default = "default_max_guards")]
    pub max_guards: usize,

    /// What the post-hook fan-out does when a module fails
    #[serde(default)]
    pub post_hook_policy: FailPolicy,
}

/// Policy when a module's post-hook fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FailPolicy {
    /// Abort the whole post-hook (and the transaction) on the first failure
    #[default]
    FailClosed,

    /// Log the failure, record it in the report, continue with the next module
    FailOpen,
}

fn default_removal_delay_secs() -> u64 {
    24 * 60 * 60 // 1 day
}

fn default_max_guards() -> usize {
    16
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            removal_delay_secs: default_removal_delay_secs(),
            max_guards: default_max_guards(),
            post_hook_policy: FailPolicy::default(),
        }
    }
}

impl RegistryConfig {
    /// Load configuration from JSON file
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        config
            .validate()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        Ok(config)
    }

    /// Check bounds
    pub fn validate(&self) -> Result<(), String> {
        if self.max_guards == 0 {
            return Err("max_guards must be at least 1".to_string());
        }
        if self.removal_delay_secs > MAX_DELAY_SECS {
            return Err(format!(
                "removal_delay_secs {} exceeds {}",
                self.removal_delay_secs, MAX_DELAY_SECS
            ));
        }
        Ok(())
    }

    /// Get removal delay as chrono Duration
    pub fn removal_delay(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.removal_delay_secs.min(MAX_DELAY_SECS) as i64)
    }
}
