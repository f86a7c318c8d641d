//! # Runtime Configuration
//!
//! JSON config file for the resolver process: one chain entry per
//! served chain plus store and scheduler knobs.

use crosslock_chains::ChainsConfig;
use crosslock_engine::timelock;
use crosslock_types::{SwapError, TimelockSchedule};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level runtime configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Directory for the RocksDB swap store.
    pub data_dir: String,
    /// Chain entries.
    pub chains: ChainsConfig,
    /// Deadline schedule stamped into new orders.
    pub timelock: TimelockSchedule,
    /// How often timelock waits re-read chain clocks, milliseconds.
    pub chain_poll_interval_ms: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            data_dir: "./data/swaps".to_string(),
            chains: ChainsConfig::default(),
            timelock: timelock::default_schedule(),
            chain_poll_interval_ms: 5_000,
        }
    }
}

impl RuntimeConfig {
    /// Load and validate a config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SwapError> {
        let raw = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            SwapError::Validation(format!(
                "cannot read config {}: {e}",
                path.as_ref().display()
            ))
        })?;
        let config: RuntimeConfig = serde_json::from_str(&raw)
            .map_err(|e| SwapError::Validation(format!("bad config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate every section.
    pub fn validate(&self) -> Result<(), SwapError> {
        if self.data_dir.is_empty() {
            return Err(SwapError::Validation("data_dir is empty".into()));
        }
        if self.chain_poll_interval_ms == 0 {
            return Err(SwapError::Validation(
                "chain_poll_interval_ms cannot be 0".into(),
            ));
        }
        timelock::validate_schedule(&self.timelock)?;
        self.chains.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crosslock_chains::ChainConfig;
    use crosslock_types::ChainId;

    fn sample() -> RuntimeConfig {
        RuntimeConfig {
            data_dir: "/tmp/crosslock-test".to_string(),
            chains: ChainsConfig {
                chains: vec![ChainConfig {
                    chain_id: ChainId::Base,
                    rpc_url: "https://mainnet.base.org".to_string(),
                    contract_address: "0x0000000000000000000000000000000000000aaa".to_string(),
                    explorer_url_template: Some("https://basescan.org/tx/{tx}".to_string()),
                    signer_secret_primary:
                        "4c0883a69102937d6231471b5dbb6204fe512961708279feb1be6ae5538da033"
                            .to_string(),
                    signer_secret_secondary: None,
                    confirmations_override: None,
                }],
            },
            timelock: timelock::default_schedule(),
            chain_poll_interval_ms: 5_000,
        }
    }

    #[test]
    fn test_default_is_valid_sans_chains() {
        // The default config has no chains but everything else passes.
        assert!(RuntimeConfig::default().validate().is_ok());
    }

    #[test]
    fn test_sample_valid() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn test_bad_schedule_rejected() {
        let mut config = sample();
        config.timelock.dst_cancellation = config.timelock.src_cancellation + 10;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        let mut config = sample();
        config.chain_poll_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_round_trip() {
        let config = sample();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("resolver.json");
        std::fs::write(&path, serde_json::to_string_pretty(&config).unwrap()).unwrap();

        let loaded = RuntimeConfig::load(&path).unwrap();
        assert_eq!(loaded.data_dir, config.data_dir);
        assert_eq!(loaded.chains.chains.len(), 1);
    }

    #[test]
    fn test_load_missing_file_fails() {
        assert!(RuntimeConfig::load("/nonexistent/resolver.json").is_err());
    }
}
