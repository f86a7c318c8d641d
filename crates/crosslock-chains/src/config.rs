//! # Chain Configuration
//!
//! One entry per chain the resolver serves. Validated before any
//! adapter is constructed.

use crosslock_types::{ChainId, SwapError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Configuration for one chain entry.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Identifier used internally and in persisted state.
    pub chain_id: ChainId,
    /// Transport endpoint (JSON-RPC or gateway URL).
    pub rpc_url: String,
    /// On-chain HTLC locator: contract address or package id.
    pub contract_address: String,
    /// Formatter for receipt URLs; `{tx}` is replaced by the hash.
    /// Display-only.
    #[serde(default)]
    pub explorer_url_template: Option<String>,
    /// Key for the "maker-side resolver" role. Signs source locks.
    pub signer_secret_primary: String,
    /// Key for the "taker-side resolver" role. Signs destination
    /// locks; falls back to the primary when absent.
    #[serde(default)]
    pub signer_secret_secondary: Option<String>,
    /// Override the chain's default confirmation count (tests).
    #[serde(default)]
    pub confirmations_override: Option<u64>,
}

impl ChainConfig {
    /// Reject obviously unusable entries.
    pub fn validate(&self) -> Result<(), SwapError> {
        if self.rpc_url.is_empty() {
            return Err(SwapError::Validation(format!(
                "chain {}: rpc_url is empty",
                self.chain_id
            )));
        }
        if self.contract_address.is_empty() {
            return Err(SwapError::Validation(format!(
                "chain {}: contract_address is empty",
                self.chain_id
            )));
        }
        if self.signer_secret_primary.is_empty() {
            return Err(SwapError::Validation(format!(
                "chain {}: signer_secret_primary is empty",
                self.chain_id
            )));
        }
        Ok(())
    }

    /// Expand the explorer template for a transaction hash.
    pub fn explorer_url(&self, tx_hash: &str) -> Option<String> {
        self.explorer_url_template
            .as_ref()
            .map(|tpl| tpl.replace("{tx}", tx_hash))
    }

    /// Confirmations the adapter waits for before reporting finality.
    pub fn required_confirmations(&self) -> u64 {
        self.confirmations_override
            .unwrap_or_else(|| self.chain_id.required_confirmations())
    }
}

/// The full set of chain entries handed to the registry builder.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ChainsConfig {
    /// One entry per served chain.
    pub chains: Vec<ChainConfig>,
}

impl ChainsConfig {
    /// Validate every entry and reject duplicate chains.
    pub fn validate(&self) -> Result<(), SwapError> {
        let mut seen = HashSet::new();
        for entry in &self.chains {
            entry.validate()?;
            if !seen.insert(entry.chain_id) {
                return Err(SwapError::Validation(format!(
                    "duplicate config entry for chain {}",
                    entry.chain_id
                )));
            }
        }
        Ok(())
    }

    /// Entry for a chain, if configured.
    pub fn entry(&self, chain: ChainId) -> Option<&ChainConfig> {
        self.chains.iter().find(|c| c.chain_id == chain)
    }
}
