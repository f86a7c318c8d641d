//! # Adapter Registry
//!
//! Maps `ChainId` to the adapter instance serving it. Each adapter
//! owns its signer lifetime: keys are acquired at construction and
//! released on drop.

use crate::adapter::ChainAdapter;
use crate::config::{ChainConfig, ChainsConfig};
use crate::evm::EvmAdapter;
use crate::move_vm::MoveAdapter;
use crate::soroban::SorobanAdapter;
use crate::tvm::TvmAdapter;
use crosslock_types::{ChainId, SwapError, VmFamily};
use std::collections::HashMap;
use std::sync::Arc;

/// Build the adapter variant a config entry calls for.
pub fn build_adapter(config: ChainConfig) -> Result<Arc<dyn ChainAdapter>, SwapError> {
    Ok(match config.chain_id.vm_family() {
        VmFamily::Evm => Arc::new(EvmAdapter::new(config)?),
        VmFamily::Move => Arc::new(MoveAdapter::new(config)?),
        VmFamily::Soroban => Arc::new(SorobanAdapter::new(config)?),
        VmFamily::Tvm => Arc::new(TvmAdapter::new(config)?),
    })
}

/// Chain id → adapter.
#[derive(Default)]
pub struct AdapterRegistry {
    adapters: HashMap<ChainId, Arc<dyn ChainAdapter>>,
}

impl AdapterRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build every adapter a validated config names.
    pub fn from_config(config: &ChainsConfig) -> Result<Self, SwapError> {
        config.validate()?;
        let mut registry = Self::new();
        for entry in &config.chains {
            registry.register(build_adapter(entry.clone())?);
        }
        Ok(registry)
    }

    /// Register an adapter under its own chain id. Replaces any
    /// previous registration for that chain.
    pub fn register(&mut self, adapter: Arc<dyn ChainAdapter>) {
        self.adapters.insert(adapter.chain_id(), adapter);
    }

    /// Builder-style registration.
    pub fn with(mut self, adapter: Arc<dyn ChainAdapter>) -> Self {
        self.register(adapter);
        self
    }

    /// Adapter for `chain`, or `UnsupportedChain`.
    pub fn get(&self, chain: ChainId) -> Result<Arc<dyn ChainAdapter>, SwapError> {
        self.adapters
            .get(&chain)
            .cloned()
            .filter(|a| a.chain_supported())
            .ok_or_else(|| SwapError::UnsupportedChain(chain.to_string()))
    }

    /// Whether a usable adapter is registered for `chain`.
    pub fn supports(&self, chain: ChainId) -> bool {
        self.adapters
            .get(&chain)
            .map(|a| a.chain_supported())
            .unwrap_or(false)
    }

    /// All chains with a registered adapter.
    pub fn chains(&self) -> Vec<ChainId> {
        self.adapters.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockChainAdapter;

    #[test]
    fn test_register_and_get() {
        let registry = AdapterRegistry::new()
            .with(Arc::new(MockChainAdapter::new(ChainId::Base)))
            .with(Arc::new(MockChainAdapter::new(ChainId::Sui)));

        assert!(registry.get(ChainId::Base).is_ok());
        assert!(registry.supports(ChainId::Sui));
        assert!(!registry.supports(ChainId::Ton));
        assert!(matches!(
            registry.get(ChainId::Ton),
            Err(SwapError::UnsupportedChain(_))
        ));
    }

    #[test]
    fn test_unsupported_adapter_filtered() {
        let mock = MockChainAdapter::new(ChainId::Stellar);
        mock.set_supported(false);
        let registry = AdapterRegistry::new().with(Arc::new(mock));
        assert!(!registry.supports(ChainId::Stellar));
        assert!(registry.get(ChainId::Stellar).is_err());
    }
}
