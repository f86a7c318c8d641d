//! # Wiring
//!
//! Builds the dependency graph: store, adapter registry, orchestrator.
//! Everything is constructed explicitly here and handed down; nothing
//! in the core reaches for process-wide state.

use crate::config::RuntimeConfig;
use crosslock_chains::AdapterRegistry;
use crosslock_resolver::{ResolverConfig, ResolverService};
use crosslock_store::{RocksDbConfig, RocksKv, SwapStore, SystemTimeSource};
use crosslock_types::SwapError;
use std::sync::Arc;
use tracing::info;

/// The concrete resolver the runtime drives.
pub type Resolver = ResolverService<RocksKv, SystemTimeSource>;

/// Build the full resolver from a validated config.
pub fn build_resolver(config: &RuntimeConfig) -> Result<Arc<Resolver>, SwapError> {
    let kv = RocksKv::open(RocksDbConfig {
        path: config.data_dir.clone(),
        ..Default::default()
    })?;
    let store = Arc::new(SwapStore::new(kv, SystemTimeSource));
    info!(data_dir = %config.data_dir, "swap store opened");

    let registry = AdapterRegistry::from_config(&config.chains)?;
    for chain in registry.chains() {
        info!(%chain, "chain adapter registered");
    }

    let resolver_config = ResolverConfig {
        timelock: config.timelock,
        chain_poll_interval_ms: config.chain_poll_interval_ms,
        ..Default::default()
    };

    Ok(Arc::new(ResolverService::new(
        store,
        Arc::new(registry),
        resolver_config,
    )))
}
