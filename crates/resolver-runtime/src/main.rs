//! # CrossLock Resolver Runtime
//!
//! The main entry point for the resolver process.
//!
//! Reads the config path from the first argument (default
//! `./resolver.json`), wires the store and chain adapters, and keeps
//! the process alive until interrupted. The driver surface
//! (`create_swap` / `execute_swap` / `cancel_swap` / `get` / `list`)
//! lives on the built [`resolver_runtime::wiring::Resolver`]; outer
//! transports drive it and carry no state of their own.

use anyhow::Result;
use crosslock_resolver::{MonitorConfig, SwapMonitor};
use resolver_runtime::{build_resolver, RuntimeConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    info!("===========================================");
    info!("  CrossLock Resolver v{}", env!("CARGO_PKG_VERSION"));
    info!("===========================================");

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "./resolver.json".to_string());
    let config = RuntimeConfig::load(&config_path)?;
    info!(config = %config_path, chains = config.chains.chains.len(), "configuration loaded");

    let resolver = build_resolver(&config)?;
    info!("resolver initialised; waiting for work");

    let (monitor, monitor_handle) = SwapMonitor::new(resolver.clone(), MonitorConfig::default());
    let monitor_task = tokio::spawn(monitor.run());

    tokio::signal::ctrl_c().await?;
    info!("shutting down gracefully");
    monitor_handle.stop();
    let _ = monitor_task.await;
    Ok(())
}
