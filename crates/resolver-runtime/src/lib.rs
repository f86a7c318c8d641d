//! # Resolver Runtime
//!
//! Process shell around the resolver core: configuration loading,
//! store and adapter wiring, logging. Carries no swap logic of its
//! own.

pub mod config;
pub mod wiring;

pub use config::RuntimeConfig;
pub use wiring::build_resolver;
