//! # CrossLock Chain Adapters
//!
//! One uniform HTLC capability set over wire-incompatible chains.
//!
//! ## Architecture
//!
//! - [`adapter`] — the `ChainAdapter` port every variant implements,
//!   plus deterministic escrow-id derivation
//! - [`registry`] — chain id → adapter instance
//! - [`config`] — per-chain configuration entries
//! - [`evm`] — EVM rollups via JSON-RPC (ABI calldata, event topics,
//!   packed timelock words)
//! - [`move_vm`] — Move chain via its HTLC package gateway
//!   (`vector<u8>` arguments, shared escrow objects)
//! - [`soroban`] — Soroban contracts (XDR-typed invocation parameters)
//! - [`tvm`] — TVM chain gateway
//! - [`mock`] — in-memory adapter with programmable faults, for the
//!   orchestrator's test suite
//!
//! Every adapter maps its wire errors into the shared taxonomy and is
//! idempotent on `lock` by `(order_id, side)`.

pub mod adapter;
pub mod config;
pub mod evm;
pub mod gateway;
pub mod mock;
pub mod move_vm;
pub mod registry;
pub mod soroban;
pub mod tvm;

pub use adapter::{derive_escrow_id, ChainAdapter};
pub use config::{ChainConfig, ChainsConfig};
pub use evm::EvmAdapter;
pub use mock::{MockChainAdapter, OpJournal, OpRecord};
pub use move_vm::MoveAdapter;
pub use registry::{build_adapter, AdapterRegistry};
pub use soroban::SorobanAdapter;
pub use tvm::TvmAdapter;
