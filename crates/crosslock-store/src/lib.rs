//! # CrossLock Swap Store
//!
//! Idempotent persistence of swap state and transaction receipts; the
//! single source of truth for order status.
//!
//! ## Architecture
//!
//! - [`ports`] — the `KeyValueStore` and `TimeSource` outbound ports
//! - [`adapters`] — RocksDB (production) and in-memory (tests only)
//!   implementations
//! - [`codec`] — bincode encoding with round-trip guarantees
//! - [`service`] — the `SwapStore` service: per-order linearisation,
//!   `update_status` as the sole status mutator
//!
//! ## Durability
//!
//! With the RocksDB backend every successful `put`/`update_status`
//! has been synced to disk before the call returns. The in-memory
//! backend offers no durability and exists for test environments only.

pub mod adapters;
pub mod codec;
pub mod ports;
pub mod service;

pub use adapters::memory::InMemoryKv;
pub use adapters::rocks::{RocksDbConfig, RocksKv};
pub use ports::{BatchOperation, KvError, KeyValueStore, SystemTimeSource, TimeSource};
pub use service::SwapStore;
