//! # Shared Types Crate
//!
//! This crate contains all domain entities shared across the resolver
//! subsystems: swap orders, escrow records, aggregate swap state, and
//! the error taxonomy.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: every type that crosses a crate
//!   boundary (engine, store, chains, resolver) is defined here.
//! - **One owning record**: `SwapState` owns its `EscrowRecord`s by
//!   value; there are no cycles between orders and escrows.
//! - **Secrets are opaque**: `SecretBytes` zeroizes on drop and never
//!   prints its contents through `Debug`.

pub mod chain;
pub mod entities;
pub mod errors;
pub mod secret;

pub use chain::{ChainId, TokenId, VmFamily};
pub use entities::*;
pub use errors::{ErrorKind, SwapError};
pub use secret::SecretBytes;

/// 256-bit unsigned amount in a chain's smallest unit.
pub type Amount = primitive_types::U256;

/// A 32-byte digest (SHA-256 hashlock).
pub type HashLock = [u8; 32];
