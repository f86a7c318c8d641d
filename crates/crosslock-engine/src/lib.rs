//! # CrossLock Engine
//!
//! The pure core of the resolver: no I/O, no clocks of its own.
//!
//! - [`secret`] — CSPRNG secrets, SHA-256 hashlocks, constant-time
//!   verification
//! - [`timelock`] — the seven-offset deadline schedule and the
//!   predicates that gate claims and refunds against chain block
//!   timestamps
//! - [`state_machine`] — legal-edge enforcement for the swap
//!   lifecycle
//! - [`invariants`] — cross-field rules checked at order creation and
//!   re-checked by tests
//!
//! Everything here is deterministic given its inputs; time enters only
//! as explicit chain-timestamp arguments.

pub mod invariants;
pub mod secret;
pub mod state_machine;
pub mod timelock;

pub use invariants::{
    invariant_chains_distinct, invariant_parts_sum, invariant_secret_binding,
    invariant_timelock_asymmetry,
};
pub use secret::{generate_secret, hash_secret, mint, mint_parts, verify_secret};
pub use state_machine::{apply_part_transition, apply_transition, guard_transition, Transition};
pub use timelock::{
    can_claim, can_publicly_claim, can_refund, claimable_at, default_schedule, refundable_at,
    scale_schedule, should_publicly_refund, validate_schedule,
};
