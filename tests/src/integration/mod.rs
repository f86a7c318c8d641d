//! Cross-crate integration tests.

pub mod harness;
pub mod invariants;
pub mod persistence;
pub mod scenarios;
