//! # CrossLock Test Suite
//!
//! Unified test crate for cross-crate behaviour:
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── scenarios.rs    # End-to-end swap scenarios (S1..S6)
//!     ├── invariants.rs   # Properties that must hold for any run
//!     └── persistence.rs  # Store round-trips against RocksDB
//! ```
//!
//! Per-crate unit tests live next to the code they cover; this crate
//! holds everything that crosses a crate boundary.
//!
//! ## Running
//!
//! ```bash
//! # All tests
//! cargo test -p crosslock-tests
//!
//! # By category
//! cargo test -p crosslock-tests integration::scenarios::
//! cargo test -p crosslock-tests integration::invariants::
//! ```

#[cfg(test)]
pub mod integration;
