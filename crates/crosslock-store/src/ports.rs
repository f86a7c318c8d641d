//! # Outbound Ports
//!
//! Traits for the store's external dependencies: the key-value backend
//! and the wall clock.

use thiserror::Error;

/// Backend-level storage failure.
#[derive(Debug, Clone, Error)]
pub enum KvError {
    /// Underlying I/O failure.
    #[error("kv io error: {message}")]
    Io {
        /// Backend-reported detail.
        message: String,
    },
}

impl From<KvError> for crosslock_types::SwapError {
    fn from(err: KvError) -> Self {
        crosslock_types::SwapError::Store(err.to_string())
    }
}

/// One operation of an atomic batch.
#[derive(Clone, Debug)]
pub enum BatchOperation {
    /// Insert or overwrite.
    Put {
        /// Full key.
        key: Vec<u8>,
        /// Encoded value.
        value: Vec<u8>,
    },
    /// Remove if present.
    Delete {
        /// Full key.
        key: Vec<u8>,
    },
}

impl BatchOperation {
    /// Convenience constructor for a put.
    pub fn put(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        BatchOperation::Put {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Convenience constructor for a delete.
    pub fn delete(key: impl Into<Vec<u8>>) -> Self {
        BatchOperation::Delete { key: key.into() }
    }
}

/// Key-value backend port.
///
/// Implementations use interior synchronisation; the service calls
/// through a shared reference.
pub trait KeyValueStore: Send + Sync {
    /// Read a value.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KvError>;

    /// Write a value. For durable backends the write has reached disk
    /// when this returns.
    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), KvError>;

    /// Delete a key.
    fn delete(&self, key: &[u8]) -> Result<(), KvError>;

    /// Key presence check.
    fn exists(&self, key: &[u8]) -> Result<bool, KvError>;

    /// All pairs whose key starts with `prefix`, in key order.
    fn prefix_scan(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, KvError>;

    /// Apply all operations or none.
    fn atomic_batch_write(&self, operations: Vec<BatchOperation>) -> Result<(), KvError>;
}

/// Wall-clock port. Feeds `created_at`/`updated_at` only; on-chain
/// deadlines never consult it.
pub trait TimeSource: Send + Sync {
    /// Seconds since the Unix epoch.
    fn now_unix(&self) -> u64;
}

/// Production time source backed by `std::time`.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now_unix(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}
