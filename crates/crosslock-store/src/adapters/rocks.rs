//! # RocksDB Backend
//!
//! Production implementation of the `KeyValueStore` port.
//!
//! - Atomic batch writes (WriteBatch)
//! - Snappy compression
//! - fsync on write: a successful `put` has reached disk before it
//!   returns, which is what the store's durability contract requires

use crate::ports::{BatchOperation, KvError, KeyValueStore};
use rocksdb::{IteratorMode, Options, WriteBatch, DB};
use std::path::Path;

/// RocksDB tuning knobs.
#[derive(Debug, Clone)]
pub struct RocksDbConfig {
    /// Path to the database directory.
    pub path: String,
    /// Write buffer size in bytes.
    pub write_buffer_size: usize,
    /// fsync after each write. Disable only in tests.
    pub sync_writes: bool,
}

impl Default for RocksDbConfig {
    fn default() -> Self {
        Self {
            path: "./data/swaps".to_string(),
            write_buffer_size: 64 * 1024 * 1024, // 64MB
            sync_writes: true,
        }
    }
}

impl RocksDbConfig {
    /// Config for tests: small buffers, no sync.
    pub fn for_testing(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            write_buffer_size: 4 * 1024 * 1024, // 4MB
            sync_writes: false,
        }
    }
}

/// RocksDB-backed key-value store.
pub struct RocksKv {
    db: DB,
    config: RocksDbConfig,
}

impl RocksKv {
    /// Open or create the database.
    pub fn open(config: RocksDbConfig) -> Result<Self, KvError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_write_buffer_size(config.write_buffer_size);
        opts.set_compression_type(rocksdb::DBCompressionType::Snappy);

        let db = DB::open(&opts, &config.path).map_err(|e| KvError::Io {
            message: format!("failed to open RocksDB: {e}"),
        })?;

        Ok(Self { db, config })
    }

    /// Open at `path` with default production settings.
    pub fn open_default(path: impl AsRef<Path>) -> Result<Self, KvError> {
        let config = RocksDbConfig {
            path: path.as_ref().to_string_lossy().to_string(),
            ..Default::default()
        };
        Self::open(config)
    }

    fn write_opts(&self) -> rocksdb::WriteOptions {
        let mut write_opts = rocksdb::WriteOptions::default();
        write_opts.set_sync(self.config.sync_writes);
        write_opts
    }
}

impl KeyValueStore for RocksKv {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KvError> {
        self.db.get(key).map_err(|e| KvError::Io {
            message: format!("RocksDB get failed: {e}"),
        })
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), KvError> {
        self.db
            .put_opt(key, value, &self.write_opts())
            .map_err(|e| KvError::Io {
                message: format!("RocksDB put failed: {e}"),
            })
    }

    fn delete(&self, key: &[u8]) -> Result<(), KvError> {
        self.db
            .delete_opt(key, &self.write_opts())
            .map_err(|e| KvError::Io {
                message: format!("RocksDB delete failed: {e}"),
            })
    }

    fn exists(&self, key: &[u8]) -> Result<bool, KvError> {
        self.db
            .get_pinned(key)
            .map(|v| v.is_some())
            .map_err(|e| KvError::Io {
                message: format!("RocksDB exists check failed: {e}"),
            })
    }

    fn prefix_scan(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, KvError> {
        let mut results = Vec::new();
        let iter = self
            .db
            .iterator(IteratorMode::From(prefix, rocksdb::Direction::Forward));

        for item in iter {
            match item {
                Ok((key, value)) => {
                    if !key.starts_with(prefix) {
                        break;
                    }
                    results.push((key.to_vec(), value.to_vec()));
                }
                Err(e) => {
                    return Err(KvError::Io {
                        message: format!("RocksDB scan failed: {e}"),
                    });
                }
            }
        }

        Ok(results)
    }

    fn atomic_batch_write(&self, operations: Vec<BatchOperation>) -> Result<(), KvError> {
        let mut batch = WriteBatch::default();
        for op in operations {
            match op {
                BatchOperation::Put { key, value } => batch.put(&key, &value),
                BatchOperation::Delete { key } => batch.delete(&key),
            }
        }

        self.db
            .write_opt(batch, &self.write_opts())
            .map_err(|e| KvError::Io {
                message: format!("RocksDB batch write failed: {e}"),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_basic_operations() {
        let temp_dir = TempDir::new().unwrap();
        let config = RocksDbConfig::for_testing(temp_dir.path().to_string_lossy().to_string());
        let kv = RocksKv::open(config).unwrap();

        kv.put(b"key1", b"value1").unwrap();
        assert_eq!(kv.get(b"key1").unwrap(), Some(b"value1".to_vec()));
        assert!(kv.exists(b"key1").unwrap());

        kv.delete(b"key1").unwrap();
        assert!(!kv.exists(b"key1").unwrap());
    }

    #[test]
    fn test_prefix_scan() {
        let temp_dir = TempDir::new().unwrap();
        let config = RocksDbConfig::for_testing(temp_dir.path().to_string_lossy().to_string());
        let kv = RocksKv::open(config).unwrap();

        kv.put(b"swap:0001", b"a").unwrap();
        kv.put(b"swap:0002", b"b").unwrap();
        kv.put(b"tx:0001", b"c").unwrap();

        let results = kv.prefix_scan(b"swap:").unwrap();
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn test_reopen_preserves_data() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().to_string_lossy().to_string();

        {
            let kv = RocksKv::open(RocksDbConfig::for_testing(path.clone())).unwrap();
            kv.put(b"persist", b"yes").unwrap();
        }

        let kv = RocksKv::open(RocksDbConfig::for_testing(path)).unwrap();
        assert_eq!(kv.get(b"persist").unwrap(), Some(b"yes".to_vec()));
    }

    #[test]
    fn test_batch_atomicity_surface() {
        let temp_dir = TempDir::new().unwrap();
        let config = RocksDbConfig::for_testing(temp_dir.path().to_string_lossy().to_string());
        let kv = RocksKv::open(config).unwrap();

        kv.atomic_batch_write(vec![
            BatchOperation::put(b"a".to_vec(), b"1".to_vec()),
            BatchOperation::put(b"b".to_vec(), b"2".to_vec()),
        ])
        .unwrap();

        assert!(kv.exists(b"a").unwrap());
        assert!(kv.exists(b"b").unwrap());
    }
}
