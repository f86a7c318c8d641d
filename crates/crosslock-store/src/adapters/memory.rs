//! # In-Memory Backend
//!
//! A `BTreeMap` behind a lock. **Test environments only**: nothing
//! survives process restart, so the store's durability contract does
//! not hold here. Production deployments use the RocksDB backend.

use crate::ports::{BatchOperation, KvError, KeyValueStore};
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// Volatile key-value backend for tests.
#[derive(Default)]
pub struct InMemoryKv {
    map: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl InMemoryKv {
    /// Fresh empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.map.read().len()
    }

    /// Whether the backend holds no keys.
    pub fn is_empty(&self) -> bool {
        self.map.read().is_empty()
    }
}

impl KeyValueStore for InMemoryKv {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KvError> {
        Ok(self.map.read().get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), KvError> {
        self.map.write().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<(), KvError> {
        self.map.write().remove(key);
        Ok(())
    }

    fn exists(&self, key: &[u8]) -> Result<bool, KvError> {
        Ok(self.map.read().contains_key(key))
    }

    fn prefix_scan(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, KvError> {
        let map = self.map.read();
        Ok(map
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn atomic_batch_write(&self, operations: Vec<BatchOperation>) -> Result<(), KvError> {
        let mut map = self.map.write();
        for op in operations {
            match op {
                BatchOperation::Put { key, value } => {
                    map.insert(key, value);
                }
                BatchOperation::Delete { key } => {
                    map.remove(&key);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_operations() {
        let kv = InMemoryKv::new();
        kv.put(b"key1", b"value1").unwrap();
        assert_eq!(kv.get(b"key1").unwrap(), Some(b"value1".to_vec()));
        assert!(kv.exists(b"key1").unwrap());

        kv.delete(b"key1").unwrap();
        assert!(!kv.exists(b"key1").unwrap());
    }

    #[test]
    fn test_prefix_scan_ordered() {
        let kv = InMemoryKv::new();
        kv.put(b"swap:b", b"2").unwrap();
        kv.put(b"swap:a", b"1").unwrap();
        kv.put(b"other:z", b"9").unwrap();

        let results = kv.prefix_scan(b"swap:").unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, b"swap:a".to_vec());
    }

    #[test]
    fn test_batch_write() {
        let kv = InMemoryKv::new();
        kv.atomic_batch_write(vec![
            BatchOperation::put(b"a".to_vec(), b"1".to_vec()),
            BatchOperation::put(b"b".to_vec(), b"2".to_vec()),
            BatchOperation::delete(b"a".to_vec()),
        ])
        .unwrap();
        assert!(!kv.exists(b"a").unwrap());
        assert!(kv.exists(b"b").unwrap());
    }
}
