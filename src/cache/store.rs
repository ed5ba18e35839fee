//! Cache Store Module
//!
//! Leaf storage: a plain HashMap of typed entries with structural indexing.
//! The store does no locking and no expiry checks of its own.

use std::collections::HashMap;

use chrono::Duration;
use serde_json::Value as Json;

use crate::cache::value::{expiry_after, Entry, Value};
use crate::error::{CacheError, IndexFault, Result};

// == Cache Store ==
/// Unsynchronized key-value storage.
///
/// Writers take `&mut self`, so sharing a store between tasks requires an
/// external lock (see `Sharder`).
#[derive(Debug, Default)]
pub struct Store {
    /// Key-value storage
    entries: HashMap<String, Entry>,
}

impl Store {
    // == Constructor ==
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    // == Set ==
    /// Stores a value under `key`, replacing any previous entry.
    ///
    /// A positive `ttl` is turned into an absolute expiry; zero means the
    /// entry never expires.
    pub fn set(&mut self, key: &str, value: Value, ttl: Duration) -> Result<Entry> {
        if ttl < Duration::zero() {
            return Err(CacheError::InvalidTtl);
        }

        let entry = Entry::new(value, expiry_after(ttl));
        self.entries.insert(key.to_string(), entry.clone());
        Ok(entry)
    }

    // == Get ==
    /// Returns the entry stored under `key`, expired or not.
    pub fn get(&self, key: &str) -> Result<Entry> {
        self.entries.get(key).cloned().ok_or(CacheError::KeyNotFound)
    }

    // == Remove ==
    /// Removes `key`. Removing an absent key is not an error.
    pub fn remove(&mut self, key: &str) {
        self.entries.remove(key);
    }

    // == Keys ==
    /// Returns every key currently present, expired or not.
    pub fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    // == Get At Index ==
    /// Looks up one element of the value stored under `key`.
    ///
    /// Sequences are indexed by a non-negative integer offset, mappings by
    /// key. The element is returned as stored; there is no recursive lookup.
    pub fn get_at_index(&self, key: &str, index: &str) -> Result<Json> {
        let entry = self.entries.get(key).ok_or(CacheError::KeyNotFound)?;

        match &entry.data {
            Value::Scalar(_) => Err(CacheError::IndexAccess(IndexFault::NotIndexable)),
            Value::Sequence(items) => {
                let offset: usize = index
                    .parse()
                    .map_err(|_| CacheError::IndexAccess(IndexFault::NonInteger))?;
                items
                    .get(offset)
                    .cloned()
                    .ok_or(CacheError::IndexAccess(IndexFault::OutOfRange))
            }
            Value::Mapping(map) => map
                .get(index)
                .cloned()
                .ok_or(CacheError::IndexAccess(IndexFault::MissingKey)),
        }
    }

    // == Length ==
    /// Returns the current number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    // == Is Empty ==
    /// Returns true if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::value::ValueKind;
    use serde_json::json;
    use std::thread::sleep;

    fn value(raw: Json) -> Value {
        Value::try_from(raw).unwrap()
    }

    #[test]
    fn test_store_new() {
        let store = Store::new();
        assert_eq!(store.len(), 0);
        assert!(store.is_empty());
    }

    #[test]
    fn test_store_set_and_get() {
        let mut store = Store::new();

        let stored = store.set("key1", Value::from("value1"), Duration::zero()).unwrap();
        let entry = store.get("key1").unwrap();

        assert_eq!(entry, stored);
        assert_eq!(entry.kind, ValueKind::Scalar);
        assert_eq!(entry.data, Value::from("value1"));
        assert_eq!(entry.expires, 0);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_store_get_nonexistent() {
        let store = Store::new();
        assert!(matches!(store.get("nonexistent"), Err(CacheError::KeyNotFound)));
    }

    #[test]
    fn test_store_remove_is_idempotent() {
        let mut store = Store::new();

        store.set("key1", Value::from("value1"), Duration::zero()).unwrap();
        store.remove("key1");
        store.remove("key1");
        store.remove("never_there");

        assert!(store.is_empty());
        assert!(matches!(store.get("key1"), Err(CacheError::KeyNotFound)));
    }

    #[test]
    fn test_store_overwrite() {
        let mut store = Store::new();

        store.set("key1", Value::from("value1"), Duration::zero()).unwrap();
        store.set("key1", value(json!([1, 2])), Duration::zero()).unwrap();

        let entry = store.get("key1").unwrap();
        assert_eq!(entry.kind, ValueKind::Sequence);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_store_negative_ttl_does_not_mutate() {
        let mut store = Store::new();

        let result = store.set("key1", Value::from("v"), Duration::milliseconds(-1));
        assert!(matches!(result, Err(CacheError::InvalidTtl)));
        assert!(store.is_empty());
    }

    #[test]
    fn test_store_ignores_expiry() {
        let mut store = Store::new();

        store.set("key1", Value::from("v"), Duration::milliseconds(1)).unwrap();
        sleep(std::time::Duration::from_millis(3));

        let entry = store.get("key1").unwrap();
        assert!(entry.is_expired());
        assert_eq!(store.keys(), vec!["key1".to_string()]);
    }

    #[test]
    fn test_sequence_indexing() {
        let mut store = Store::new();
        let items = json!([1, "abc", null, 3.2, [1, 2, 3]]);
        store.set("list", value(items.clone()), Duration::zero()).unwrap();

        for offset in 0..5 {
            let element = store.get_at_index("list", &offset.to_string()).unwrap();
            assert_eq!(element, items[offset]);
        }
        assert!(matches!(
            store.get_at_index("list", "5"),
            Err(CacheError::IndexAccess(IndexFault::OutOfRange))
        ));
        assert!(matches!(
            store.get_at_index("list", "-1"),
            Err(CacheError::IndexAccess(IndexFault::NonInteger))
        ));
        assert!(matches!(
            store.get_at_index("list", "first"),
            Err(CacheError::IndexAccess(IndexFault::NonInteger))
        ));
    }

    #[test]
    fn test_scalar_not_indexable() {
        let mut store = Store::new();
        store.set("string", Value::from("something"), Duration::zero()).unwrap();

        for index in ["0", "key", ""] {
            assert!(matches!(
                store.get_at_index("string", index),
                Err(CacheError::IndexAccess(IndexFault::NotIndexable))
            ));
        }
    }

    #[test]
    fn test_mapping_indexing() {
        let mut store = Store::new();
        let map = json!({"key": "value", "int": 1, "map": {"42": 24}});
        store.set("map", value(map), Duration::zero()).unwrap();

        assert_eq!(store.get_at_index("map", "key").unwrap(), json!("value"));
        assert_eq!(store.get_at_index("map", "int").unwrap(), json!(1));
        assert_eq!(store.get_at_index("map", "map").unwrap(), json!({"42": 24}));
        assert!(matches!(
            store.get_at_index("map", "invalid"),
            Err(CacheError::IndexAccess(IndexFault::MissingKey))
        ));
    }

    #[test]
    fn test_index_on_missing_key() {
        let store = Store::new();
        assert!(matches!(
            store.get_at_index("nothing", "0"),
            Err(CacheError::KeyNotFound)
        ));
    }
}
