//! Nullable store: thread-safe in-memory key/value bucket.

use biopay_wallet_core::storage::{KeyValueStore, StorageError};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::lock;

/// An in-memory bucket whose operations can be made to fail.
pub struct NullStore {
    bucket: String,
    values: Mutex<BTreeMap<String, String>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    fail_removes: AtomicBool,
}

impl NullStore {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            values: Mutex::new(BTreeMap::new()),
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            fail_removes: AtomicBool::new(false),
        }
    }

    /// A store on which every operation fails, like a missing keychain.
    pub fn unavailable(bucket: impl Into<String>) -> Self {
        let store = Self::new(bucket);
        store.set_unavailable(true);
        store
    }

    pub fn set_unavailable(&self, failing: bool) {
        self.fail_reads(failing);
        self.fail_writes(failing);
        self.fail_removes(failing);
    }

    pub fn fail_reads(&self, failing: bool) {
        self.fail_reads.store(failing, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, failing: bool) {
        self.fail_writes.store(failing, Ordering::SeqCst);
    }

    pub fn fail_removes(&self, failing: bool) {
        self.fail_removes.store(failing, Ordering::SeqCst);
    }

    /// Read a value regardless of injected failures.
    pub fn peek(&self, key: &str) -> Option<String> {
        lock(&self.values).get(key).cloned()
    }

    /// Write a value regardless of injected failures.
    pub fn seed(&self, key: &str, value: &str) {
        lock(&self.values).insert(key.to_string(), value.to_string());
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.values).is_empty()
    }

    pub fn keys(&self) -> Vec<String> {
        lock(&self.values).keys().cloned().collect()
    }

    fn check(&self, flag: &AtomicBool, operation: &str) -> Result<(), StorageError> {
        if flag.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable(format!("{} {operation} disabled", self.bucket)));
        }
        Ok(())
    }
}

impl KeyValueStore for NullStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.check(&self.fail_reads, "read")?;
        Ok(self.peek(key))
    }

    fn put(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.check(&self.fail_writes, "write")?;
        self.seed(key, value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.check(&self.fail_removes, "remove")?;
        lock(&self.values).remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn injected_failures_only_affect_the_trait() {
        let store = NullStore::new("Secure");
        store.put("k", "v").unwrap();
        store.fail_reads(true);
        assert!(store.get("k").is_err());
        assert_eq!(store.peek("k").as_deref(), Some("v"));
        store.fail_reads(false);
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v"));
    }

    #[test]
    fn unavailable_store_fails_everything() {
        let store = NullStore::unavailable("Secure");
        assert!(store.get("k").is_err());
        assert!(store.put("k", "v").is_err());
        assert!(store.remove("k").is_err());
        assert!(store.is_empty());
    }
}
