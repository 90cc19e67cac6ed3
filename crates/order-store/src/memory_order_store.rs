use super::{OrderStore, StoreError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;
use tracing::debug;

/// Process-local order store.
///
/// Backs local runs without PostgreSQL and the cache consistency tests.
/// Counts calls per operation and can be switched into an outage where
/// every call fails with [`StoreError::Unavailable`].
pub struct InMemoryOrderStore {
    rows: RwLock<HashMap<String, Vec<u8>>>,
    available: AtomicBool,
    get_calls: AtomicUsize,
    upsert_calls: AtomicUsize,
    list_calls: AtomicUsize,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::with_rows(Vec::new())
    }

    /// Create a store pre-populated with `(key, payload)` rows
    pub fn with_rows<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = (String, Vec<u8>)>,
    {
        Self {
            rows: RwLock::new(rows.into_iter().collect()),
            available: AtomicBool::new(true),
            get_calls: AtomicUsize::new(0),
            upsert_calls: AtomicUsize::new(0),
            list_calls: AtomicUsize::new(0),
        }
    }

    /// Simulate an outage (`false`) or recovery (`true`)
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    pub fn upsert_calls(&self) -> usize {
        self.upsert_calls.load(Ordering::SeqCst)
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("in-memory store is offline".to_string()))
        }
    }
}

impl Default for InMemoryOrderStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn get_by_key(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        Ok(self.rows.read().await.get(key).cloned())
    }

    async fn upsert(&self, key: &str, payload: &[u8]) -> Result<(), StoreError> {
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        self.rows.write().await.insert(key.to_string(), payload.to_vec());
        debug!("Stored order {} in memory", key);
        Ok(())
    }

    async fn list_keys(&self) -> Result<Vec<String>, StoreError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        let mut keys: Vec<String> = self.rows.read().await.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upsert_overwrites() {
        let store = InMemoryOrderStore::new();
        store.upsert("abc", b"first").await.unwrap();
        store.upsert("abc", b"second").await.unwrap();

        assert_eq!(store.len().await, 1);
        assert_eq!(store.get_by_key("abc").await.unwrap(), Some(b"second".to_vec()));
        assert_eq!(store.upsert_calls(), 2);
    }

    #[tokio::test]
    async fn test_missing_key() {
        let store = InMemoryOrderStore::new();
        assert_eq!(store.get_by_key("nope").await.unwrap(), None);
        assert_eq!(store.get_calls(), 1);
    }

    #[tokio::test]
    async fn test_list_keys_sorted() {
        let store = InMemoryOrderStore::with_rows(vec![
            ("b".to_string(), b"2".to_vec()),
            ("a".to_string(), b"1".to_vec()),
        ]);

        assert_eq!(store.list_keys().await.unwrap(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_outage_fails_every_operation() {
        let store = InMemoryOrderStore::with_rows(vec![("a".to_string(), b"1".to_vec())]);
        store.set_available(false);

        assert!(matches!(store.get_by_key("a").await, Err(StoreError::Unavailable(_))));
        assert!(matches!(store.upsert("b", b"2").await, Err(StoreError::Unavailable(_))));
        assert!(matches!(store.list_keys().await, Err(StoreError::Unavailable(_))));

        store.set_available(true);
        assert_eq!(store.len().await, 1);
        assert!(store.get_by_key("a").await.unwrap().is_some());
    }
}
