use common::metrics;
use domain::{OrderRecord, OrderUid};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

use crate::cache::OrderCache;

/// Result of looking up an order by its OrderUID
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Found(Arc<OrderRecord>),
    NotFound,
}

impl Lookup {
    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found(_))
    }

    pub fn into_record(self) -> Option<Arc<OrderRecord>> {
        match self {
            Lookup::Found(record) => Some(record),
            Lookup::NotFound => None,
        }
    }
}

/// Read side for order lookups.
///
/// Serves from the cache and lets the cache fall back to the store. A
/// failing store is reported as `NotFound`.
#[derive(Clone)]
pub struct QueryService {
    cache: Arc<OrderCache>,
}

impl QueryService {
    pub fn new(cache: Arc<OrderCache>) -> Self {
        Self { cache }
    }

    pub async fn lookup(&self, order_uid: &str) -> Lookup {
        let started = Instant::now();

        // An empty identifier can never have been stored.
        let lookup = match OrderUid::parse(order_uid) {
            Ok(order_uid) => match self.cache.get(order_uid.as_str()).await {
                Some(record) => Lookup::Found(record),
                None => Lookup::NotFound,
            },
            Err(e) => {
                debug!(error = %e, "Rejected order lookup");
                Lookup::NotFound
            }
        };

        metrics::record_query(lookup.is_found(), started.elapsed().as_secs_f64());
        lookup
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use order_store::{InMemoryOrderStore, OrderStore};

    fn service_with(store: Arc<InMemoryOrderStore>) -> (QueryService, Arc<OrderCache>) {
        let cache = Arc::new(OrderCache::new(store));
        (QueryService::new(cache.clone()), cache)
    }

    #[tokio::test]
    async fn test_lookup_returns_exact_payload() {
        let payload = br#"{"OrderUID":"abc123", "TrackNumber":"WBILMTESTTRACK"}"#.to_vec();
        let store = Arc::new(InMemoryOrderStore::new());
        let (service, cache) = service_with(store);

        cache.put(OrderRecord::from_payload(payload.clone()).unwrap()).await;

        let record = service.lookup("abc123").await.into_record().unwrap();
        assert_eq!(record.payload(), payload.as_slice());
    }

    #[tokio::test]
    async fn test_lookup_falls_back_to_store() {
        let store = Arc::new(InMemoryOrderStore::new());
        store.upsert("abc123", br#"{"OrderUID":"abc123"}"#).await.unwrap();
        let (service, cache) = service_with(store.clone());

        assert!(service.lookup("abc123").await.is_found());
        assert!(cache.contains("abc123").await);
        assert_eq!(store.get_calls(), 1);
    }

    #[tokio::test]
    async fn test_unknown_order_is_not_found() {
        let (service, _cache) = service_with(Arc::new(InMemoryOrderStore::new()));

        assert_eq!(service.lookup("does-not-exist").await, Lookup::NotFound);
    }

    #[tokio::test]
    async fn test_invalid_identifier_skips_store() {
        let store = Arc::new(InMemoryOrderStore::new());
        let (service, _cache) = service_with(store.clone());

        assert_eq!(service.lookup("").await, Lookup::NotFound);
        assert_eq!(store.get_calls(), 0);
    }

    #[tokio::test]
    async fn test_identifier_with_spaces_is_looked_up() {
        let store = Arc::new(InMemoryOrderStore::new());
        store.upsert("abc 123", br#"{"OrderUID":"abc 123"}"#).await.unwrap();
        let (service, _cache) = service_with(store.clone());

        assert!(service.lookup("abc 123").await.is_found());
        assert_eq!(store.get_calls(), 1);
    }

    #[tokio::test]
    async fn test_store_outage_is_not_found() {
        let store = Arc::new(InMemoryOrderStore::new());
        store.upsert("abc123", br#"{"OrderUID":"abc123"}"#).await.unwrap();
        store.set_available(false);
        let (service, _cache) = service_with(store);

        assert_eq!(service.lookup("abc123").await, Lookup::NotFound);
    }
}
