use chrono::{DateTime, Utc};
use common::metrics;
use dashmap::DashMap;
use domain::{OrderRecord, OrderUid};
use futures_util::stream::{self, StreamExt};
use order_store::OrderStore;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

const DEFAULT_RESTORE_CONCURRENCY: usize = 16;

/// In-memory index of orders, backed by the order store.
///
/// The store is authoritative and every entry here was read from it or
/// written to it first, so the cache can always be rebuilt with
/// [`OrderCache::restore`]. Hits share a read lock. Misses for one key are
/// funnelled through a per-key gate so only one store fetch per key is in
/// flight; other keys are not held up.
pub struct OrderCache {
    entries: RwLock<HashMap<OrderUid, Arc<OrderRecord>>>,
    fetches: FetchGates,
    store: Arc<dyn OrderStore>,
    restore_concurrency: usize,
}

/// Statistics for a cache restore
#[derive(Debug, Clone, Default)]
pub struct RestoreStats {
    pub total_keys: usize,
    pub restored: usize,
    /// Keys listed by the store that were gone by the time they were fetched
    pub missing: usize,
    pub failed: usize,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

impl RestoreStats {
    pub fn duration_seconds(&self) -> Option<f64> {
        if let (Some(start), Some(end)) = (self.start_time, self.end_time) {
            Some((end - start).num_milliseconds() as f64 / 1000.0)
        } else {
            None
        }
    }
}

enum RestoreOutcome {
    Restored,
    Missing,
    Failed,
}

impl OrderCache {
    pub fn new(store: Arc<dyn OrderStore>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            fetches: FetchGates::default(),
            store,
            restore_concurrency: DEFAULT_RESTORE_CONCURRENCY,
        }
    }

    /// Number of store fetches kept in flight by [`OrderCache::restore`]
    pub fn with_restore_concurrency(mut self, concurrency: usize) -> Self {
        self.restore_concurrency = concurrency.max(1);
        self
    }

    /// Get an order, falling back to the store on a miss.
    ///
    /// A record found in the store is cached before it is returned. Store
    /// failures and stored documents that fail validation are logged and
    /// reported as `None`.
    pub async fn get(&self, order_uid: &str) -> Option<Arc<OrderRecord>> {
        if let Some(record) = self.cached(order_uid).await {
            metrics::record_cache_request(true);
            debug!("Cache hit for order: {}", order_uid);
            return Some(record);
        }

        metrics::record_cache_request(false);
        debug!("Cache miss for order: {}, querying store", order_uid);

        let ticket = self.fetches.ticket(order_uid);
        let _fetching = ticket.gate.lock().await;

        // Whoever held the gate before us may have filled the entry.
        if let Some(record) = self.cached(order_uid).await {
            return Some(record);
        }

        self.backfill(order_uid).await
    }

    /// Insert or replace an order in the index.
    ///
    /// Does not touch the store; callers persist first.
    pub async fn put(&self, record: OrderRecord) {
        let order_uid = record.order_uid().clone();
        let mut entries = self.entries.write().await;
        entries.insert(order_uid.clone(), Arc::new(record));
        metrics::record_cache_size(entries.len());
        debug!("Cached order: {}", order_uid);
    }

    /// Populate the cache from every order in the store.
    ///
    /// Meant to run once at startup. A key that fails to load is logged and
    /// skipped; later lookups for it go through the normal miss path.
    pub async fn restore(&self) -> RestoreStats {
        let mut stats = RestoreStats {
            start_time: Some(Utc::now()),
            ..Default::default()
        };

        info!("Restoring order cache from store");

        let started = Instant::now();
        let listed = self.store.list_keys().await;
        metrics::record_store_operation("list_keys", listed.is_ok(), started.elapsed().as_secs_f64());

        let keys = match listed {
            Ok(keys) => keys,
            Err(e) => {
                error!(error = %e, "Failed to list order keys; starting with an empty cache");
                stats.end_time = Some(Utc::now());
                return stats;
            }
        };

        stats.total_keys = keys.len();

        let outcomes: Vec<RestoreOutcome> = stream::iter(keys)
            .map(|key| self.restore_one(key))
            .buffer_unordered(self.restore_concurrency)
            .collect()
            .await;

        for outcome in outcomes {
            match outcome {
                RestoreOutcome::Restored => stats.restored += 1,
                RestoreOutcome::Missing => stats.missing += 1,
                RestoreOutcome::Failed => stats.failed += 1,
            }
        }

        stats.end_time = Some(Utc::now());

        info!(
            total = stats.total_keys,
            restored = stats.restored,
            missing = stats.missing,
            failed = stats.failed,
            duration_secs = stats.duration_seconds().unwrap_or(0.0),
            "Order cache restore completed"
        );

        stats
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Whether `order_uid` is cached, without falling back to the store
    pub async fn contains(&self, order_uid: &str) -> bool {
        self.entries.read().await.contains_key(order_uid)
    }

    async fn cached(&self, order_uid: &str) -> Option<Arc<OrderRecord>> {
        self.entries.read().await.get(order_uid).cloned()
    }

    async fn backfill(&self, order_uid: &str) -> Option<Arc<OrderRecord>> {
        let payload = match self.fetch(order_uid).await {
            Ok(Some(payload)) => payload,
            Ok(None) => {
                debug!("Order not found in store: {}", order_uid);
                return None;
            }
            Err(e) => {
                warn!(order_uid = %order_uid, error = %e, "Store read failed on cache miss");
                return None;
            }
        };

        match OrderRecord::with_key(order_uid, payload) {
            Ok(record) => Some(self.insert_if_absent(record).await),
            Err(e) => {
                error!(order_uid = %order_uid, error = %e, "Stored order failed validation");
                None
            }
        }
    }

    async fn restore_one(&self, key: String) -> RestoreOutcome {
        let payload = match self.fetch(&key).await {
            Ok(Some(payload)) => payload,
            Ok(None) => {
                warn!(order_uid = %key, "Order disappeared from store during restore");
                return RestoreOutcome::Missing;
            }
            Err(e) => {
                warn!(order_uid = %key, error = %e, "Failed to restore order");
                return RestoreOutcome::Failed;
            }
        };

        match OrderRecord::with_key(&key, payload) {
            Ok(record) => {
                self.insert_if_absent(record).await;
                RestoreOutcome::Restored
            }
            Err(e) => {
                warn!(order_uid = %key, error = %e, "Stored order failed validation during restore");
                RestoreOutcome::Failed
            }
        }
    }

    async fn fetch(&self, order_uid: &str) -> Result<Option<Vec<u8>>, order_store::StoreError> {
        let started = Instant::now();
        let result = self.store.get_by_key(order_uid).await;
        metrics::record_store_operation("get_by_key", result.is_ok(), started.elapsed().as_secs_f64());
        result
    }

    /// Store-read results never replace an entry: anything already present
    /// was put there by ingestion after a newer store write.
    async fn insert_if_absent(&self, record: OrderRecord) -> Arc<OrderRecord> {
        let mut entries = self.entries.write().await;
        let cached = entries
            .entry(record.order_uid().clone())
            .or_insert_with(|| Arc::new(record))
            .clone();
        metrics::record_cache_size(entries.len());
        cached
    }
}

/// Per-key gates for store fetches on cache misses.
#[derive(Default)]
struct FetchGates {
    gates: DashMap<String, Arc<Mutex<()>>>,
}

impl FetchGates {
    fn ticket(&self, order_uid: &str) -> GateTicket<'_> {
        let gate = self
            .gates
            .entry(order_uid.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        GateTicket {
            gates: self,
            order_uid: order_uid.to_string(),
            gate,
        }
    }
}

/// A claim on one key's gate. The last ticket for a key removes the gate
/// from the table, including when the lookup future is dropped mid-fetch.
struct GateTicket<'a> {
    gates: &'a FetchGates,
    order_uid: String,
    gate: Arc<Mutex<()>>,
}

impl Drop for GateTicket<'_> {
    fn drop(&mut self) {
        // The shard lock is held here, so no new ticket can clone the gate
        // between the count check and the removal.
        self.gates.gates.remove_if(&self.order_uid, |_, current| {
            // The table's reference plus ours
            Arc::ptr_eq(current, &self.gate) && Arc::strong_count(&self.gate) == 2
        });
    }
}
