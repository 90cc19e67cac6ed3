use common::metrics::{self, IngestOutcome};
use domain::{DomainError, OrderRecord, OrderUid};
use order_store::OrderStore;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use crate::cache::OrderCache;
use crate::IngestError;

/// Turns inbound order messages into durable, cached records.
///
/// Each message goes received → validated → persisted → cached. The store
/// write always lands before the cache update, so a crash in between is
/// repaired by the next restore. Settling the message with the transport is
/// left to the caller, driven by [`IngestError::disposition`].
pub struct IngestionPipeline {
    store: Arc<dyn OrderStore>,
    cache: Arc<OrderCache>,
}

impl IngestionPipeline {
    pub fn new(store: Arc<dyn OrderStore>, cache: Arc<OrderCache>) -> Self {
        Self { store, cache }
    }

    /// Process a single message.
    ///
    /// `key` is the transport's message key, if it carries one; when present
    /// it must match the document's OrderUID. Reprocessing the same message
    /// overwrites the same store row and cache entry.
    pub async fn process(&self, key: Option<&[u8]>, payload: &[u8]) -> Result<OrderUid, IngestError> {
        let started = Instant::now();
        let result = self.ingest(key, payload).await;

        let outcome = match &result {
            Ok(order_uid) => {
                info!(order_uid = %order_uid, "Order persisted and cached");
                IngestOutcome::Stored
            }
            Err(e) if e.is_poison() => {
                error!(
                    error = %e,
                    payload_bytes = payload.len(),
                    data_loss = true,
                    "Dropping order message that can never be processed"
                );
                IngestOutcome::Poisoned
            }
            Err(e) => {
                warn!(error = %e, "Order not persisted, leaving message for redelivery");
                IngestOutcome::Deferred
            }
        };

        metrics::record_ingest(outcome, started.elapsed().as_secs_f64());
        result
    }

    async fn ingest(&self, key: Option<&[u8]>, payload: &[u8]) -> Result<OrderUid, IngestError> {
        let record = match message_key(key)? {
            Some(key) => OrderRecord::with_key(key, payload.to_vec())?,
            None => OrderRecord::from_payload(payload.to_vec())?,
        };
        let order_uid = record.order_uid().clone();

        let started = Instant::now();
        let stored = self.store.upsert(order_uid.as_str(), record.payload()).await;
        metrics::record_store_operation("upsert", stored.is_ok(), started.elapsed().as_secs_f64());

        stored.map_err(|source| IngestError::StoreUnavailable {
            order_uid: order_uid.to_string(),
            source,
        })?;

        self.cache.put(record).await;

        Ok(order_uid)
    }
}

/// An empty key is treated as no key at all.
fn message_key(key: Option<&[u8]>) -> Result<Option<&str>, IngestError> {
    match key {
        None => Ok(None),
        Some(bytes) if bytes.is_empty() => Ok(None),
        Some(bytes) => std::str::from_utf8(bytes).map(Some).map_err(|_| {
            IngestError::Validation(DomainError::Validation(
                "message key is not valid UTF-8".to_string(),
            ))
        }),
    }
}
