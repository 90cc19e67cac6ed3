pub mod memory_order_store;
pub mod postgres_order_store;

pub use memory_order_store::InMemoryOrderStore;
pub use postgres_order_store::PostgresOrderStore;

use async_trait::async_trait;
use thiserror::Error;

/// Durable key → payload storage for order documents.
///
/// The store is authoritative; everything in the order cache is derived
/// from it. Payloads are opaque bytes.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Fetch the payload stored under `key`, if any
    async fn get_by_key(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Insert or replace the payload stored under `key`
    async fn upsert(&self, key: &str, payload: &[u8]) -> Result<(), StoreError>;

    /// List every key currently in the store
    async fn list_keys(&self) -> Result<Vec<String>, StoreError>;
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}
