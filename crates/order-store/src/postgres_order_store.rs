use super::{OrderStore, StoreError};
use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{debug, error, info};

/// PostgreSQL implementation of the order store
///
/// Expects the `orders` table from `migrations/001_create_orders.sql`.
pub struct PostgresOrderStore {
    pool: PgPool,
}

impl PostgresOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the database pool (useful for testing)
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl OrderStore for PostgresOrderStore {
    async fn get_by_key(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        debug!("Loading order {} from database", key);

        let payload: Option<Vec<u8>> =
            sqlx::query_scalar("SELECT payload FROM orders WHERE order_uid = $1")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;

        Ok(payload)
    }

    async fn upsert(&self, key: &str, payload: &[u8]) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO orders (order_uid, payload, updated_at)
            VALUES ($1, $2, now())
            ON CONFLICT (order_uid)
            DO UPDATE SET payload = EXCLUDED.payload, updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(key)
        .bind(payload)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {
                debug!("Upserted order {} ({} bytes)", key, payload.len());
                Ok(())
            }
            Err(e) => {
                error!("Failed to upsert order {}: {}", key, e);
                Err(StoreError::DatabaseError(e))
            }
        }
    }

    async fn list_keys(&self) -> Result<Vec<String>, StoreError> {
        let keys: Vec<String> = sqlx::query_scalar("SELECT order_uid FROM orders ORDER BY order_uid")
            .fetch_all(&self.pool)
            .await?;

        info!("Listed {} order keys from database", keys.len());

        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    // Note: Integration tests are in tests/postgres_order_store_tests.rs
    // Run with: cargo test -p order-store -- --ignored

    use super::*;

    #[tokio::test]
    async fn test_store_creation() {
        let pool = PgPool::connect_lazy("postgresql://test").unwrap();
        let store = PostgresOrderStore::new(pool);
        assert!(!store.pool().is_closed());
    }
}
