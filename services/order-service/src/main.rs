use anyhow::Result;
use common::telemetry::{init_telemetry, shutdown_telemetry, TelemetryConfig};
use common::AppConfig;
use messaging::OrderConsumer;
use order_store::{OrderStore, PostgresOrderStore};
use read_model::{IngestionPipeline, OrderCache};
use signal_hook::consts::signal::*;
use signal_hook_tokio::Signals;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};

mod handlers;
mod ingestion_worker;
mod routes;
mod state;

use ingestion_worker::IngestionWorker;
use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::from_env();

    init_telemetry(TelemetryConfig::from_env("order-service", &config.log_level))
        .map_err(|e| anyhow::anyhow!("Failed to initialize telemetry: {}", e))?;

    info!("Starting Order Service...");
    info!("Configuration:");
    info!("  Kafka Brokers: {}", config.kafka.brokers);
    info!("  Kafka Topic: {}", config.kafka.topic);
    info!("  Consumer Group: {}", config.kafka.group_id);
    info!("  Port: {}", config.http.port);

    // Connect to database
    info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .acquire_timeout(config.database.acquire_timeout())
        .connect(&config.database.url())
        .await?;
    info!("Database connected successfully");

    let store = Arc::new(PostgresOrderStore::new(pool.clone())) as Arc<dyn OrderStore>;
    let cache = Arc::new(
        OrderCache::new(store.clone()).with_restore_concurrency(config.cache.restore_concurrency),
    );

    // Serve nothing until the cache reflects the store
    let stats = cache.restore().await;
    info!(
        "Cache restored: {} of {} orders ({} failed)",
        stats.restored, stats.total_keys, stats.failed
    );

    let pipeline = Arc::new(IngestionPipeline::new(store, cache.clone()));

    info!("Creating Kafka consumer...");
    let consumer = OrderConsumer::new(
        &config.kafka.brokers,
        &config.kafka.group_id,
        &config.kafka.topic,
    )?;
    info!("Kafka consumer created successfully");

    // Setup signal handling
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let signals = Signals::new([SIGTERM, SIGINT])?;
    let signals_handle = signals.handle();
    let signal_task = tokio::spawn(async move {
        use futures_util::stream::StreamExt;
        let mut signals = signals;
        if let Some(signal) = signals.next().await {
            info!("Received signal {}, shutting down...", signal);
        }
        let _ = shutdown_tx.send(true);
    });

    let worker = tokio::spawn(IngestionWorker::new(consumer, pipeline).run(shutdown_rx.clone()));

    // Start server
    let app = routes::create_router(AppState::new(cache));
    let addr = SocketAddr::from(([0, 0, 0, 0], config.http.port));
    info!("Order service listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let mut server_shutdown = shutdown_rx;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = server_shutdown.wait_for(|stop| *stop).await;
        })
        .await
        .map_err(|e| {
            error!("Server error: {}", e);
            e
        })?;

    // Cleanup
    info!("Shutting down order service...");
    if let Err(e) = worker.await {
        error!("Ingestion worker panicked: {}", e);
    }
    signals_handle.close();
    signal_task.abort();
    pool.close().await;
    shutdown_telemetry();
    info!("Order service stopped");

    Ok(())
}
