use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram, register_histogram_vec, register_int_gauge,
    CounterVec, Encoder, Histogram, HistogramVec, IntGauge, TextEncoder,
};

lazy_static! {
    // Ingestion metrics
    pub static ref INGEST_COUNTER: CounterVec = register_counter_vec!(
        "orders_ingested_total",
        "Total number of order messages handled by the ingestion pipeline",
        &["outcome"]
    )
    .expect("metric cannot be created");

    pub static ref INGEST_DURATION: Histogram = register_histogram!(
        "order_ingest_duration_seconds",
        "Time from message receipt to cache update in seconds",
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
    )
    .expect("metric cannot be created");

    // Cache metrics
    pub static ref CACHE_REQUEST_COUNTER: CounterVec = register_counter_vec!(
        "order_cache_requests_total",
        "Total number of order cache lookups",
        &["status"]
    )
    .expect("metric cannot be created");

    pub static ref CACHE_ENTRIES: IntGauge = register_int_gauge!(
        "order_cache_entries",
        "Number of orders currently held in the cache"
    )
    .expect("metric cannot be created");

    // Query metrics
    pub static ref QUERY_COUNTER: CounterVec = register_counter_vec!(
        "order_queries_total",
        "Total number of order lookups served",
        &["status"]
    )
    .expect("metric cannot be created");

    pub static ref QUERY_DURATION: Histogram = register_histogram!(
        "order_query_duration_seconds",
        "Order lookup duration in seconds",
        vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .expect("metric cannot be created");

    // Store metrics
    pub static ref STORE_OPERATIONS: CounterVec = register_counter_vec!(
        "order_store_operations_total",
        "Total number of order store operations",
        &["operation", "status"]
    )
    .expect("metric cannot be created");

    pub static ref STORE_DURATION: HistogramVec = register_histogram_vec!(
        "order_store_duration_seconds",
        "Order store operation duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .expect("metric cannot be created");
}

/// Get all metrics in Prometheus text format
pub fn gather_metrics() -> Result<String, Box<dyn std::error::Error>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

/// Outcome label for an ingested message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    Stored,
    Poisoned,
    Deferred,
}

impl IngestOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            IngestOutcome::Stored => "stored",
            IngestOutcome::Poisoned => "poisoned",
            IngestOutcome::Deferred => "deferred",
        }
    }
}

/// Helper function to record one pass through the ingestion pipeline
pub fn record_ingest(outcome: IngestOutcome, duration_secs: f64) {
    INGEST_COUNTER.with_label_values(&[outcome.as_str()]).inc();
    INGEST_DURATION.observe(duration_secs);
}

/// Helper function to record cache hit/miss
pub fn record_cache_request(hit: bool) {
    let status = if hit { "hit" } else { "miss" };
    CACHE_REQUEST_COUNTER.with_label_values(&[status]).inc();
}

/// Helper function to publish the current cache size
pub fn record_cache_size(entries: usize) {
    CACHE_ENTRIES.set(entries as i64);
}

/// Helper function to record an order lookup
pub fn record_query(found: bool, duration_secs: f64) {
    let status = if found { "found" } else { "not_found" };
    QUERY_COUNTER.with_label_values(&[status]).inc();
    QUERY_DURATION.observe(duration_secs);
}

/// Helper function to record order store operation
pub fn record_store_operation(operation: &str, success: bool, duration_secs: f64) {
    let status = if success { "success" } else { "error" };
    STORE_OPERATIONS
        .with_label_values(&[operation, status])
        .inc();
    STORE_DURATION
        .with_label_values(&[operation])
        .observe(duration_secs);
}
