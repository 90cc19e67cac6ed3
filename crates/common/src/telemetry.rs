use opentelemetry::global;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Telemetry configuration
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub service_name: String,
    pub log_level: String,
    pub jaeger_endpoint: Option<String>,
    pub enable_jaeger: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "order-service".to_string(),
            log_level: "info".to_string(),
            jaeger_endpoint: None,
            enable_jaeger: false,
        }
    }
}

impl TelemetryConfig {
    /// Read `ENABLE_JAEGER` and `JAEGER_ENDPOINT`; the level comes from the app config
    pub fn from_env(service_name: &str, log_level: &str) -> Self {
        let enable_jaeger = std::env::var("ENABLE_JAEGER")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(false);

        Self {
            service_name: service_name.to_string(),
            log_level: log_level.to_string(),
            jaeger_endpoint: std::env::var("JAEGER_ENDPOINT").ok(),
            enable_jaeger,
        }
    }
}

/// Initialize JSON logging, plus Jaeger export when enabled
pub fn init_telemetry(config: TelemetryConfig) -> Result<(), Box<dyn std::error::Error>> {
    global::set_text_map_propagator(TraceContextPropagator::new());

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_level(true)
        .with_thread_ids(true)
        .json();

    if config.enable_jaeger {
        let tracer = opentelemetry_jaeger::new_agent_pipeline()
            .with_service_name(&config.service_name)
            .with_endpoint(config.jaeger_endpoint.unwrap_or_else(|| "localhost:6831".to_string()))
            .install_batch(opentelemetry_sdk::runtime::Tokio)?;

        let telemetry_layer = tracing_opentelemetry::layer().with_tracer(tracer);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .with(telemetry_layer)
            .try_init()?;

        tracing::info!(
            service = %config.service_name,
            "Telemetry initialized with Jaeger tracing"
        );
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()?;

        tracing::info!(
            service = %config.service_name,
            "Telemetry initialized without Jaeger"
        );
    }

    Ok(())
}

/// Flush pending spans before exit
pub fn shutdown_telemetry() {
    global::shutdown_tracer_provider();
}
