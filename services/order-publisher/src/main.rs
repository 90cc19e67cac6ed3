use anyhow::Result;
use common::telemetry::{init_telemetry, shutdown_telemetry, TelemetryConfig};
use common::AppConfig;
use messaging::OrderPublisher;
use std::time::Duration;
use tracing::{error, info};

mod generator;

/// How many orders to send and how far apart
#[derive(Debug, Clone, PartialEq, Eq)]
struct PublishPlan {
    order_count: usize,
    interval: Duration,
}

impl PublishPlan {
    fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let order_count = lookup("ORDER_COUNT")
            .and_then(|v| v.parse().ok())
            .unwrap_or(10);
        let interval_ms: u64 = lookup("PUBLISH_INTERVAL_MS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(1000);

        Self {
            order_count,
            interval: Duration::from_millis(interval_ms),
        }
    }
}

/// Test publisher that sends randomly generated orders to the order topic
#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::from_env();

    init_telemetry(TelemetryConfig::from_env("order-publisher", &config.log_level))
        .map_err(|e| anyhow::anyhow!("Failed to initialize telemetry: {}", e))?;

    let plan = PublishPlan::from_env();

    info!("Configuration:");
    info!("  Kafka Brokers: {}", config.kafka.brokers);
    info!("  Kafka Topic: {}", config.kafka.topic);
    info!("  Order Count: {}", plan.order_count);
    info!("  Interval: {}ms", plan.interval.as_millis());

    let publisher = OrderPublisher::new(&config.kafka.brokers, config.kafka.topic.clone())?;

    let mut published = 0;
    for i in 0..plan.order_count {
        let order = generator::random_order();

        match publisher.publish_json(&order.order_uid, &order).await {
            Ok(()) => published += 1,
            Err(e) => error!(order_uid = %order.order_uid, "Failed to publish order: {}", e),
        }

        if i + 1 < plan.order_count {
            tokio::time::sleep(plan.interval).await;
        }
    }

    info!("Published {} of {} orders", published, plan.order_count);
    shutdown_telemetry();

    Ok(())
}
