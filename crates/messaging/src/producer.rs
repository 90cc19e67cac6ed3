use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum PublisherError {
    #[error("Failed to create Kafka producer: {0}")]
    ProducerCreation(String),

    #[error("Failed to serialize order: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Failed to publish order: {0}")]
    PublishFailed(String),
}

/// Kafka publisher for order documents
pub struct OrderPublisher {
    producer: FutureProducer,
    topic: String,
}

impl OrderPublisher {
    /// Create a new OrderPublisher
    ///
    /// # Arguments
    /// * `brokers` - Comma-separated list of Kafka brokers (e.g., "localhost:9092")
    /// * `topic` - The topic to publish orders to
    ///
    /// # Example
    /// ```no_run
    /// use messaging::OrderPublisher;
    ///
    /// let publisher = OrderPublisher::new("localhost:9092", "orders".to_string())
    ///     .expect("Failed to create publisher");
    /// ```
    pub fn new(brokers: &str, topic: String) -> Result<Self, PublisherError> {
        info!("Creating Kafka producer for brokers: {}", brokers);

        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .set("compression.type", "snappy")
            .set("acks", "all") // Wait for all replicas to acknowledge
            .set("retries", "3") // Retry failed sends
            .create()
            .map_err(|e| PublisherError::ProducerCreation(e.to_string()))?;

        info!("Kafka producer created successfully for topic: {}", topic);

        Ok(Self { producer, topic })
    }

    /// Publish a raw order document keyed by its OrderUID
    ///
    /// Keying by OrderUID keeps every version of one order on one partition,
    /// so redeliveries and updates for an order are consumed in order.
    pub async fn publish(&self, order_uid: &str, payload: &[u8]) -> Result<(), PublisherError> {
        let record = FutureRecord::to(&self.topic)
            .key(order_uid)
            .payload(payload);

        match self
            .producer
            .send(record, Timeout::After(Duration::from_secs(5)))
            .await
        {
            Ok((partition, offset)) => {
                info!(
                    order_uid = %order_uid,
                    "Order published to topic '{}', partition {}, offset {}",
                    self.topic, partition, offset
                );
                Ok(())
            }
            Err((err, _)) => {
                warn!(order_uid = %order_uid, "Failed to publish order: {}", err);
                Err(PublisherError::PublishFailed(err.to_string()))
            }
        }
    }

    /// Serialize and publish an order document
    ///
    /// # Example
    /// ```no_run
    /// use messaging::OrderPublisher;
    /// use serde::Serialize;
    ///
    /// #[derive(Serialize)]
    /// struct Order {
    ///     #[serde(rename = "OrderUID")]
    ///     order_uid: String,
    /// }
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let publisher = OrderPublisher::new("localhost:9092", "orders".to_string())?;
    /// let order = Order { order_uid: "abc123".to_string() };
    ///
    /// publisher.publish_json("abc123", &order).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn publish_json<T: Serialize>(
        &self,
        order_uid: &str,
        order: &T,
    ) -> Result<(), PublisherError> {
        let payload = serde_json::to_vec(order)?;
        self.publish(order_uid, &payload).await
    }
}
