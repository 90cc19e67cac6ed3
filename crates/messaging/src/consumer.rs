use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::Message;
use rdkafka::{Offset, TopicPartitionList};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum ConsumerError {
    #[error("Kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    #[error("Delivery source closed")]
    Closed,
}

/// One message pulled off the order stream, owned so it can outlive the poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<Vec<u8>>,
    pub payload: Vec<u8>,
}

impl Delivery {
    pub fn key(&self) -> Option<&[u8]> {
        self.key.as_deref()
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }
}

/// A durable, at-least-once source of order messages.
///
/// Every delivery must be settled with exactly one of `acknowledge` (never
/// deliver it again) or `redeliver` (deliver it again, including after a
/// restart).
#[async_trait]
pub trait DeliverySource: Send + Sync {
    /// Wait up to `timeout` for the next delivery
    async fn next_delivery(&self, timeout: Duration) -> Result<Option<Delivery>, ConsumerError>;

    async fn acknowledge(&self, delivery: &Delivery) -> Result<(), ConsumerError>;

    async fn redeliver(&self, delivery: &Delivery) -> Result<(), ConsumerError>;
}

/// Kafka consumer for the order topic.
///
/// Auto-commit is off: an offset is committed only when its delivery is
/// acknowledged. The consumer group id doubles as the durable subscription
/// name.
pub struct OrderConsumer {
    consumer: StreamConsumer,
}

impl OrderConsumer {
    /// Create a new Kafka consumer subscribed to `topic`
    pub fn new(brokers: &str, group_id: &str, topic: &str) -> Result<Self, ConsumerError> {
        info!(
            "Creating Kafka consumer with group_id: {}, topic: {}",
            group_id, topic
        );

        let consumer: StreamConsumer = ClientConfig::new()
            .set("group.id", group_id)
            .set("bootstrap.servers", brokers)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            .set("enable.partition.eof", "false")
            .set("session.timeout.ms", "30000")
            .set("heartbeat.interval.ms", "10000")
            .create()?;

        consumer.subscribe(&[topic])?;

        info!("Kafka consumer created successfully");
        Ok(Self { consumer })
    }

    /// Get the underlying StreamConsumer for advanced usage
    pub fn inner(&self) -> &StreamConsumer {
        &self.consumer
    }
}

#[async_trait]
impl DeliverySource for OrderConsumer {
    async fn next_delivery(&self, timeout: Duration) -> Result<Option<Delivery>, ConsumerError> {
        let message = match tokio::time::timeout(timeout, self.consumer.recv()).await {
            Ok(Ok(message)) => message,
            Ok(Err(e)) => return Err(ConsumerError::Kafka(e)),
            Err(_) => return Ok(None),
        };

        debug!(
            "Received message from topic: {}, partition: {}, offset: {}",
            message.topic(),
            message.partition(),
            message.offset()
        );

        // An empty message is still a delivery; the pipeline rejects it as poison
        // and the ack moves the group past it.
        let payload = match message.payload() {
            Some(payload) => payload.to_vec(),
            None => {
                warn!(
                    partition = message.partition(),
                    offset = message.offset(),
                    "Message has no payload"
                );
                Vec::new()
            }
        };

        Ok(Some(Delivery {
            topic: message.topic().to_string(),
            partition: message.partition(),
            offset: message.offset(),
            key: message.key().map(|k| k.to_vec()),
            payload,
        }))
    }

    async fn acknowledge(&self, delivery: &Delivery) -> Result<(), ConsumerError> {
        let mut offsets = TopicPartitionList::new();
        offsets.add_partition_offset(
            &delivery.topic,
            delivery.partition,
            Offset::Offset(delivery.offset + 1),
        )?;
        self.consumer.commit(&offsets, CommitMode::Async)?;

        debug!(
            partition = delivery.partition,
            offset = delivery.offset,
            "Committed offset"
        );
        Ok(())
    }

    async fn redeliver(&self, delivery: &Delivery) -> Result<(), ConsumerError> {
        self.consumer.seek(
            &delivery.topic,
            delivery.partition,
            Offset::Offset(delivery.offset),
            Duration::from_secs(5),
        )?;

        debug!(
            partition = delivery.partition,
            offset = delivery.offset,
            "Rewound partition for redelivery"
        );
        Ok(())
    }
}
