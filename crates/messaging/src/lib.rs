pub mod consumer;
pub mod producer;

pub use consumer::{ConsumerError, Delivery, DeliverySource, OrderConsumer};
pub use producer::{OrderPublisher, PublisherError};
