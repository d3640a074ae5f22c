//! Durable pub/sub over Kafka-compatible brokers.
//!
//! Publishers get at-least-once delivery; every message carries an opaque
//! UUID as its key and a JSON body. Consumers commit on receipt and
//! self-publish failures to the poison topic (see `consumer`).

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use std::time::Duration;
use uuid::Uuid;

use crate::config::MessageStreamConfig;

pub mod consumer;

/// Topics used by the booking core.
pub mod topics {
    pub const BOOK_TICKET: &str = "book_ticket";
    pub const DECREMENT_STOCK_TICKET: &str = "decrement_stock_ticket";
    pub const INCREMENT_STOCK_TICKET: &str = "increment_stock_ticket";
    pub const NOTIFICATION_QUEUE: &str = "notification_queue";
    pub const NOTIFICATION_INVOICE: &str = "notification_invoice";
    pub const NOTIFICATION_PAYMENT: &str = "notification_payment";
    pub const NOTIFICATION_CANCEL: &str = "notification_cancel";
    pub const POISONED_QUEUE: &str = "poisoned_queue";
}

#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    #[error("event payload could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),
}

#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, topic: &str, payload: serde_json::Value) -> Result<(), BusError>;
}

pub struct KafkaBus {
    producer: FutureProducer,
    timeout: Duration,
}

impl KafkaBus {
    pub fn new(cfg: &MessageStreamConfig) -> Result<Self, BusError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &cfg.url)
            .set("message.timeout.ms", "5000")
            .set("acks", "1")
            .create()?;

        tracing::info!(brokers = %cfg.url, "event bus producer created");

        Ok(Self {
            producer,
            timeout: Duration::from_secs(5),
        })
    }
}

#[async_trait]
impl EventPublisher for KafkaBus {
    async fn publish(&self, topic: &str, payload: serde_json::Value) -> Result<(), BusError> {
        let key = Uuid::new_v4().to_string();
        let body = serde_json::to_vec(&payload)?;

        self.producer
            .send(
                FutureRecord::to(topic).key(&key).payload(&body),
                Timeout::After(self.timeout),
            )
            .await
            .map_err(|(err, _msg)| BusError::Kafka(err))?;

        Ok(())
    }
}
