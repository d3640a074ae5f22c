//! Intake consumer: pulls booking attempts off the `book_ticket` topic and
//! feeds them to the coordinator one message at a time.
//!
//! Messages are committed on receipt, before processing, so the broker
//! never redelivers. Any decode or handler failure is instead republished
//! to `poisoned_queue` with the original payload; dead-letter processing is
//! an offline concern.

use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::Message;
use std::sync::Arc;

use crate::bus::{BusError, EventPublisher, topics};
use crate::config::MessageStreamConfig;
use crate::coordinator::Coordinator;
use crate::models::requests::{PoisonedQueue, QueuedBooking};

pub async fn run_intake_consumer(
    cfg: MessageStreamConfig,
    coordinator: Arc<Coordinator>,
    bus: Arc<dyn EventPublisher>,
) -> Result<(), BusError> {
    let consumer: StreamConsumer = ClientConfig::new()
        .set("bootstrap.servers", &cfg.url)
        .set("group.id", format!("{}-booking", cfg.exchange))
        .set("enable.auto.commit", "false")
        .set("auto.offset.reset", "earliest")
        .create()?;

    consumer.subscribe(&[topics::BOOK_TICKET])?;
    tracing::info!(topic = topics::BOOK_TICKET, "intake consumer subscribed");

    loop {
        let msg = match consumer.recv().await {
            Ok(msg) => msg,
            Err(err) => {
                tracing::error!("intake consumer receive failed: {err}");
                continue;
            }
        };

        let payload = msg.payload().unwrap_or_default().to_vec();

        if let Err(err) = consumer.commit_message(&msg, CommitMode::Async) {
            tracing::warn!("intake consumer commit failed: {err}");
        }

        handle_intake(&coordinator, bus.as_ref(), &payload).await;
    }
}

async fn handle_intake(coordinator: &Coordinator, bus: &dyn EventPublisher, payload: &[u8]) {
    let req: QueuedBooking = match serde_json::from_slice(payload) {
        Ok(req) => req,
        Err(err) => {
            tracing::error!("undecodable intake message: {err}");
            publish_poisoned(bus, err.to_string(), payload).await;
            return;
        }
    };

    if let Err(err) = coordinator.consume_book_ticket(&req).await {
        tracing::error!(
            user_id = req.user_id,
            ticket_detail_id = req.ticket_detail_id,
            "booking admission failed: {err}"
        );
        publish_poisoned(bus, err.to_string(), payload).await;
    }
}

async fn publish_poisoned(bus: &dyn EventPublisher, error_msg: String, payload: &[u8]) {
    let original = serde_json::from_slice(payload)
        .unwrap_or_else(|_| serde_json::Value::String(String::from_utf8_lossy(payload).into()));

    let poisoned = PoisonedQueue {
        topic_target: topics::BOOK_TICKET.to_string(),
        error_msg,
        payload: original,
    };

    let body = match serde_json::to_value(&poisoned) {
        Ok(body) => body,
        Err(err) => {
            tracing::error!("poisoned payload could not be encoded: {err}");
            return;
        }
    };

    if let Err(err) = bus.publish(topics::POISONED_QUEUE, body).await {
        tracing::error!("publish to poison queue failed: {err}");
    }
}
