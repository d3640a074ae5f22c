#![allow(dead_code)]

use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

use loket::coordinator::Coordinator;
use loket::database::BookingStore;
use loket::mocks::{
    MemoryBookingStore, MemoryBus, MemoryScheduler, MemoryStockCache, StaticTicketClient,
};
use loket::models::requests::{BookTicketRequest, QueuedBooking};

/// A coordinator wired to in-memory doubles, with the handles kept around
/// for assertions.
pub struct Rig {
    pub store: Arc<MemoryBookingStore>,
    pub cache: Arc<MemoryStockCache>,
    pub bus: Arc<MemoryBus>,
    pub scheduler: Arc<MemoryScheduler>,
    pub coordinator: Coordinator,
}

/// Rig with `stock` units of `ticket_detail_id` cached and a fixed unit
/// price.
pub fn rig(ticket_detail_id: i64, stock: i64, unit_price: Decimal) -> Rig {
    rig_with_tickets(
        ticket_detail_id,
        stock,
        Arc::new(StaticTicketClient::with_stock(
            unit_price,
            ticket_detail_id,
            stock,
        )),
    )
}

pub fn rig_with_tickets(
    ticket_detail_id: i64,
    stock: i64,
    tickets: Arc<StaticTicketClient>,
) -> Rig {
    let store = Arc::new(MemoryBookingStore::new());
    let cache = Arc::new(MemoryStockCache::with_stock(ticket_detail_id, stock));
    let bus = Arc::new(MemoryBus::new());
    let scheduler = Arc::new(MemoryScheduler::new());

    let coordinator = Coordinator::new(
        store.clone(),
        cache.clone(),
        bus.clone(),
        scheduler.clone(),
        tickets,
    );

    Rig {
        store,
        cache,
        bus,
        scheduler,
        coordinator,
    }
}

pub fn book_request(ticket_detail_id: i64, total_tickets: i32) -> BookTicketRequest {
    BookTicketRequest {
        ticket_detail_id,
        full_name: "A".to_string(),
        personal_id: "X".to_string(),
        user_id: 0,
        total_tickets,
    }
}

pub fn queued_booking(
    user_id: i64,
    email_user: &str,
    ticket_detail_id: i64,
    total_tickets: i32,
) -> QueuedBooking {
    QueuedBooking {
        ticket_detail_id,
        full_name: "A".to_string(),
        personal_id: "X".to_string(),
        user_id,
        total_tickets,
        email_user: email_user.to_string(),
    }
}

/// Run a booking through admission (T2) and return its id.
pub async fn admit_booking(
    rig: &Rig,
    user_id: i64,
    email_user: &str,
    ticket_detail_id: i64,
    total_tickets: i32,
) -> Uuid {
    let queued = queued_booking(user_id, email_user, ticket_detail_id, total_tickets);
    rig.coordinator
        .consume_book_ticket(&queued)
        .await
        .expect("admission should succeed");

    rig.store
        .find_latest_booking_by_user(user_id)
        .await
        .expect("store lookup")
        .expect("booking should exist")
        .id
}
