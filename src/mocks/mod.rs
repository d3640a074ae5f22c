//! In-memory doubles for the capability interfaces, used by the scenario
//! tests. Each mirrors the atomicity its production counterpart gets from
//! Postgres, Redis or the broker: store transitions run under one mutex
//! (the row lock), stock counters mutate under the map shard lock, and the
//! bus just records what was published.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;
use serde_json::Value;
use std::sync::Mutex;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;
use uuid::Uuid;

use crate::bus::{BusError, EventPublisher};
use crate::cache::{CacheError, StockCache};
use crate::client::{ClientError, TicketClient, UserClient};
use crate::database::{Booking, BookingStore, Payment, PaymentStatus, Result as DbResult};
use crate::models::responses::UserValidate;
use crate::scheduler::{SchedulerError, TaskScheduler};

#[derive(Default)]
pub struct MemoryBookingStore {
    bookings: DashMap<Uuid, Booking>,
    payments: DashMap<Uuid, Payment>,
    next_payment_id: AtomicI64,
    row_lock: tokio::sync::Mutex<()>,
}

impl MemoryBookingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn booking_count(&self) -> usize {
        self.bookings.len()
    }
}

#[async_trait]
impl BookingStore for MemoryBookingStore {
    async fn upsert_booking(&self, booking: &Booking) -> DbResult<Uuid> {
        let _guard = self.row_lock.lock().await;

        let id = if booking.id.is_nil() {
            Uuid::new_v4()
        } else {
            booking.id
        };

        let mut stored = booking.clone();
        stored.id = id;
        if self.bookings.contains_key(&id) {
            stored.updated_at = Some(Utc::now());
        }
        self.bookings.insert(id, stored);

        Ok(id)
    }

    async fn upsert_payment(&self, payment: &Payment) -> DbResult<()> {
        let _guard = self.row_lock.lock().await;

        let mut stored = payment.clone();
        match self.payments.get(&payment.booking_id) {
            Some(existing) => {
                stored.id = existing.id;
                stored.updated_at = Some(Utc::now());
            }
            None => {
                stored.id = self.next_payment_id.fetch_add(1, Ordering::SeqCst) + 1;
            }
        }
        self.payments.insert(payment.booking_id, stored);

        Ok(())
    }

    async fn transition_payment(
        &self,
        booking_id: Uuid,
        to: PaymentStatus,
        payment_method: Option<&str>,
        payment_date: Option<DateTime<Utc>>,
    ) -> DbResult<Option<Payment>> {
        let _guard = self.row_lock.lock().await;

        let Some(mut payment) = self.payments.get_mut(&booking_id) else {
            return Ok(None);
        };

        if payment.status != PaymentStatus::Pending {
            return Ok(None);
        }

        payment.status = to;
        if let Some(method) = payment_method {
            payment.payment_method = method.to_string();
        }
        if let Some(date) = payment_date {
            payment.payment_date = Some(date);
        }
        payment.updated_at = Some(Utc::now());

        Ok(Some(payment.clone()))
    }

    async fn find_booking_by_id(&self, id: Uuid) -> DbResult<Option<Booking>> {
        Ok(self.bookings.get(&id).map(|b| b.clone()))
    }

    async fn find_latest_booking_by_user(&self, user_id: i64) -> DbResult<Option<Booking>> {
        let latest = self
            .bookings
            .iter()
            .filter(|b| b.user_id == user_id)
            .max_by_key(|b| b.booking_date)
            .map(|b| b.clone());

        Ok(latest)
    }

    async fn find_payment_by_booking(&self, booking_id: Uuid) -> DbResult<Option<Payment>> {
        Ok(self.payments.get(&booking_id).map(|p| p.clone()))
    }

    async fn count_pending_payments(&self, ticket_detail_id: i64) -> DbResult<i64> {
        let count = self
            .payments
            .iter()
            .filter(|p| p.status == PaymentStatus::Pending)
            .filter(|p| {
                self.bookings
                    .get(&p.booking_id)
                    .is_some_and(|b| b.ticket_detail_id == ticket_detail_id)
            })
            .count();

        Ok(count as i64)
    }

    async fn active_tickets_by_user(&self, user_id: i64) -> DbResult<i64> {
        let total = self
            .bookings
            .iter()
            .filter(|b| b.user_id == user_id)
            .filter(|b| {
                self.payments
                    .get(&b.id)
                    .is_some_and(|p| p.status == PaymentStatus::Pending)
            })
            .map(|b| i64::from(b.total_tickets))
            .sum();

        Ok(total)
    }
}

#[derive(Default)]
pub struct MemoryStockCache {
    stock: DashMap<i64, i64>,
}

impl MemoryStockCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stock(ticket_detail_id: i64, stock: i64) -> Self {
        let cache = Self::new();
        cache.stock.insert(ticket_detail_id, stock);
        cache
    }

    pub fn set(&self, ticket_detail_id: i64, stock: i64) {
        self.stock.insert(ticket_detail_id, stock);
    }

    pub fn current(&self, ticket_detail_id: i64) -> i64 {
        self.stock.get(&ticket_detail_id).map(|v| *v).unwrap_or(0)
    }
}

#[async_trait]
impl StockCache for MemoryStockCache {
    async fn check(&self, ticket_detail_id: i64) -> Result<i64, CacheError> {
        Ok(self.current(ticket_detail_id))
    }

    async fn decrement(&self, ticket_detail_id: i64) -> Result<i64, CacheError> {
        let mut entry = self.stock.entry(ticket_detail_id).or_insert(0);
        *entry -= 1;
        Ok(*entry)
    }

    async fn increment(&self, ticket_detail_id: i64) -> Result<i64, CacheError> {
        let mut entry = self.stock.entry(ticket_detail_id).or_insert(0);
        *entry += 1;
        Ok(*entry)
    }
}

#[derive(Default)]
pub struct MemoryBus {
    events: Mutex<Vec<(String, Value)>>,
}

impl MemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every payload published on `topic`, in publish order.
    pub fn published(&self, topic: &str) -> Vec<Value> {
        self.events
            .lock()
            .map(|events| {
                events
                    .iter()
                    .filter(|(t, _)| t == topic)
                    .map(|(_, payload)| payload.clone())
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl EventPublisher for MemoryBus {
    async fn publish(&self, topic: &str, payload: Value) -> Result<(), BusError> {
        if let Ok(mut events) = self.events.lock() {
            events.push((topic.to_string(), payload));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct MockTask {
    pub task_type: String,
    pub payload: Value,
    pub delay: Duration,
    pub max_retry: i32,
    pub timeout: Duration,
}

#[derive(Default)]
pub struct MemoryScheduler {
    tasks: DashMap<String, MockTask>,
}

impl MemoryScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn get(&self, task_id: &str) -> Option<MockTask> {
        self.tasks.get(task_id).map(|t| t.clone())
    }

    /// Pull a scheduled task out, as if the worker claimed it.
    pub fn take(&self, task_id: &str) -> Option<MockTask> {
        self.tasks.remove(task_id).map(|(_, task)| task)
    }

    /// The single scheduled task, for tests that admit one booking.
    pub fn sole_task(&self) -> Option<(String, MockTask)> {
        let mut iter = self.tasks.iter();
        let entry = iter.next()?;
        if iter.next().is_some() {
            return None;
        }
        Some((entry.key().clone(), entry.value().clone()))
    }
}

#[async_trait]
impl TaskScheduler for MemoryScheduler {
    async fn schedule(
        &self,
        task_type: &str,
        payload: Value,
        delay: Duration,
        max_retry: i32,
        timeout: Duration,
    ) -> Result<String, SchedulerError> {
        let task_id = Uuid::new_v4().to_string();

        self.tasks.insert(
            task_id.clone(),
            MockTask {
                task_type: task_type.to_string(),
                payload,
                delay,
                max_retry,
                timeout,
            },
        );

        Ok(task_id)
    }

    async fn cancel(&self, task_id: &str) -> Result<(), SchedulerError> {
        self.tasks.remove(task_id);
        Ok(())
    }
}

/// Fixed-price, fixed-stock ticket service.
pub struct StaticTicketClient {
    stock: DashMap<i64, i64>,
    unit_price: Decimal,
    fail_pricing: bool,
}

impl StaticTicketClient {
    pub fn new(unit_price: Decimal) -> Self {
        Self {
            stock: DashMap::new(),
            unit_price,
            fail_pricing: false,
        }
    }

    pub fn with_stock(unit_price: Decimal, ticket_detail_id: i64, stock: i64) -> Self {
        let client = Self::new(unit_price);
        client.stock.insert(ticket_detail_id, stock);
        client
    }

    /// Make `inquiry_amount` answer like an unreachable pricing service.
    pub fn failing_pricing(unit_price: Decimal) -> Self {
        Self {
            stock: DashMap::new(),
            unit_price,
            fail_pricing: true,
        }
    }
}

#[async_trait]
impl TicketClient for StaticTicketClient {
    async fn inquiry_stock(&self, ticket_detail_id: i64) -> Result<i64, ClientError> {
        Ok(self
            .stock
            .get(&ticket_detail_id)
            .map(|v| *v)
            .unwrap_or(0))
    }

    async fn inquiry_amount(
        &self,
        _ticket_detail_id: i64,
        total_tickets: i32,
    ) -> Result<Decimal, ClientError> {
        if self.fail_pricing {
            return Err(ClientError::Status("ticket service", 503));
        }

        Ok(self.unit_price * Decimal::from(total_tickets))
    }
}

/// Token oracle with a canned answer.
pub struct StaticUserClient {
    answer: UserValidate,
}

impl StaticUserClient {
    pub fn valid(user_id: i64, email_user: &str) -> Self {
        Self {
            answer: UserValidate {
                is_valid: true,
                user_id,
                email_user: email_user.to_string(),
            },
        }
    }

    pub fn invalid() -> Self {
        Self {
            answer: UserValidate {
                is_valid: false,
                user_id: 0,
                email_user: String::new(),
            },
        }
    }
}

#[async_trait]
impl UserClient for StaticUserClient {
    async fn validate_token(&self, _token: &str) -> Result<UserValidate, ClientError> {
        Ok(self.answer.clone())
    }
}
