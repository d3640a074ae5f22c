use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

pub mod booking;
pub mod payment;

pub use booking::Booking;
pub use payment::{Payment, PaymentStatus};

#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

pub type Result<T> = std::result::Result<T, DatabaseError>;

/// Transactional persistence of booking and payment rows. Mutations are
/// atomic at row granularity; concurrent writers are serialised by the
/// row lock taken inside each upsert.
#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Insert or update a booking. A nil id means "assign one".
    async fn upsert_booking(&self, booking: &Booking) -> Result<Uuid>;

    /// Insert or update the payment keyed by its booking id.
    async fn upsert_payment(&self, payment: &Payment) -> Result<()>;

    /// Move a pending payment into a terminal state. Returns the updated
    /// row, or `None` when the payment was no longer pending (the caller
    /// lost the race and must not apply side effects).
    async fn transition_payment(
        &self,
        booking_id: Uuid,
        to: PaymentStatus,
        payment_method: Option<&str>,
        payment_date: Option<DateTime<Utc>>,
    ) -> Result<Option<Payment>>;

    async fn find_booking_by_id(&self, id: Uuid) -> Result<Option<Booking>>;

    /// Latest booking made by the user, if any.
    async fn find_latest_booking_by_user(&self, user_id: i64) -> Result<Option<Booking>>;

    async fn find_payment_by_booking(&self, booking_id: Uuid) -> Result<Option<Payment>>;

    /// Number of pending payments for a ticket detail.
    async fn count_pending_payments(&self, ticket_detail_id: i64) -> Result<i64>;

    /// Sum of `total_tickets` over the user's bookings whose payment is
    /// still pending. This is the per-user quota aggregate.
    async fn active_tickets_by_user(&self, user_id: i64) -> Result<i64>;
}

#[derive(Clone)]
pub struct PgBookingStore {
    pool: PgPool,
}

impl PgBookingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BookingStore for PgBookingStore {
    async fn upsert_booking(&self, booking: &Booking) -> Result<Uuid> {
        Booking::upsert(&self.pool, booking).await
    }

    async fn upsert_payment(&self, payment: &Payment) -> Result<()> {
        Payment::upsert(&self.pool, payment).await
    }

    async fn transition_payment(
        &self,
        booking_id: Uuid,
        to: PaymentStatus,
        payment_method: Option<&str>,
        payment_date: Option<DateTime<Utc>>,
    ) -> Result<Option<Payment>> {
        Payment::transition(&self.pool, booking_id, to, payment_method, payment_date).await
    }

    async fn find_booking_by_id(&self, id: Uuid) -> Result<Option<Booking>> {
        Booking::fetch_by_id(&self.pool, id).await
    }

    async fn find_latest_booking_by_user(&self, user_id: i64) -> Result<Option<Booking>> {
        Booking::fetch_latest_by_user(&self.pool, user_id).await
    }

    async fn find_payment_by_booking(&self, booking_id: Uuid) -> Result<Option<Payment>> {
        Payment::fetch_by_booking(&self.pool, booking_id).await
    }

    async fn count_pending_payments(&self, ticket_detail_id: i64) -> Result<i64> {
        Payment::count_pending_by_detail(&self.pool, ticket_detail_id).await
    }

    async fn active_tickets_by_user(&self, user_id: i64) -> Result<i64> {
        Booking::active_tickets_by_user(&self.pool, user_id).await
    }
}
