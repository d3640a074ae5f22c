use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::database::{DatabaseError, Result};

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Payment {
    pub id: i64,
    pub booking_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub status: PaymentStatus,
    pub payment_method: String,
    pub payment_date: Option<DateTime<Utc>>,
    pub payment_expiration: DateTime<Utc>,
    pub task_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema,
)]
#[sqlx(type_name = "payment_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    Cancelled,
    Expired,
}

impl PaymentStatus {
    /// Terminal states never transition further.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Cancelled => "cancelled",
            PaymentStatus::Expired => "expired",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Payment {
    /// A freshly admitted payment: pending, no method, expiry task attached.
    pub fn pending(
        booking_id: Uuid,
        amount: Decimal,
        currency: &str,
        payment_expiration: DateTime<Utc>,
        task_id: &str,
    ) -> Self {
        Self {
            id: 0,
            booking_id,
            amount,
            currency: currency.to_string(),
            status: PaymentStatus::Pending,
            payment_method: String::new(),
            payment_date: None,
            payment_expiration,
            task_id: task_id.to_string(),
            created_at: Utc::now(),
            updated_at: None,
            deleted_at: None,
        }
    }

    /// Row-locked upsert keyed by `booking_id`.
    pub async fn upsert(pool: &PgPool, payment: &Payment) -> Result<()> {
        let mut tx = pool.begin().await?;

        let existing: Option<Payment> =
            sqlx::query_as("SELECT * FROM payments WHERE booking_id = $1 FOR UPDATE")
                .bind(payment.booking_id)
                .fetch_optional(&mut *tx)
                .await?;

        match existing {
            Some(_) => {
                let q = r#"UPDATE payments
                    SET amount = $2, currency = $3, status = $4, payment_method = $5,
                        payment_date = $6, payment_expiration = $7, task_id = $8,
                        updated_at = NOW()
                    WHERE booking_id = $1"#;

                sqlx::query(q)
                    .bind(payment.booking_id)
                    .bind(payment.amount)
                    .bind(&payment.currency)
                    .bind(payment.status)
                    .bind(&payment.payment_method)
                    .bind(payment.payment_date)
                    .bind(payment.payment_expiration)
                    .bind(&payment.task_id)
                    .execute(&mut *tx)
                    .await?;
            }
            None => {
                let q = r#"INSERT INTO payments
                    (booking_id, amount, currency, status, payment_method,
                     payment_date, payment_expiration, task_id)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"#;

                sqlx::query(q)
                    .bind(payment.booking_id)
                    .bind(payment.amount)
                    .bind(&payment.currency)
                    .bind(payment.status)
                    .bind(&payment.payment_method)
                    .bind(payment.payment_date)
                    .bind(payment.payment_expiration)
                    .bind(&payment.task_id)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        tx.commit().await?;

        Ok(())
    }

    /// Guarded transition out of `pending`. The status check and the update
    /// run in one statement, so of two racing callers exactly one gets the
    /// row back; the other sees `None` and must not apply side effects.
    pub async fn transition(
        pool: &PgPool,
        booking_id: Uuid,
        to: PaymentStatus,
        payment_method: Option<&str>,
        payment_date: Option<DateTime<Utc>>,
    ) -> Result<Option<Payment>> {
        let q = r#"UPDATE payments
            SET status = $2,
                payment_method = COALESCE($3, payment_method),
                payment_date = COALESCE($4, payment_date),
                updated_at = NOW()
            WHERE booking_id = $1 AND status = 'pending'
            RETURNING *"#;

        sqlx::query_as(q)
            .bind(booking_id)
            .bind(to)
            .bind(payment_method)
            .bind(payment_date)
            .fetch_optional(pool)
            .await
            .map_err(DatabaseError::Sqlx)
    }

    pub async fn fetch_by_booking(pool: &PgPool, booking_id: Uuid) -> Result<Option<Payment>> {
        let q = "SELECT * FROM payments WHERE booking_id = $1 AND deleted_at IS NULL";

        sqlx::query_as(q)
            .bind(booking_id)
            .fetch_optional(pool)
            .await
            .map_err(DatabaseError::Sqlx)
    }

    pub async fn count_pending_by_detail(pool: &PgPool, ticket_detail_id: i64) -> Result<i64> {
        let q = r#"SELECT COUNT(*)
            FROM payments p
            JOIN bookings b ON b.id = p.booking_id
            WHERE b.ticket_detail_id = $1 AND p.status = 'pending'"#;

        let count: i64 = sqlx::query_scalar(q)
            .bind(ticket_detail_id)
            .fetch_one(pool)
            .await?;

        Ok(count)
    }
}
