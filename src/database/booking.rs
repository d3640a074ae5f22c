use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::{DatabaseError, Result};

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Booking {
    pub id: Uuid,
    pub user_id: i64,
    pub ticket_detail_id: i64,
    pub total_tickets: i32,
    pub full_name: String,
    pub personal_id: String,
    pub booking_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Booking {
    /// Build a not-yet-persisted booking. The store assigns the id.
    pub fn new(
        user_id: i64,
        ticket_detail_id: i64,
        total_tickets: i32,
        full_name: &str,
        personal_id: &str,
        booking_date: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::nil(),
            user_id,
            ticket_detail_id,
            total_tickets,
            full_name: full_name.to_string(),
            personal_id: personal_id.to_string(),
            booking_date,
            created_at: booking_date,
            updated_at: None,
            deleted_at: None,
        }
    }

    /// Row-locked upsert. Locks the row by id inside a transaction, updates
    /// the mutable fields if it exists, inserts otherwise. A nil id skips
    /// the lookup and always inserts.
    pub async fn upsert(pool: &PgPool, booking: &Booking) -> Result<Uuid> {
        let mut tx = pool.begin().await?;

        let existing: Option<Booking> = if booking.id.is_nil() {
            None
        } else {
            sqlx::query_as("SELECT * FROM bookings WHERE id = $1 FOR UPDATE")
                .bind(booking.id)
                .fetch_optional(&mut *tx)
                .await?
        };

        let id = match existing {
            Some(_) => {
                let q = r#"UPDATE bookings
                    SET user_id = $2, ticket_detail_id = $3, total_tickets = $4,
                        full_name = $5, personal_id = $6, booking_date = $7,
                        updated_at = NOW()
                    WHERE id = $1"#;

                sqlx::query(q)
                    .bind(booking.id)
                    .bind(booking.user_id)
                    .bind(booking.ticket_detail_id)
                    .bind(booking.total_tickets)
                    .bind(&booking.full_name)
                    .bind(&booking.personal_id)
                    .bind(booking.booking_date)
                    .execute(&mut *tx)
                    .await?;

                booking.id
            }
            None => {
                let q = r#"INSERT INTO bookings
                    (user_id, ticket_detail_id, total_tickets, full_name, personal_id, booking_date)
                    VALUES ($1, $2, $3, $4, $5, $6)
                    RETURNING id"#;

                sqlx::query_scalar(q)
                    .bind(booking.user_id)
                    .bind(booking.ticket_detail_id)
                    .bind(booking.total_tickets)
                    .bind(&booking.full_name)
                    .bind(&booking.personal_id)
                    .bind(booking.booking_date)
                    .fetch_one(&mut *tx)
                    .await?
            }
        };

        tx.commit().await?;

        Ok(id)
    }

    pub async fn fetch_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Booking>> {
        let q = "SELECT * FROM bookings WHERE id = $1 AND deleted_at IS NULL";

        sqlx::query_as(q)
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(DatabaseError::Sqlx)
    }

    pub async fn fetch_latest_by_user(pool: &PgPool, user_id: i64) -> Result<Option<Booking>> {
        let q = r#"SELECT * FROM bookings
            WHERE user_id = $1 AND deleted_at IS NULL
            ORDER BY booking_date DESC
            LIMIT 1"#;

        sqlx::query_as(q)
            .bind(user_id)
            .fetch_optional(pool)
            .await
            .map_err(DatabaseError::Sqlx)
    }

    /// Quota aggregate: tickets held by the user across bookings whose
    /// payment is still pending.
    pub async fn active_tickets_by_user(pool: &PgPool, user_id: i64) -> Result<i64> {
        let q = r#"SELECT COALESCE(SUM(b.total_tickets), 0)
            FROM bookings b
            JOIN payments p ON p.booking_id = b.id
            WHERE b.user_id = $1
              AND b.deleted_at IS NULL
              AND p.status = 'pending'"#;

        let total: i64 = sqlx::query_scalar(q).bind(user_id).fetch_one(pool).await?;

        Ok(total)
    }
}
