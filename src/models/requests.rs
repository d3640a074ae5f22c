use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::BookingError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BookTicketRequest {
    pub ticket_detail_id: i64,
    pub full_name: String,
    pub personal_id: String,
    #[serde(default)]
    pub user_id: i64,
    pub total_tickets: i32,
}

impl BookTicketRequest {
    pub fn validate(&self) -> Result<(), BookingError> {
        if self.ticket_detail_id <= 0 {
            return Err(BookingError::bad_request("ticket_detail_id is required"));
        }
        if self.full_name.trim().is_empty() {
            return Err(BookingError::bad_request("full_name is required"));
        }
        if self.personal_id.trim().is_empty() {
            return Err(BookingError::bad_request("personal_id is required"));
        }
        if self.total_tickets < 1 {
            return Err(BookingError::bad_request("total_tickets must be at least 1"));
        }

        Ok(())
    }
}

/// Body of the `book_ticket` intake topic: the booking request plus the
/// identity the auth layer resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedBooking {
    pub ticket_detail_id: i64,
    pub full_name: String,
    pub personal_id: String,
    pub user_id: i64,
    pub total_tickets: i32,
    pub email_user: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PaymentRequest {
    pub booking_id: Uuid,
    pub total_amount: Decimal,
    pub payment_method: String,
}

impl PaymentRequest {
    pub fn validate(&self) -> Result<(), BookingError> {
        if self.booking_id.is_nil() {
            return Err(BookingError::bad_request("booking_id is required"));
        }
        if self.payment_method.trim().is_empty() {
            return Err(BookingError::bad_request("payment_method is required"));
        }
        if self.total_amount < Decimal::ZERO {
            return Err(BookingError::bad_request("total_amount must not be negative"));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PaymentCancelRequest {
    pub booking_id: Uuid,
}

impl PaymentCancelRequest {
    pub fn validate(&self) -> Result<(), BookingError> {
        if self.booking_id.is_nil() {
            return Err(BookingError::bad_request("booking_id is required"));
        }

        Ok(())
    }
}

/// Payload of the `set_payment_expired` scheduler task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentExpiration {
    pub booking_id: Uuid,
    pub ticket_detail_id: i64,
    pub total_tickets: i32,
}

/// Dead-letter envelope, self-published by consumers on handler failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoisonedQueue {
    pub topic_target: String,
    pub error_msg: String,
    pub payload: serde_json::Value,
}

/// Body of `decrement_stock_ticket` / `increment_stock_ticket`, consumed by
/// the ticket service to adjust authoritative stock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockAdjustment {
    pub ticket_detail_id: i64,
    pub total_tickets: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueNotification {
    pub email_user: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceNotification {
    pub email_user: String,
    pub booking_id: Uuid,
    pub total_amount: Decimal,
    pub currency: String,
    pub payment_expiration: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentNotification {
    pub email_user: String,
    pub booking_id: Uuid,
    pub total_amount: Decimal,
    pub payment_method: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancelNotification {
    pub email_user: String,
    pub booking_id: Uuid,
}
