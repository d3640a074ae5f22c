//! The booking state machine.
//!
//! A booking moves `admitted -> pending -> {paid | cancelled | expired}`,
//! with its state derived from the payment row. No in-process locks: the
//! Redis counter serialises admission per ticket detail, the payment row
//! lock serialises transitions per booking, and of a racing pair the loser
//! observes a terminal status and no-ops.

use chrono::{TimeDelta, Utc};
use std::sync::Arc;

use crate::bus::{EventPublisher, topics};
use crate::cache::StockCache;
use crate::client::TicketClient;
use crate::database::{Booking, BookingStore, Payment, PaymentStatus};
use crate::errors::BookingError;
use crate::models::requests::{
    BookTicketRequest, CancelNotification, InvoiceNotification, PaymentCancelRequest,
    PaymentExpiration, PaymentNotification, PaymentRequest, QueueNotification, QueuedBooking,
    StockAdjustment,
};
use crate::models::responses::{BookedTicket, PendingPaymentCount};
use crate::scheduler::{TYPE_SET_PAYMENT_EXPIRED, TaskScheduler};

/// How long an admitted booking may stay unpaid.
pub const PAYMENT_WINDOW_MINUTES: i64 = 30;

/// Per-user cap on tickets across bookings with a pending payment.
pub const MAX_TICKETS_PER_USER: i64 = 2;

const EXPIRY_MAX_RETRY: i32 = 3;

const BOOKING_CURRENCY: &str = "IDR";

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub struct Coordinator {
    store: Arc<dyn BookingStore>,
    cache: Arc<dyn StockCache>,
    bus: Arc<dyn EventPublisher>,
    scheduler: Arc<dyn TaskScheduler>,
    tickets: Arc<dyn TicketClient>,
}

impl Coordinator {
    pub fn new(
        store: Arc<dyn BookingStore>,
        cache: Arc<dyn StockCache>,
        bus: Arc<dyn EventPublisher>,
        scheduler: Arc<dyn TaskScheduler>,
        tickets: Arc<dyn TicketClient>,
    ) -> Self {
        Self {
            store,
            cache,
            bus,
            scheduler,
            tickets,
        }
    }

    /// Synchronous intake. The stock and quota checks here are fast-fail
    /// hints; the authoritative checks repeat inside the queue consumer
    /// where attempts are serialised. On success the attempt is published
    /// to the intake topic and the caller is done.
    pub async fn book_ticket(
        &self,
        req: &BookTicketRequest,
        user_id: i64,
        email_user: &str,
    ) -> Result<(), BookingError> {
        let stock = self.cache.check(req.ticket_detail_id).await?;
        if stock <= 0 {
            return Err(BookingError::bad_request("stock empty"));
        }

        let active = self.store.active_tickets_by_user(user_id).await?;
        if active + i64::from(req.total_tickets) > MAX_TICKETS_PER_USER {
            return Err(BookingError::bad_request("quota exceeded"));
        }

        let queued = QueuedBooking {
            ticket_detail_id: req.ticket_detail_id,
            full_name: req.full_name.clone(),
            personal_id: req.personal_id.clone(),
            user_id,
            total_tickets: req.total_tickets,
            email_user: email_user.to_string(),
        };

        self.bus
            .publish(topics::BOOK_TICKET, serde_json::to_value(&queued)?)
            .await?;

        let notif = QueueNotification {
            email_user: email_user.to_string(),
            message: "your booking has been queued, awaiting admission".to_string(),
        };
        self.bus
            .publish(topics::NOTIFICATION_QUEUE, serde_json::to_value(&notif)?)
            .await?;

        Ok(())
    }

    /// Queue-side admission. Order matters: pricing runs before the cache
    /// decrement so a pricing failure leaves nothing behind, and the
    /// decrement runs before the database insert because the cache is the
    /// gate and the database the audit log.
    pub async fn consume_book_ticket(&self, req: &QueuedBooking) -> Result<(), BookingError> {
        let stock = self.cache.check(req.ticket_detail_id).await?;
        if stock <= 0 {
            return Err(BookingError::bad_request("stock empty"));
        }

        let active = self.store.active_tickets_by_user(req.user_id).await?;
        if active + i64::from(req.total_tickets) > MAX_TICKETS_PER_USER {
            return Err(BookingError::bad_request("quota exceeded"));
        }

        let amount = self
            .tickets
            .inquiry_amount(req.ticket_detail_id, req.total_tickets)
            .await?;

        let remaining = self.cache.decrement(req.ticket_detail_id).await?;
        if remaining < 0 {
            // Lost the last unit to a concurrent admission.
            let _ = self.cache.increment(req.ticket_detail_id).await;
            return Err(BookingError::bad_request("stock empty"));
        }

        match self.admit(req, amount).await {
            Ok(()) => Ok(()),
            Err(err) => {
                // Undo the reservation so the counter stays exact.
                if let Err(comp) = self.cache.increment(req.ticket_detail_id).await {
                    tracing::error!(
                        ticket_detail_id = req.ticket_detail_id,
                        "compensating increment failed after admission error: {comp}"
                    );
                }
                Err(err)
            }
        }
    }

    async fn admit(
        &self,
        req: &QueuedBooking,
        amount: rust_decimal::Decimal,
    ) -> Result<(), BookingError> {
        let booking_date = Utc::now();
        let payment_expiration = booking_date + TimeDelta::minutes(PAYMENT_WINDOW_MINUTES);
        let window = std::time::Duration::from_secs(60 * PAYMENT_WINDOW_MINUTES as u64);

        let booking = Booking::new(
            req.user_id,
            req.ticket_detail_id,
            req.total_tickets,
            &req.full_name,
            &req.personal_id,
            booking_date,
        );
        let booking_id = self.store.upsert_booking(&booking).await?;

        let expiry = PaymentExpiration {
            booking_id,
            ticket_detail_id: req.ticket_detail_id,
            total_tickets: req.total_tickets,
        };
        let task_id = self
            .scheduler
            .schedule(
                TYPE_SET_PAYMENT_EXPIRED,
                serde_json::to_value(&expiry)?,
                window,
                EXPIRY_MAX_RETRY,
                window,
            )
            .await?;

        let payment = Payment::pending(
            booking_id,
            amount,
            BOOKING_CURRENCY,
            payment_expiration,
            &task_id,
        );
        self.store.upsert_payment(&payment).await?;

        let adjustment = StockAdjustment {
            ticket_detail_id: req.ticket_detail_id,
            total_tickets: req.total_tickets,
        };
        self.bus
            .publish(
                topics::DECREMENT_STOCK_TICKET,
                serde_json::to_value(&adjustment)?,
            )
            .await?;

        let invoice = InvoiceNotification {
            email_user: req.email_user.clone(),
            booking_id,
            total_amount: amount,
            currency: BOOKING_CURRENCY.to_string(),
            payment_expiration,
        };
        self.bus
            .publish(topics::NOTIFICATION_INVOICE, serde_json::to_value(&invoice)?)
            .await?;

        tracing::info!(
            %booking_id,
            user_id = req.user_id,
            ticket_detail_id = req.ticket_detail_id,
            "booking admitted, payment pending"
        );

        Ok(())
    }

    /// Settle a pending payment. The guarded transition decides the race
    /// against expiry; cancelling the expiry task afterwards is best
    /// effort, a missed cancel fires into a terminal status and no-ops.
    pub async fn payment(&self, req: &PaymentRequest, email_user: &str) -> Result<(), BookingError> {
        let payment = self
            .store
            .find_payment_by_booking(req.booking_id)
            .await?
            .ok_or_else(|| BookingError::not_found("payment not found"))?;

        if payment.status.is_terminal() {
            return Err(BookingError::bad_request("payment already paid / expired"));
        }

        let updated = self
            .store
            .transition_payment(
                req.booking_id,
                PaymentStatus::Paid,
                Some(&req.payment_method),
                Some(Utc::now()),
            )
            .await?
            .ok_or_else(|| BookingError::bad_request("payment already paid / expired"))?;

        if let Err(err) = self.scheduler.cancel(&updated.task_id).await {
            tracing::warn!(task_id = %updated.task_id, "expiry task cancel failed: {err}");
        }

        let notif = PaymentNotification {
            email_user: email_user.to_string(),
            booking_id: req.booking_id,
            total_amount: updated.amount,
            payment_method: updated.payment_method.clone(),
        };
        self.bus
            .publish(topics::NOTIFICATION_PAYMENT, serde_json::to_value(&notif)?)
            .await?;

        tracing::info!(booking_id = %req.booking_id, "payment settled");

        Ok(())
    }

    /// Cancel a pending payment and give the reserved stock back.
    pub async fn payment_cancel(
        &self,
        req: &PaymentCancelRequest,
        email_user: &str,
    ) -> Result<(), BookingError> {
        let payment = self
            .store
            .find_payment_by_booking(req.booking_id)
            .await?
            .ok_or_else(|| BookingError::not_found("payment not found"))?;

        if payment.status.is_terminal() {
            return Err(BookingError::bad_request("payment already paid / expired"));
        }

        let booking = self
            .store
            .find_booking_by_id(payment.booking_id)
            .await?
            .ok_or_else(|| BookingError::not_found("booking not found"))?;

        let updated = self
            .store
            .transition_payment(req.booking_id, PaymentStatus::Cancelled, None, None)
            .await?
            .ok_or_else(|| BookingError::bad_request("payment already paid / expired"))?;

        if let Err(err) = self.scheduler.cancel(&updated.task_id).await {
            tracing::warn!(task_id = %updated.task_id, "expiry task cancel failed: {err}");
        }

        self.cache.increment(booking.ticket_detail_id).await?;

        let adjustment = StockAdjustment {
            ticket_detail_id: booking.ticket_detail_id,
            total_tickets: booking.total_tickets,
        };
        self.bus
            .publish(
                topics::INCREMENT_STOCK_TICKET,
                serde_json::to_value(&adjustment)?,
            )
            .await?;

        let notif = CancelNotification {
            email_user: email_user.to_string(),
            booking_id: req.booking_id,
        };
        self.bus
            .publish(topics::NOTIFICATION_CANCEL, serde_json::to_value(&notif)?)
            .await?;

        tracing::info!(booking_id = %req.booking_id, "payment cancelled");

        Ok(())
    }

    /// Scheduler fire-back. Idempotent: a payment that already reached a
    /// terminal state is left alone and the task reports success.
    pub async fn set_payment_expired(&self, req: &PaymentExpiration) -> Result<(), BookingError> {
        let payment = match self.store.find_payment_by_booking(req.booking_id).await? {
            Some(payment) => payment,
            None => {
                tracing::warn!(booking_id = %req.booking_id, "expiry fired for a missing payment");
                return Ok(());
            }
        };

        if payment.status.is_terminal() {
            return Ok(());
        }

        let transitioned = self
            .store
            .transition_payment(req.booking_id, PaymentStatus::Expired, None, None)
            .await?;
        if transitioned.is_none() {
            // Somebody settled or cancelled between the read and the update.
            return Ok(());
        }

        self.cache.increment(req.ticket_detail_id).await?;

        let adjustment = StockAdjustment {
            ticket_detail_id: req.ticket_detail_id,
            total_tickets: req.total_tickets,
        };
        self.bus
            .publish(
                topics::INCREMENT_STOCK_TICKET,
                serde_json::to_value(&adjustment)?,
            )
            .await?;

        tracing::info!(booking_id = %req.booking_id, "payment expired, stock compensated");

        Ok(())
    }

    /// The caller's latest booking joined with its payment.
    pub async fn show_bookings(&self, user_id: i64) -> Result<BookedTicket, BookingError> {
        let booking = self
            .store
            .find_latest_booking_by_user(user_id)
            .await?
            .ok_or_else(|| BookingError::not_found("no booking found for user"))?;

        let payment = self
            .store
            .find_payment_by_booking(booking.id)
            .await?
            .ok_or_else(|| BookingError::not_found("payment not found"))?;

        Ok(BookedTicket {
            id: booking.id.to_string(),
            full_name: booking.full_name,
            personal_id: booking.personal_id,
            booking_date: booking.booking_date.format(DATE_FORMAT).to_string(),
            payment_expiry: payment.payment_expiration.format(DATE_FORMAT).to_string(),
            total_amount: payment.amount,
            payment_method: payment.payment_method,
            status: payment.status.to_string(),
        })
    }

    pub async fn count_pending_payment(
        &self,
        ticket_detail_id: i64,
    ) -> Result<PendingPaymentCount, BookingError> {
        let count = self.store.count_pending_payments(ticket_detail_id).await?;

        Ok(PendingPaymentCount {
            ticket_detail_id,
            count,
        })
    }
}
