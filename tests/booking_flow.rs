mod common;

use rust_decimal::{Decimal, dec};
use std::time::Duration;

use common::{admit_booking, book_request, queued_booking, rig};
use loket::bus::topics;
use loket::database::{BookingStore, PaymentStatus};
use loket::errors::BookingError;
use loket::mocks::StaticTicketClient;
use loket::models::requests::{PaymentCancelRequest, PaymentRequest};
use loket::scheduler::TYPE_SET_PAYMENT_EXPIRED;

#[tokio::test]
async fn happy_path_admits_booking_with_pending_payment() {
    let rig = rig(1, 5, dec!(100));

    let req = book_request(1, 1);
    rig.coordinator
        .book_ticket(&req, 42, "a@example.com")
        .await
        .unwrap();

    // Intake published the attempt and the queued notification.
    assert_eq!(rig.bus.published(topics::BOOK_TICKET).len(), 1);
    assert_eq!(rig.bus.published(topics::NOTIFICATION_QUEUE).len(), 1);

    let booking_id = admit_booking(&rig, 42, "a@example.com", 1, 1).await;

    let booking = rig
        .store
        .find_booking_by_id(booking_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(booking.user_id, 42);
    assert_eq!(booking.total_tickets, 1);
    assert_eq!(rig.store.booking_count(), 1);

    let payment = rig
        .store
        .find_payment_by_booking(booking_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Pending);
    assert_eq!(payment.currency, "IDR");
    assert_eq!(payment.amount, dec!(100));
    assert!(payment.payment_method.is_empty());

    assert_eq!(rig.cache.current(1), 4);

    let (_, task) = rig.scheduler.sole_task().expect("one expiry task");
    assert_eq!(task.task_type, TYPE_SET_PAYMENT_EXPIRED);
    assert_eq!(task.delay, Duration::from_secs(30 * 60));
    assert_eq!(task.max_retry, 3);

    assert_eq!(rig.bus.published(topics::DECREMENT_STOCK_TICKET).len(), 1);
    let invoices = rig.bus.published(topics::NOTIFICATION_INVOICE);
    assert_eq!(invoices.len(), 1);
    assert_eq!(invoices[0]["email_user"], "a@example.com");
}

#[tokio::test]
async fn pay_before_expiry_settles_and_cancels_the_task() {
    let rig = rig(1, 5, dec!(100));
    let booking_id = admit_booking(&rig, 42, "a@example.com", 1, 1).await;

    let req = PaymentRequest {
        booking_id,
        total_amount: dec!(100),
        payment_method: "ovo".to_string(),
    };
    rig.coordinator.payment(&req, "a@example.com").await.unwrap();

    let payment = rig
        .store
        .find_payment_by_booking(booking_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Paid);
    assert_eq!(payment.payment_method, "ovo");
    assert!(payment.payment_date.is_some());
    // The stored amount and currency are authoritative, not the caller's.
    assert_eq!(payment.amount, dec!(100));
    assert_eq!(payment.currency, "IDR");

    assert_eq!(rig.scheduler.task_count(), 0, "expiry task was cancelled");
    assert_eq!(rig.bus.published(topics::NOTIFICATION_PAYMENT).len(), 1);

    // Paid stock stays committed.
    assert_eq!(rig.cache.current(1), 4);
}

#[tokio::test]
async fn cancel_compensates_the_cache_exactly() {
    let rig = rig(1, 5, dec!(100));
    let booking_id = admit_booking(&rig, 42, "a@example.com", 1, 1).await;
    assert_eq!(rig.cache.current(1), 4);

    let req = PaymentCancelRequest { booking_id };
    rig.coordinator
        .payment_cancel(&req, "a@example.com")
        .await
        .unwrap();

    let payment = rig
        .store
        .find_payment_by_booking(booking_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Cancelled);

    assert_eq!(rig.cache.current(1), 5);
    assert_eq!(rig.scheduler.task_count(), 0);
    assert_eq!(rig.bus.published(topics::INCREMENT_STOCK_TICKET).len(), 1);
    assert_eq!(rig.bus.published(topics::NOTIFICATION_CANCEL).len(), 1);
}

#[tokio::test]
async fn double_pay_is_rejected_as_bad_request() {
    let rig = rig(1, 5, dec!(100));
    let booking_id = admit_booking(&rig, 42, "a@example.com", 1, 1).await;

    let req = PaymentRequest {
        booking_id,
        total_amount: dec!(100),
        payment_method: "ovo".to_string(),
    };
    rig.coordinator.payment(&req, "a@example.com").await.unwrap();

    let err = rig
        .coordinator
        .payment(&req, "a@example.com")
        .await
        .unwrap_err();
    match err {
        BookingError::BadRequest(msg) => assert_eq!(msg, "payment already paid / expired"),
        other => panic!("expected BadRequest, got {other:?}"),
    }
}

#[tokio::test]
async fn intake_rejects_when_stock_is_empty() {
    let rig = rig(1, 0, dec!(100));

    let err = rig
        .coordinator
        .book_ticket(&book_request(1, 1), 42, "a@example.com")
        .await
        .unwrap_err();

    assert!(matches!(err, BookingError::BadRequest(msg) if msg == "stock empty"));
    assert!(rig.bus.published(topics::BOOK_TICKET).is_empty());
}

#[tokio::test]
async fn intake_rejects_over_quota_users() {
    let rig = rig(1, 10, dec!(100));

    // Two admitted single-ticket bookings exhaust the quota.
    admit_booking(&rig, 42, "a@example.com", 1, 1).await;
    admit_booking(&rig, 42, "a@example.com", 1, 1).await;

    let err = rig
        .coordinator
        .book_ticket(&book_request(1, 1), 42, "a@example.com")
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::BadRequest(msg) if msg == "quota exceeded"));

    // The consumer-side re-check holds the same line.
    let err = rig
        .coordinator
        .consume_book_ticket(&queued_booking(42, "a@example.com", 1, 1))
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::BadRequest(msg) if msg == "quota exceeded"));
}

#[tokio::test]
async fn sold_out_at_consume_admits_exactly_one() {
    let rig = rig(7, 1, dec!(100));

    let first = rig
        .coordinator
        .consume_book_ticket(&queued_booking(42, "a@example.com", 7, 1))
        .await;
    let second = rig
        .coordinator
        .consume_book_ticket(&queued_booking(43, "b@example.com", 7, 1))
        .await;

    assert!(first.is_ok());
    let err = second.unwrap_err();
    assert!(matches!(err, BookingError::BadRequest(msg) if msg == "stock empty"));

    assert_eq!(rig.cache.current(7), 0);
    assert_eq!(rig.store.booking_count(), 1);
}

#[tokio::test]
async fn concurrent_admissions_never_oversell() {
    let rig = std::sync::Arc::new(rig(7, 1, dec!(100)));

    let a = {
        let rig = rig.clone();
        tokio::spawn(async move {
            rig.coordinator
                .consume_book_ticket(&queued_booking(42, "a@example.com", 7, 1))
                .await
        })
    };
    let b = {
        let rig = rig.clone();
        tokio::spawn(async move {
            rig.coordinator
                .consume_book_ticket(&queued_booking(43, "b@example.com", 7, 1))
                .await
        })
    };

    let (a, b) = (a.await.unwrap(), b.await.unwrap());
    let successes = [&a, &b].iter().filter(|r| r.is_ok()).count();

    assert_eq!(successes, 1, "one unit of stock admits one booking");
    assert_eq!(rig.cache.current(7), 0);
}

#[tokio::test]
async fn pricing_failure_leaves_no_state_behind() {
    let tickets = std::sync::Arc::new(StaticTicketClient::failing_pricing(dec!(100)));
    let rig = common::rig_with_tickets(1, 5, tickets);

    let err = rig
        .coordinator
        .consume_book_ticket(&queued_booking(42, "a@example.com", 1, 1))
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::Client(_)));

    // Pricing runs before the decrement: nothing to compensate.
    assert_eq!(rig.cache.current(1), 5);
    assert_eq!(rig.store.booking_count(), 0);
    assert_eq!(rig.scheduler.task_count(), 0);
}

#[tokio::test]
async fn show_bookings_returns_the_joined_view() {
    let rig = rig(1, 5, dec!(250));
    let booking_id = admit_booking(&rig, 42, "a@example.com", 1, 2).await;

    let view = rig.coordinator.show_bookings(42).await.unwrap();
    assert_eq!(view.id, booking_id.to_string());
    assert_eq!(view.full_name, "A");
    assert_eq!(view.total_amount, dec!(500));
    assert_eq!(view.status, "pending");

    let err = rig.coordinator.show_bookings(999).await.unwrap_err();
    assert!(matches!(err, BookingError::NotFound(_)));
}

#[tokio::test]
async fn pending_payment_count_tracks_admissions() {
    let rig = rig(1, 5, dec!(100));

    let none = rig.coordinator.count_pending_payment(1).await.unwrap();
    assert_eq!(none.count, 0);

    admit_booking(&rig, 42, "a@example.com", 1, 1).await;
    admit_booking(&rig, 43, "b@example.com", 1, 1).await;

    let two = rig.coordinator.count_pending_payment(1).await.unwrap();
    assert_eq!(two.count, 2);
    assert_eq!(two.ticket_detail_id, 1);
}

#[tokio::test]
async fn payment_for_unknown_booking_is_not_found() {
    let rig = rig(1, 5, dec!(100));

    let req = PaymentRequest {
        booking_id: uuid::Uuid::new_v4(),
        total_amount: Decimal::ZERO,
        payment_method: "ovo".to_string(),
    };
    let err = rig
        .coordinator
        .payment(&req, "a@example.com")
        .await
        .unwrap_err();

    assert!(matches!(err, BookingError::NotFound(_)));
}
