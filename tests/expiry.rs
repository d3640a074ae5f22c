mod common;

use rust_decimal::dec;

use common::{admit_booking, rig};
use loket::bus::topics;
use loket::database::{BookingStore, PaymentStatus};
use loket::models::requests::{PaymentCancelRequest, PaymentExpiration, PaymentRequest};

/// Pull the scheduled expiry payload out of the mock scheduler, as if the
/// worker had claimed and fired it.
fn fire_payload(rig: &common::Rig) -> PaymentExpiration {
    let (task_id, task) = rig.scheduler.sole_task().expect("one expiry task");
    let task = rig.scheduler.take(&task_id).unwrap_or(task);
    serde_json::from_value(task.payload).expect("expiry payload decodes")
}

#[tokio::test]
async fn expiry_restores_stock_and_publishes_increment() {
    let rig = rig(1, 5, dec!(100));
    let booking_id = admit_booking(&rig, 42, "a@example.com", 1, 1).await;
    assert_eq!(rig.cache.current(1), 4);

    let expiry = fire_payload(&rig);
    assert_eq!(expiry.booking_id, booking_id);

    rig.coordinator.set_payment_expired(&expiry).await.unwrap();

    let payment = rig
        .store
        .find_payment_by_booking(booking_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Expired);

    // Compensation is exact: back to the pre-admission value.
    assert_eq!(rig.cache.current(1), 5);
    assert_eq!(rig.bus.published(topics::INCREMENT_STOCK_TICKET).len(), 1);
}

#[tokio::test]
async fn expiry_after_payment_is_a_no_op() {
    let rig = rig(1, 5, dec!(100));
    let booking_id = admit_booking(&rig, 42, "a@example.com", 1, 1).await;

    let expiry = fire_payload(&rig);

    let req = PaymentRequest {
        booking_id,
        total_amount: dec!(100),
        payment_method: "ovo".to_string(),
    };
    rig.coordinator.payment(&req, "a@example.com").await.unwrap();

    // The task was claimed before the payment landed; when it fires it must
    // change nothing.
    rig.coordinator.set_payment_expired(&expiry).await.unwrap();

    let payment = rig
        .store
        .find_payment_by_booking(booking_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Paid);
    assert_eq!(rig.cache.current(1), 4);
    assert!(rig.bus.published(topics::INCREMENT_STOCK_TICKET).is_empty());
}

#[tokio::test]
async fn expiry_delivered_twice_compensates_once() {
    let rig = rig(1, 5, dec!(100));
    admit_booking(&rig, 42, "a@example.com", 1, 1).await;

    let expiry = fire_payload(&rig);

    rig.coordinator.set_payment_expired(&expiry).await.unwrap();
    rig.coordinator.set_payment_expired(&expiry).await.unwrap();

    assert_eq!(rig.cache.current(1), 5);
    assert_eq!(rig.bus.published(topics::INCREMENT_STOCK_TICKET).len(), 1);
}

#[tokio::test]
async fn expiry_for_missing_payment_reports_success() {
    let rig = rig(1, 5, dec!(100));

    let expiry = PaymentExpiration {
        booking_id: uuid::Uuid::new_v4(),
        ticket_detail_id: 1,
        total_tickets: 1,
    };

    rig.coordinator.set_payment_expired(&expiry).await.unwrap();
    assert_eq!(rig.cache.current(1), 5);
}

#[tokio::test]
async fn cancel_after_expiry_is_rejected() {
    let rig = rig(1, 5, dec!(100));
    let booking_id = admit_booking(&rig, 42, "a@example.com", 1, 1).await;

    let expiry = fire_payload(&rig);
    rig.coordinator.set_payment_expired(&expiry).await.unwrap();

    let err = rig
        .coordinator
        .payment_cancel(&PaymentCancelRequest { booking_id }, "a@example.com")
        .await
        .unwrap_err();

    assert!(matches!(err, loket::errors::BookingError::BadRequest(_)));
    // The expiry already gave the unit back; the rejected cancel must not
    // compensate again.
    assert_eq!(rig.cache.current(1), 5);
}

#[tokio::test]
async fn quota_frees_up_after_terminal_transitions() {
    let rig = rig(1, 10, dec!(100));

    admit_booking(&rig, 42, "a@example.com", 1, 2).await;
    assert_eq!(rig.store.active_tickets_by_user(42).await.unwrap(), 2);

    let expiry = fire_payload(&rig);
    rig.coordinator.set_payment_expired(&expiry).await.unwrap();

    assert_eq!(rig.store.active_tickets_by_user(42).await.unwrap(), 0);

    // With the previous booking expired the user may book again.
    admit_booking(&rig, 42, "a@example.com", 1, 1).await;
}
