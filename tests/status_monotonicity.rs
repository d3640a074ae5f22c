//! Property: along any sequence of transitions on one booking, the payment
//! status moves `pending -> {paid | cancelled | expired}` and never leaves
//! a terminal state.

mod common;

use proptest::prelude::*;
use rust_decimal::dec;

use common::{admit_booking, rig};
use loket::database::{BookingStore, PaymentStatus};
use loket::models::requests::{PaymentCancelRequest, PaymentExpiration, PaymentRequest};

#[derive(Debug, Clone, Copy)]
enum Op {
    Pay,
    Cancel,
    Expire,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![Just(Op::Pay), Just(Op::Cancel), Just(Op::Expire)]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn payment_status_is_monotone(ops in proptest::collection::vec(op_strategy(), 0..8)) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("runtime");

        rt.block_on(async move {
            let rig = rig(1, 100, dec!(100));
            let booking_id = admit_booking(&rig, 42, "a@example.com", 1, 1).await;

            let expiry = PaymentExpiration {
                booking_id,
                ticket_detail_id: 1,
                total_tickets: 1,
            };

            let mut previous = PaymentStatus::Pending;

            for op in ops {
                // Transitions out of a terminal state must be refused; the
                // idempotent expiry no-ops instead of failing.
                let _ = match op {
                    Op::Pay => {
                        rig.coordinator
                            .payment(
                                &PaymentRequest {
                                    booking_id,
                                    total_amount: dec!(100),
                                    payment_method: "ovo".to_string(),
                                },
                                "a@example.com",
                            )
                            .await
                    }
                    Op::Cancel => {
                        rig.coordinator
                            .payment_cancel(&PaymentCancelRequest { booking_id }, "a@example.com")
                            .await
                    }
                    Op::Expire => rig.coordinator.set_payment_expired(&expiry).await,
                };

                let current = rig
                    .store
                    .find_payment_by_booking(booking_id)
                    .await
                    .expect("store lookup")
                    .expect("payment exists")
                    .status;

                if previous.is_terminal() {
                    prop_assert_eq!(current, previous, "terminal state changed");
                }
                if previous == PaymentStatus::Pending && current != PaymentStatus::Pending {
                    prop_assert!(current.is_terminal());
                }

                previous = current;
            }

            Ok(())
        })?;
    }
}
