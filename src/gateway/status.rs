use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

/// Internal payment status of an order.
///
/// Stored lowercase in the `orders.payment_status` column. `Completed` and
/// `Refunded` are terminal; the webhook pipeline never moves an order out of
/// them. `Refunded` is a modeled target only, never produced here.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    AsRefStr,
    EnumString,
    ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, PaymentStatus::Completed | PaymentStatus::Refunded)
    }
}

/// Translates the gateway's transaction/fraud status vocabulary into the
/// internal payment status.
///
/// Total and side-effect free: unrecognized combinations map to `Pending`
/// so a new gateway status can never crash the pipeline, only delay it.
pub fn map_gateway_status(transaction_status: &str, fraud_status: Option<&str>) -> PaymentStatus {
    match fraud_status {
        Some("deny") => return PaymentStatus::Failed,
        Some("challenge") => return PaymentStatus::Pending,
        _ => {}
    }

    match transaction_status {
        "capture" | "settlement" => PaymentStatus::Completed,
        "deny" | "cancel" | "expire" | "failure" => PaymentStatus::Failed,
        _ => PaymentStatus::Pending,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    const TRANSACTION_STATUSES: &[&str] = &[
        "capture",
        "settlement",
        "pending",
        "deny",
        "cancel",
        "expire",
        "failure",
        "authorize",
        "refund",
        "chargeback",
        "made-up-status",
        "",
    ];
    const FRAUD_STATUSES: &[Option<&str>] =
        &[None, Some("accept"), Some("challenge"), Some("deny"), Some("???")];

    #[test]
    fn settled_and_clean_capture_complete() {
        assert_eq!(
            map_gateway_status("settlement", None),
            PaymentStatus::Completed
        );
        assert_eq!(
            map_gateway_status("capture", Some("accept")),
            PaymentStatus::Completed
        );
    }

    #[test]
    fn denied_expired_cancelled_fail() {
        for status in ["deny", "cancel", "expire", "failure"] {
            assert_eq!(
                map_gateway_status(status, Some("accept")),
                PaymentStatus::Failed,
                "transaction_status={status}"
            );
        }
    }

    #[test]
    fn fraud_verdict_overrides_transaction_status() {
        assert_eq!(
            map_gateway_status("capture", Some("deny")),
            PaymentStatus::Failed
        );
        assert_eq!(
            map_gateway_status("capture", Some("challenge")),
            PaymentStatus::Pending
        );
    }

    #[test]
    fn unknown_combinations_stay_pending() {
        assert_eq!(
            map_gateway_status("made-up-status", Some("???")),
            PaymentStatus::Pending
        );
        assert_eq!(map_gateway_status("", None), PaymentStatus::Pending);
    }

    #[test]
    fn mapping_is_total_over_the_vocabulary() {
        // Every combination maps to exactly one internal status, no panics.
        for tx in TRANSACTION_STATUSES {
            for fraud in FRAUD_STATUSES {
                let mapped = map_gateway_status(tx, *fraud);
                assert!(matches!(
                    mapped,
                    PaymentStatus::Pending | PaymentStatus::Completed | PaymentStatus::Failed
                ));
            }
        }
    }

    #[test]
    fn status_round_trips_through_storage_form() {
        for status in [
            PaymentStatus::Pending,
            PaymentStatus::Completed,
            PaymentStatus::Failed,
            PaymentStatus::Refunded,
        ] {
            assert_eq!(PaymentStatus::from_str(status.as_ref()).unwrap(), status);
        }
        assert_eq!(PaymentStatus::Completed.as_ref(), "completed");
    }

    #[test]
    fn terminal_states() {
        assert!(PaymentStatus::Completed.is_terminal());
        assert!(PaymentStatus::Refunded.is_terminal());
        assert!(!PaymentStatus::Pending.is_terminal());
        assert!(!PaymentStatus::Failed.is_terminal());
    }
}
