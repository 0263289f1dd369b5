use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

/// One inbound webhook payload describing a transaction status change.
///
/// Transient and untrusted: nothing in here is acted upon until the
/// signature verifier accepts it.
#[derive(Clone, Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct PaymentNotification {
    /// External order reference as echoed by the gateway
    #[validate(length(min = 1, max = 64))]
    pub order_id: String,

    #[validate(length(min = 1, max = 32))]
    pub transaction_status: String,

    /// Absent for payment types the gateway does not fraud-screen
    pub fraud_status: Option<String>,

    #[validate(length(min = 1, max = 8))]
    pub status_code: String,

    /// Declared gross amount, formatted by the gateway (e.g. "150000.00")
    #[validate(length(min = 1, max = 32))]
    pub gross_amount: String,

    /// Hex-encoded SHA-512 digest over order_id, status_code, gross_amount
    /// and the shared server key
    #[validate(length(min = 1))]
    pub signature_key: String,

    #[validate(length(min = 1, max = 128))]
    pub transaction_id: String,

    #[validate(length(min = 1, max = 32))]
    pub payment_type: String,

    #[validate(length(min = 1, max = 64))]
    pub transaction_time: String,
}

impl PaymentNotification {
    /// Declared gross amount as whole currency units, if it parses.
    /// Used only for an audit warning; the signature already covers the raw
    /// string.
    pub fn gross_amount_units(&self) -> Option<i64> {
        let trimmed = self.gross_amount.trim();
        match trimmed.split_once('.') {
            Some((units, fraction)) if fraction.chars().all(|c| c == '0') => {
                units.parse::<i64>().ok()
            }
            Some(_) => None,
            None => trimmed.parse::<i64>().ok(),
        }
    }
}
