use sha2::{Digest, Sha512};

use super::PaymentNotification;

/// Computes the expected callback signature: hex-encoded SHA-512 over the
/// concatenation of order reference, status code, gross amount and the
/// shared server key.
pub fn expected_signature(
    order_id: &str,
    status_code: &str,
    gross_amount: &str,
    server_key: &str,
) -> String {
    let mut hasher = Sha512::new();
    hasher.update(order_id.as_bytes());
    hasher.update(status_code.as_bytes());
    hasher.update(gross_amount.as_bytes());
    hasher.update(server_key.as_bytes());
    hex::encode(hasher.finalize())
}

/// Verifies a notification's `signature_key` against the shared server key.
/// Returns `false` on any mismatch; never errors.
pub fn verify(notification: &PaymentNotification, server_key: &str) -> bool {
    let expected = expected_signature(
        &notification.order_id,
        &notification.status_code,
        &notification.gross_amount,
        server_key,
    );
    constant_time_eq(&expected, &notification.signature_key)
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut res = 0u8;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes()) {
        res |= x ^ y;
    }
    res == 0
}
