//! Payment gateway integration: the inbound notification payload, the
//! signature verifier and the status vocabulary mapper. Everything here is
//! pure; talking to the store happens in the service layer.

pub mod notification;
pub mod signature;
pub mod status;

pub use notification::PaymentNotification;
pub use status::{map_gateway_status, PaymentStatus};
