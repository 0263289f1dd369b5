use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod email;
pub mod whatsapp;

pub use email::EmailChannel;
pub use whatsapp::WhatsAppChannel;

/// Everything an outbound channel needs to present a voucher to its
/// destination. The dispatcher resolves the destination before building this.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoucherDelivery {
    /// Email address or phone number, depending on the channel
    pub destination: String,
    pub recipient_name: String,
    pub sender_name: String,
    pub code: String,
    /// Whole currency units
    pub amount: i64,
    pub service_name: Option<String>,
    pub message: Option<String>,
    pub valid_until: DateTime<Utc>,
}

/// Outbound channel errors. Consumed only for logging; a channel failure
/// never propagates to the webhook response.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Channel rejected delivery with status {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("Delivery timed out")]
    Timeout,
}

/// An outbound voucher delivery channel (email, messaging).
#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    fn name(&self) -> &'static str;

    async fn send_voucher(&self, delivery: &VoucherDelivery) -> Result<(), ChannelError>;
}
