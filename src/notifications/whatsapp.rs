use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, instrument};

use super::{ChannelError, DeliveryChannel, VoucherDelivery};

/// WhatsApp gateway adapter. Posts a templated text message to the
/// configured gateway endpoint.
#[derive(Clone)]
pub struct WhatsAppChannel {
    client: Client,
    api_url: String,
    token: String,
}

impl WhatsAppChannel {
    pub fn new(api_url: String, token: String, timeout: Duration) -> Result<Self, ChannelError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_url,
            token,
        })
    }

    fn render_message(delivery: &VoucherDelivery) -> String {
        let service = delivery.service_name.as_deref().unwrap_or("a spa service");
        format!(
            "Hi {}! {} sent you a gift voucher for {}. Code: {} (valid until {}).",
            delivery.recipient_name,
            delivery.sender_name,
            service,
            delivery.code,
            delivery.valid_until.format("%Y-%m-%d"),
        )
    }
}

#[async_trait]
impl DeliveryChannel for WhatsAppChannel {
    fn name(&self) -> &'static str {
        "whatsapp"
    }

    #[instrument(skip(self, delivery), fields(code = %delivery.code))]
    async fn send_voucher(&self, delivery: &VoucherDelivery) -> Result<(), ChannelError> {
        let payload = json!({
            "to": delivery.destination,
            "message": Self::render_message(delivery),
        });

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.token)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChannelError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        debug!("voucher message accepted by WhatsApp gateway");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn message_is_single_line_with_code() {
        let delivery = VoucherDelivery {
            destination: "+628123456789".into(),
            recipient_name: "Jo".into(),
            sender_name: "Alex".into(),
            code: "SPA-2026-ABCD2345".into(),
            amount: 150_000,
            service_name: None,
            message: None,
            valid_until: Utc::now(),
        };
        let message = WhatsAppChannel::render_message(&delivery);
        assert!(message.contains("SPA-2026-ABCD2345"));
        assert!(!message.contains('\n'));
    }
}
