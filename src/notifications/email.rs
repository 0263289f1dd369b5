use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, instrument};

use super::{ChannelError, DeliveryChannel, VoucherDelivery};

/// Transactional email adapter. Talks to a JSON mail API configured via
/// `email_api_url` / `email_api_key`.
#[derive(Clone)]
pub struct EmailChannel {
    client: Client,
    api_url: String,
    api_key: String,
    from: String,
}

impl EmailChannel {
    pub fn new(
        api_url: String,
        api_key: String,
        from: String,
        timeout: Duration,
    ) -> Result<Self, ChannelError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_url,
            api_key,
            from,
        })
    }

    fn render_body(delivery: &VoucherDelivery) -> String {
        let service = delivery.service_name.as_deref().unwrap_or("a spa service");
        let mut body = format!(
            "Hi {},\n\n{} has sent you a gift voucher for {}.\n\nVoucher code: {}\nValue: {}\nValid until: {}\n",
            delivery.recipient_name,
            delivery.sender_name,
            service,
            delivery.code,
            delivery.amount,
            delivery.valid_until.format("%Y-%m-%d"),
        );
        if let Some(message) = &delivery.message {
            body.push_str("\nMessage: ");
            body.push_str(message);
            body.push('\n');
        }
        body
    }
}

#[async_trait]
impl DeliveryChannel for EmailChannel {
    fn name(&self) -> &'static str {
        "email"
    }

    #[instrument(skip(self, delivery), fields(code = %delivery.code))]
    async fn send_voucher(&self, delivery: &VoucherDelivery) -> Result<(), ChannelError> {
        let payload = json!({
            "from": self.from,
            "to": delivery.destination,
            "subject": format!("Your gift voucher {}", delivery.code),
            "text": Self::render_body(delivery),
        });

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
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

        debug!("voucher email accepted by mail API");
        Ok(())
    }
}
