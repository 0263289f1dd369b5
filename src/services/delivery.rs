use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use tokio::time::timeout;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;

use crate::{
    entities::{order::Model as OrderModel, voucher::Model as VoucherModel},
    notifications::{ChannelError, DeliveryChannel, VoucherDelivery},
};

/// Which channel(s) the voucher should go out on.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr, EnumString, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ChannelPreference {
    Email,
    Whatsapp,
    Both,
}

/// Who receives the voucher: the purchaser or the gift recipient.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr, EnumString, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DeliveryTarget {
    Purchaser,
    Recipient,
}

/// Best-effort voucher delivery dispatcher.
///
/// Channel failures and timeouts are logged and surfaced to operators via
/// the logs only; nothing here may influence the webhook response, since by
/// the time dispatch runs the payment is captured and the voucher durable.
#[derive(Clone)]
pub struct DeliveryService {
    email: Option<Arc<dyn DeliveryChannel>>,
    whatsapp: Option<Arc<dyn DeliveryChannel>>,
    channel_timeout: Duration,
}

impl DeliveryService {
    pub fn new(
        email: Option<Arc<dyn DeliveryChannel>>,
        whatsapp: Option<Arc<dyn DeliveryChannel>>,
        channel_timeout: Duration,
    ) -> Self {
        Self {
            email,
            whatsapp,
            channel_timeout,
        }
    }

    /// Resolves the destination from the order's delivery preference and
    /// target, then fans out to the configured channels.
    #[instrument(skip(self, order, voucher), fields(order_id = %order.id, code = %voucher.code))]
    pub async fn dispatch(&self, order: &OrderModel, voucher: &VoucherModel) {
        let preference = match ChannelPreference::from_str(&order.delivery_channel) {
            Ok(p) => p,
            Err(_) => {
                error!(
                    channel = %order.delivery_channel,
                    "unknown delivery channel preference; skipping dispatch"
                );
                return;
            }
        };
        let target = match DeliveryTarget::from_str(&order.delivery_target) {
            Ok(t) => t,
            Err(_) => {
                error!(
                    target = %order.delivery_target,
                    "unknown delivery target; skipping dispatch"
                );
                return;
            }
        };

        let (email_destination, phone_destination, greeted_name) = match target {
            DeliveryTarget::Purchaser => (
                Some(order.customer_email.clone()),
                Some(order.customer_phone.clone()),
                order.customer_name.clone(),
            ),
            DeliveryTarget::Recipient => (
                order.recipient_email.clone(),
                order.recipient_phone.clone(),
                order.recipient_name.clone(),
            ),
        };

        let delivery = VoucherDelivery {
            destination: String::new(),
            recipient_name: greeted_name,
            sender_name: order.customer_name.clone(),
            code: voucher.code.clone(),
            amount: voucher.amount,
            service_name: order.service_name.clone(),
            message: voucher.message.clone(),
            valid_until: voucher.valid_until,
        };

        if matches!(preference, ChannelPreference::Email | ChannelPreference::Both) {
            self.send_on(&self.email, "email", email_destination, &delivery)
                .await;
        }
        if matches!(
            preference,
            ChannelPreference::Whatsapp | ChannelPreference::Both
        ) {
            self.send_on(&self.whatsapp, "whatsapp", phone_destination, &delivery)
                .await;
        }
    }

    async fn send_on(
        &self,
        channel: &Option<Arc<dyn DeliveryChannel>>,
        name: &str,
        destination: Option<String>,
        delivery: &VoucherDelivery,
    ) {
        let Some(channel) = channel else {
            warn!(channel = name, "delivery channel not configured; skipping");
            return;
        };
        let Some(destination) = destination.filter(|d| !d.trim().is_empty()) else {
            warn!(channel = name, "no destination for delivery target; skipping");
            return;
        };

        let request = VoucherDelivery {
            destination,
            ..delivery.clone()
        };

        match timeout(self.channel_timeout, channel.send_voucher(&request)).await {
            Ok(Ok(())) => {
                info!(channel = name, "voucher delivery dispatched");
            }
            Ok(Err(e)) => {
                error!(channel = name, error = %e, "voucher delivery failed");
            }
            Err(_) => {
                let e = ChannelError::Timeout;
                error!(channel = name, error = %e, "voucher delivery timed out");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preference_parses_storage_form() {
        assert_eq!(
            ChannelPreference::from_str("email").unwrap(),
            ChannelPreference::Email
        );
        assert_eq!(
            ChannelPreference::from_str("both").unwrap(),
            ChannelPreference::Both
        );
        assert!(ChannelPreference::from_str("fax").is_err());
    }

    #[test]
    fn target_parses_storage_form() {
        assert_eq!(
            DeliveryTarget::from_str("purchaser").unwrap(),
            DeliveryTarget::Purchaser
        );
        assert_eq!(
            DeliveryTarget::from_str("recipient").unwrap(),
            DeliveryTarget::Recipient
        );
    }
}
