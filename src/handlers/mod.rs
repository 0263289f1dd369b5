pub mod health;
pub mod orders;
pub mod payment_webhooks;
pub mod vouchers;

use std::sync::Arc;
use std::time::Duration;

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::events::EventSender;
use crate::notifications::DeliveryChannel;
use crate::services::{delivery::DeliveryService, orders::OrderService, vouchers::VoucherService};

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub orders: Arc<OrderService>,
    pub vouchers: Arc<VoucherService>,
    pub delivery: Arc<DeliveryService>,
}

impl AppServices {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: EventSender,
        cfg: &AppConfig,
        email_channel: Option<Arc<dyn DeliveryChannel>>,
        whatsapp_channel: Option<Arc<dyn DeliveryChannel>>,
    ) -> Self {
        let orders = Arc::new(OrderService::new(db_pool.clone(), event_sender.clone()));
        let vouchers = Arc::new(VoucherService::new(
            db_pool,
            event_sender,
            cfg.voucher_code_prefix.clone(),
            cfg.voucher_validity_days,
        ));
        let delivery = Arc::new(DeliveryService::new(
            email_channel,
            whatsapp_channel,
            Duration::from_secs(cfg.delivery_timeout_secs),
        ));

        Self {
            orders,
            vouchers,
            delivery,
        }
    }
}
