use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    response::Response,
    Router,
};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tower::ServiceExt;

use spa_voucher_api::{
    config::AppConfig,
    db,
    events::{self, EventSender},
    gateway::signature,
    handlers::AppServices,
    notifications::{ChannelError, DeliveryChannel, VoucherDelivery},
    AppState,
};

pub const TEST_SERVER_KEY: &str = "test-server-key";

/// Delivery channel that records every send instead of calling out.
#[derive(Clone, Default)]
pub struct RecordingChannel {
    pub sent: Arc<Mutex<Vec<VoucherDelivery>>>,
}

#[async_trait]
impl DeliveryChannel for RecordingChannel {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn send_voucher(&self, delivery: &VoucherDelivery) -> Result<(), ChannelError> {
        self.sent.lock().unwrap().push(delivery.clone());
        Ok(())
    }
}

pub fn test_config(database_url: &str) -> AppConfig {
    AppConfig {
        database_url: database_url.to_string(),
        host: "127.0.0.1".to_string(),
        port: 18_080,
        environment: "test".to_string(),
        log_level: "warn".to_string(),
        log_json: false,
        auto_migrate: true,
        cors_allowed_origins: None,
        cors_allow_any_origin: false,
        db_max_connections: 1,
        db_min_connections: 1,
        db_connect_timeout_secs: 5,
        db_idle_timeout_secs: 60,
        db_acquire_timeout_secs: 5,
        request_timeout_secs: 5,
        payment_server_key: Some(TEST_SERVER_KEY.to_string()),
        voucher_code_prefix: "SPA".to_string(),
        voucher_validity_days: 365,
        delivery_timeout_secs: 2,
        email_api_url: None,
        email_api_key: None,
        email_from: None,
        whatsapp_api_url: None,
        whatsapp_api_token: None,
        rate_limit_requests_per_window: 10_000,
        rate_limit_window_seconds: 60,
        rate_limit_enable_headers: false,
        rate_limit_max_tracked_keys: 100,
    }
}

/// Helper harness: application state backed by an in-memory SQLite database,
/// with a recording channel in place of the real email transport.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub deliveries: Arc<Mutex<Vec<VoucherDelivery>>>,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    /// Construct a new test application with fresh database state.
    pub async fn new() -> Self {
        Self::with_config(test_config("sqlite::memory:")).await
    }

    /// Same, but with the webhook secret unset.
    pub async fn without_server_key() -> Self {
        let mut cfg = test_config("sqlite::memory:");
        cfg.payment_server_key = None;
        Self::with_config(cfg).await
    }

    pub async fn with_config(cfg: AppConfig) -> Self {
        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");
        let db_arc = Arc::new(pool);

        let (event_tx, event_rx) = mpsc::channel(64);
        let event_sender = EventSender::new(event_tx);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let recording = RecordingChannel::default();
        let deliveries = recording.sent.clone();
        let channel: Arc<dyn DeliveryChannel> = Arc::new(recording);

        let services = AppServices::new(
            db_arc.clone(),
            event_sender.clone(),
            &cfg,
            Some(channel.clone()),
            Some(channel),
        );

        let state = AppState {
            db: db_arc,
            config: cfg,
            event_sender,
            services,
        };

        let router = Router::new()
            .nest("/api/v1", spa_voucher_api::api_v1_routes())
            .with_state(state.clone());

        Self {
            router,
            state,
            deliveries,
            _event_task: event_task,
        }
    }

    pub async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                builder
                    .body(Body::from(serde_json::to_vec(&json).unwrap()))
                    .unwrap()
            }
            None => builder.body(Body::empty()).unwrap(),
        };

        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("request should produce a response")
    }

    /// Posts a raw body to the webhook endpoint.
    pub async fn post_webhook_raw(&self, body: Vec<u8>) -> Response {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/v1/payments/webhook")
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap();

        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("request should produce a response")
    }

    /// Total rows in the vouchers table, counted straight off the store.
    pub async fn voucher_count(&self) -> u64 {
        use sea_orm::{EntityTrait, PaginatorTrait};

        spa_voucher_api::entities::voucher::Entity::find()
            .count(&*self.state.db)
            .await
            .expect("voucher count query")
    }

    /// Creates a pending order through checkout and returns its reference.
    pub async fn create_order(&self, total_amount: i64) -> String {
        let payload = json!({
            "customer_name": "Maya Tan",
            "customer_email": "maya@example.com",
            "customer_phone": "+6281234567890",
            "recipient_name": "Rin Tan",
            "recipient_email": "rin@example.com",
            "recipient_phone": "+6289876543210",
            "gift_message": "Happy birthday!",
            "delivery_channel": "email",
            "delivery_target": "recipient",
            "service_id": "7b6ff5a0-4f3e-4c07-9d6b-0a93c79d7a10",
            "service_name": "Hot Stone Massage",
            "total_amount": total_amount
        });

        let response = self
            .request(Method::POST, "/api/v1/orders", Some(payload))
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = response_json(response).await;
        body["data"]["order_reference"]
            .as_str()
            .expect("checkout should return the order reference")
            .to_string()
    }

    /// Builds a correctly signed gateway notification for an order.
    pub fn signed_notification(
        &self,
        order_reference: &str,
        transaction_status: &str,
        gross_amount: &str,
    ) -> Value {
        let status_code = "200";
        let key = signature::expected_signature(
            order_reference,
            status_code,
            gross_amount,
            TEST_SERVER_KEY,
        );
        json!({
            "order_id": order_reference,
            "transaction_status": transaction_status,
            "status_code": status_code,
            "gross_amount": gross_amount,
            "signature_key": key,
            "transaction_id": "tx-0001",
            "payment_type": "qris",
            "transaction_time": "2026-08-24 10:15:00"
        })
    }
}

pub async fn response_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}
