use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Spa Voucher API",
        version = "0.3.0",
        description = r#"
# Spa Gift Voucher API

Checkout, payment reconciliation and voucher issuance for spa gift purchases.

## Flow

1. **Checkout** creates a `pending` order and returns its external reference.
2. The payment gateway posts signed notifications to `/payments/webhook`.
3. A verified settlement flips the order to `completed`, issues exactly one
   voucher and dispatches it over the configured channels.

## Webhook contract

The webhook endpoint answers `200` for every authenticated-or-absorbed
notification so the gateway stops retrying; only a failed status write
answers `5xx`.

## Rate Limiting

Requests are rate-limited per client. Check the response headers:
- `x-ratelimit-limit`: Maximum requests per window
- `x-ratelimit-remaining`: Remaining requests in current window
- `x-ratelimit-reset`: Seconds until the window resets
        "#
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "Orders", description = "Checkout and order lookup"),
        (name = "Payments", description = "Payment gateway webhook"),
        (name = "Vouchers", description = "Voucher lookup and issuance"),
        (name = "Health", description = "Health check endpoints")
    ),
    paths(
        crate::handlers::orders::create_order,
        crate::handlers::orders::get_order,
        crate::handlers::orders::reissue_voucher,
        crate::handlers::vouchers::get_voucher,
        crate::handlers::payment_webhooks::payment_webhook,
        crate::handlers::health::api_status,
        crate::handlers::health::health_check,
    ),
    components(
        schemas(
            crate::ApiResponse<serde_json::Value>,

            crate::handlers::orders::CreateOrderRequest,
            crate::handlers::orders::OrderCreatedResponse,
            crate::handlers::orders::OrderResponse,
            crate::handlers::orders::VoucherIssuedResponse,
            crate::handlers::vouchers::VoucherResponse,
            crate::handlers::payment_webhooks::WebhookAck,
            crate::gateway::PaymentNotification,

            crate::services::delivery::ChannelPreference,
            crate::services::delivery::DeliveryTarget,

            crate::errors::ErrorResponse
        )
    )
)]
pub struct ApiDocV1;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}
