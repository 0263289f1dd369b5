use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::{
    errors::ServiceError,
    gateway::PaymentStatus,
    services::delivery::{ChannelPreference, DeliveryTarget},
    services::orders::NewOrder,
    ApiResponse, AppState,
};

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[validate(schema(function = "validate_recipient_contact", skip_on_field_errors = false))]
pub struct CreateOrderRequest {
    #[validate(length(min = 1, max = 120))]
    pub customer_name: String,
    #[validate(email)]
    pub customer_email: String,
    #[validate(length(min = 5, max = 32))]
    pub customer_phone: String,

    #[validate(length(min = 1, max = 120))]
    pub recipient_name: String,
    #[validate(email)]
    pub recipient_email: Option<String>,
    #[validate(length(min = 5, max = 32))]
    pub recipient_phone: Option<String>,
    #[validate(length(max = 500))]
    pub gift_message: Option<String>,

    pub delivery_channel: ChannelPreference,
    pub delivery_target: DeliveryTarget,

    pub service_id: Uuid,
    #[validate(length(min = 1, max = 200))]
    pub service_name: Option<String>,

    /// Whole currency units
    #[validate(range(min = 1))]
    pub total_amount: i64,
}

/// The voucher issuer later requires at least one recipient contact channel;
/// reject such orders at checkout instead of at issuance time.
fn validate_recipient_contact(request: &CreateOrderRequest) -> Result<(), ValidationError> {
    if request.recipient_email.is_none() && request.recipient_phone.is_none() {
        return Err(ValidationError::new("recipient_contact_required"));
    }
    Ok(())
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderCreatedResponse {
    pub id: Uuid,
    /// Hand this reference to the payment gateway; its notifications echo it
    pub order_reference: String,
    pub total_amount: i64,
    pub payment_status: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderResponse {
    pub id: Uuid,
    pub order_reference: String,
    pub customer_name: String,
    pub customer_email: String,
    pub recipient_name: String,
    pub delivery_channel: String,
    pub delivery_target: String,
    pub service_name: Option<String>,
    pub total_amount: i64,
    pub payment_status: String,
    pub voucher_code: Option<String>,
    pub transaction_id: Option<String>,
    pub payment_type: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VoucherIssuedResponse {
    pub voucher_id: Uuid,
    pub code: String,
    pub already_issued: bool,
}

// POST /api/v1/orders
#[utoipa::path(
    post,
    path = "/api/v1/orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created pending payment", body = ApiResponse<OrderCreatedResponse>),
        (status = 400, description = "Validation failed", body = crate::errors::ErrorResponse)
    ),
    tag = "Orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    Json(request): Json<CreateOrderRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    request.validate()?;

    let order = state
        .services
        .orders
        .create_order(NewOrder {
            customer_name: request.customer_name,
            customer_email: request.customer_email,
            customer_phone: request.customer_phone,
            recipient_name: request.recipient_name,
            recipient_email: request.recipient_email,
            recipient_phone: request.recipient_phone,
            gift_message: request.gift_message,
            delivery_channel: request.delivery_channel,
            delivery_target: request.delivery_target,
            service_id: request.service_id,
            service_name: request.service_name,
            total_amount: request.total_amount,
        })
        .await?;

    let response = OrderCreatedResponse {
        id: order.id,
        order_reference: order.order_reference,
        total_amount: order.total_amount,
        payment_status: order.payment_status,
    };
    Ok((StatusCode::CREATED, Json(ApiResponse::success(response))))
}

// GET /api/v1/orders/{reference}
#[utoipa::path(
    get,
    path = "/api/v1/orders/{reference}",
    params(("reference" = String, Path, description = "External order reference")),
    responses(
        (status = 200, description = "Order found", body = ApiResponse<OrderResponse>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    Path(reference): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let order = state
        .services
        .orders
        .find_by_reference(&reference)
        .await?
        .ok_or_else(|| {
            ServiceError::NotFound(format!("Order with reference {} not found", reference))
        })?;

    let voucher_code = match order.voucher_id {
        Some(voucher_id) => state
            .services
            .vouchers
            .find_by_id(voucher_id)
            .await?
            .map(|v| v.code),
        None => None,
    };

    let response = OrderResponse {
        id: order.id,
        order_reference: order.order_reference,
        customer_name: order.customer_name,
        customer_email: order.customer_email,
        recipient_name: order.recipient_name,
        delivery_channel: order.delivery_channel,
        delivery_target: order.delivery_target,
        service_name: order.service_name,
        total_amount: order.total_amount,
        payment_status: order.payment_status,
        voucher_code,
        transaction_id: order.transaction_id,
        payment_type: order.payment_type,
        created_at: order.created_at,
    };
    Ok(Json(ApiResponse::success(response)))
}

// POST /api/v1/orders/{reference}/voucher
//
// Out-of-band issuance retry for operators: a completed order can end up
// without a voucher when issuance preconditions failed during webhook
// processing and the data has since been repaired.
#[utoipa::path(
    post,
    path = "/api/v1/orders/{reference}/voucher",
    params(("reference" = String, Path, description = "External order reference")),
    responses(
        (status = 200, description = "Voucher issued or already present", body = ApiResponse<VoucherIssuedResponse>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Order is not completed", body = crate::errors::ErrorResponse)
    ),
    tag = "Vouchers"
)]
pub async fn reissue_voucher(
    State(state): State<AppState>,
    Path(reference): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let order = state
        .services
        .orders
        .find_by_reference(&reference)
        .await?
        .ok_or_else(|| {
            ServiceError::NotFound(format!("Order with reference {} not found", reference))
        })?;

    if order.payment_status != PaymentStatus::Completed.as_ref() {
        return Err(ServiceError::Conflict(format!(
            "Order {} is {}, not completed; refusing to issue a voucher",
            reference, order.payment_status
        )));
    }

    let issued = state.services.vouchers.issue_for_order(&order).await?;
    info!(
        order_reference = %reference,
        voucher_id = %issued.voucher_id,
        already_issued = issued.already_issued,
        "out-of-band voucher issuance"
    );

    if !issued.already_issued {
        if let Some(voucher) = state.services.vouchers.find_by_id(issued.voucher_id).await? {
            let delivery = state.services.delivery.clone();
            let order = order.clone();
            tokio::spawn(async move {
                delivery.dispatch(&order, &voucher).await;
            });
        }
    }

    let response = VoucherIssuedResponse {
        voucher_id: issued.voucher_id,
        code: issued.code,
        already_issued: issued.already_issued,
    };
    Ok(Json(ApiResponse::success(response)))
}
