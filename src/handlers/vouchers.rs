use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{errors::ServiceError, ApiResponse, AppState};

#[derive(Debug, Serialize, ToSchema)]
pub struct VoucherResponse {
    pub id: Uuid,
    pub code: String,
    pub service_id: Uuid,
    pub recipient_name: String,
    pub sender_name: String,
    pub message: Option<String>,
    pub amount: i64,
    pub valid_until: DateTime<Utc>,
    pub redeemed: bool,
    pub redeemed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

// GET /api/v1/vouchers/{code}
//
// Front-desk lookup for a voucher presented at the counter.
#[utoipa::path(
    get,
    path = "/api/v1/vouchers/{code}",
    params(("code" = String, Path, description = "Voucher code, e.g. SPA-2026-K7M3N9PQ")),
    responses(
        (status = 200, description = "Voucher found", body = ApiResponse<VoucherResponse>),
        (status = 404, description = "Voucher not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Vouchers"
)]
pub async fn get_voucher(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let voucher = state
        .services
        .vouchers
        .find_by_code(&code)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Voucher {} not found", code)))?;

    let response = VoucherResponse {
        id: voucher.id,
        code: voucher.code,
        service_id: voucher.service_id,
        recipient_name: voucher.recipient_name,
        sender_name: voucher.sender_name,
        message: voucher.message,
        amount: voucher.amount,
        valid_until: voucher.valid_until,
        redeemed: voucher.redeemed,
        redeemed_at: voucher.redeemed_at,
        created_at: voucher.created_at,
    };
    Ok(Json(ApiResponse::success(response)))
}
