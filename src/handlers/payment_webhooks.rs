use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use serde::Serialize;
use serde_json::Value;
use tracing::{error, info, warn};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    events::Event,
    gateway::{map_gateway_status, signature, PaymentNotification, PaymentStatus},
    services::orders::{GatewayMetadata, TransitionOutcome},
    AppState,
};

/// Response contract the gateway expects: a small status/message object.
/// 200 stops retries; only a genuine processing failure may answer 5xx.
#[derive(Debug, Serialize, ToSchema)]
pub struct WebhookAck {
    #[schema(example = "ok")]
    pub status: &'static str,
    #[schema(example = "Payment status updated")]
    pub message: String,
}

fn absorbed(message: &str) -> Response {
    (
        StatusCode::OK,
        Json(WebhookAck {
            status: "ok",
            message: message.to_string(),
        }),
    )
        .into_response()
}

fn failed(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(WebhookAck {
            status: "error",
            message: message.to_string(),
        }),
    )
        .into_response()
}

// POST /api/v1/payments/webhook
#[utoipa::path(
    post,
    path = "/api/v1/payments/webhook",
    request_body = PaymentNotification,
    responses(
        (status = 200, description = "Notification absorbed or processed", body = WebhookAck),
        (status = 400, description = "Unparseable JSON payload", body = WebhookAck),
        (status = 500, description = "Status write failed; gateway should retry", body = WebhookAck),
        (status = 502, description = "Webhook secret not configured", body = WebhookAck)
    ),
    tag = "Payments"
)]
pub async fn payment_webhook(State(state): State<AppState>, body: Bytes) -> Response {
    let Some(server_key) = state.config.payment_server_key.clone() else {
        error!("payment server key not configured; cannot verify gateway callbacks");
        return failed(StatusCode::BAD_GATEWAY, "Webhook verification unavailable");
    };

    // Unparseable JSON is the gateway's problem to notice; flag it.
    let value: Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "unparseable webhook body");
            return failed(StatusCode::BAD_REQUEST, "Malformed JSON payload");
        }
    };

    // A structurally invalid payload is untrustworthy but answering an error
    // would only make the gateway resend it.
    let notification: PaymentNotification = match serde_json::from_value(value) {
        Ok(n) => n,
        Err(e) => {
            warn!(error = %e, "webhook payload failed shape validation; absorbed");
            return absorbed("Notification received");
        }
    };
    if let Err(e) = notification.validate() {
        warn!(error = %e, "webhook payload failed field validation; absorbed");
        return absorbed("Notification received");
    }

    if !signature::verify(&notification, &server_key) {
        // Security event: possible forged callback. Externally identical to
        // the unknown-order case so callers get no oracle.
        warn!(
            order_reference = %notification.order_id,
            transaction_id = %notification.transaction_id,
            "webhook signature verification failed"
        );
        return absorbed("Notification received");
    }

    let order = match state
        .services
        .orders
        .find_by_reference(&notification.order_id)
        .await
    {
        Ok(Some(order)) => order,
        Ok(None) => {
            warn!(
                order_reference = %notification.order_id,
                "notification for unknown order reference; absorbed"
            );
            return absorbed("Notification received");
        }
        Err(e) => {
            error!(error = %e, "order lookup failed");
            return failed(StatusCode::INTERNAL_SERVER_ERROR, "Order lookup failed");
        }
    };

    match notification.gross_amount_units() {
        Some(declared) if declared != order.total_amount => {
            warn!(
                declared,
                expected = order.total_amount,
                order_reference = %order.order_reference,
                "declared gross amount does not match order total"
            );
        }
        None => {
            warn!(
                gross_amount = %notification.gross_amount,
                "gross amount not parseable as whole currency units"
            );
        }
        _ => {}
    }

    let target = map_gateway_status(
        &notification.transaction_status,
        notification.fraud_status.as_deref(),
    );
    let metadata = GatewayMetadata {
        transaction_id: notification.transaction_id.clone(),
        payment_type: notification.payment_type.clone(),
        transaction_time: notification.transaction_time.clone(),
    };

    let outcome = match state
        .services
        .orders
        .transition_payment_status(&order, target, &metadata)
        .await
    {
        Ok(outcome) => outcome,
        Err(e) => {
            // The one retriable failure: the status write did not durably
            // succeed, so the gateway redelivering is what we want.
            error!(error = %e, order_id = %order.id, "payment status write failed");
            return failed(StatusCode::INTERNAL_SERVER_ERROR, "Status update failed");
        }
    };

    match outcome {
        TransitionOutcome::AlreadyProcessed => absorbed("Already processed"),
        TransitionOutcome::Unchanged => absorbed("No status change"),
        TransitionOutcome::Applied => {
            if target == PaymentStatus::Completed {
                issue_and_dispatch(&state, &order).await;
            }
            absorbed("Payment status updated")
        }
    }
}

/// Issues the voucher for a freshly completed order and spawns best-effort
/// delivery. Failures are logged and never change the webhook response; the
/// order is correctly marked paid and operators can reissue out of band.
async fn issue_and_dispatch(state: &AppState, order: &crate::entities::order::Model) {
    match state.services.vouchers.issue_for_order(order).await {
        Ok(issued) if !issued.already_issued => {
            match state.services.vouchers.find_by_id(issued.voucher_id).await {
                Ok(Some(voucher)) => {
                    let delivery = state.services.delivery.clone();
                    let order = order.clone();
                    tokio::spawn(async move {
                        delivery.dispatch(&order, &voucher).await;
                    });
                }
                Ok(None) => {
                    error!(voucher_id = %issued.voucher_id, "issued voucher missing; dispatch skipped")
                }
                Err(e) => {
                    error!(error = %e, "failed to load issued voucher for dispatch")
                }
            }
        }
        Ok(issued) => {
            info!(voucher_id = %issued.voucher_id, "voucher already issued; dispatch skipped");
        }
        Err(e) => {
            error!(
                error = %e,
                order_id = %order.id,
                "voucher issuance failed; order remains completed for manual remediation"
            );
            state
                .event_sender
                .send(Event::VoucherIssuanceFailed {
                    order_id: order.id,
                    reason: e.to_string(),
                })
                .await;
        }
    }
}
