//! Voucher issuance tests: preconditions, exactly-once linking, code
//! collision handling, and the operator reissue endpoint.

mod common;

use std::sync::{Arc, Mutex};

use assert_matches::assert_matches;
use axum::http::{Method, StatusCode};
use common::{response_json, TestApp};

use spa_voucher_api::{
    errors::ServiceError,
    gateway::PaymentStatus,
    services::orders::GatewayMetadata,
    services::vouchers::VoucherService,
};

fn gateway_metadata() -> GatewayMetadata {
    GatewayMetadata {
        transaction_id: "tx-0001".to_string(),
        payment_type: "qris".to_string(),
        transaction_time: "2026-08-24 10:15:00".to_string(),
    }
}

/// Marks an order completed directly through the service layer.
async fn complete_order(app: &TestApp, reference: &str) -> spa_voucher_api::entities::order::Model {
    let order = app
        .state
        .services
        .orders
        .find_by_reference(reference)
        .await
        .unwrap()
        .unwrap();
    app.state
        .services
        .orders
        .transition_payment_status(&order, PaymentStatus::Completed, &gateway_metadata())
        .await
        .unwrap();
    app.state
        .services
        .orders
        .find_by_reference(reference)
        .await
        .unwrap()
        .unwrap()
}

#[tokio::test]
async fn issuance_requires_a_linked_service() {
    let app = TestApp::new().await;
    let reference = app.create_order(150_000).await;
    let mut order = complete_order(&app, &reference).await;
    order.service_id = None;

    let err = app
        .state
        .services
        .vouchers
        .issue_for_order(&order)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));
}

#[tokio::test]
async fn issuance_requires_a_recipient_contact() {
    let app = TestApp::new().await;
    let reference = app.create_order(150_000).await;
    let mut order = complete_order(&app, &reference).await;
    order.recipient_email = None;
    order.recipient_phone = None;

    let err = app
        .state
        .services
        .vouchers
        .issue_for_order(&order)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));
}

#[tokio::test]
async fn second_issuance_returns_the_existing_voucher() {
    let app = TestApp::new().await;
    let reference = app.create_order(150_000).await;
    let order = complete_order(&app, &reference).await;

    let first = app
        .state
        .services
        .vouchers
        .issue_for_order(&order)
        .await
        .unwrap();
    assert!(!first.already_issued);

    // Re-read so the model carries the link, as any later caller would see it.
    let order = app
        .state
        .services
        .orders
        .find_by_reference(&reference)
        .await
        .unwrap()
        .unwrap();
    let second = app
        .state
        .services
        .vouchers
        .issue_for_order(&order)
        .await
        .unwrap();
    assert!(second.already_issued);
    assert_eq!(second.voucher_id, first.voucher_id);
    assert_eq!(second.code, first.code);
}

#[tokio::test]
async fn stale_model_issuance_loses_the_race_and_returns_the_winner() {
    let app = TestApp::new().await;
    let reference = app.create_order(150_000).await;
    let order = complete_order(&app, &reference).await;

    let first = app
        .state
        .services
        .vouchers
        .issue_for_order(&order)
        .await
        .unwrap();

    // Same pre-link model again: the CAS on `voucher_id IS NULL` must refuse
    // a second voucher and hand back the first.
    let second = app
        .state
        .services
        .vouchers
        .issue_for_order(&order)
        .await
        .unwrap();
    assert!(second.already_issued);
    assert_eq!(second.voucher_id, first.voucher_id);

    // The loser's voucher insert must have rolled back with its transaction.
    assert_eq!(app.voucher_count().await, 1, "CAS loss must leave no orphan voucher row");
}

#[tokio::test]
async fn dangling_voucher_link_is_reported_as_conflict() {
    use sea_orm::{sea_query::Expr, ColumnTrait, EntityTrait, QueryFilter};
    use spa_voucher_api::entities::order::{self, Entity as OrderEntity};
    use uuid::Uuid;

    let app = TestApp::new().await;
    let reference = app.create_order(150_000).await;
    let completed = complete_order(&app, &reference).await;

    // Corrupt the link to point at a voucher that was never written.
    OrderEntity::update_many()
        .col_expr(order::Column::VoucherId, Expr::value(Uuid::new_v4()))
        .filter(order::Column::Id.eq(completed.id))
        .exec(&*app.state.db)
        .await
        .unwrap();
    let order = app
        .state
        .services
        .orders
        .find_by_reference(&reference)
        .await
        .unwrap()
        .unwrap();

    let err = app
        .state
        .services
        .vouchers
        .issue_for_order(&order)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Conflict(_));
}

#[tokio::test]
async fn exhausted_code_collisions_fail_issuance() {
    let app = TestApp::new().await;

    let colliding = VoucherService::new(
        app.state.db.clone(),
        app.state.event_sender.clone(),
        "SPA".to_string(),
        365,
    )
    .with_code_source(Arc::new(|| "SPA-2026-FIXED234".to_string()));

    let first_ref = app.create_order(150_000).await;
    let first_order = complete_order(&app, &first_ref).await;
    let issued = colliding.issue_for_order(&first_order).await.unwrap();
    assert_eq!(issued.code, "SPA-2026-FIXED234");

    let second_ref = app.create_order(90_000).await;
    let second_order = complete_order(&app, &second_ref).await;
    let err = colliding.issue_for_order(&second_order).await.unwrap_err();
    assert_matches!(err, ServiceError::VoucherIssuance(_));

    // The losing order must remain voucher-less for a later retry.
    let second_order = app
        .state
        .services
        .orders
        .find_by_reference(&second_ref)
        .await
        .unwrap()
        .unwrap();
    assert!(second_order.voucher_id.is_none());
}

#[tokio::test]
async fn code_collision_retries_until_a_fresh_code() {
    let app = TestApp::new().await;

    let codes = Arc::new(Mutex::new(vec![
        "SPA-2026-FRESH345".to_string(),
        "SPA-2026-TAKEN234".to_string(),
    ]));
    let source_codes = codes.clone();
    let retrying = VoucherService::new(
        app.state.db.clone(),
        app.state.event_sender.clone(),
        "SPA".to_string(),
        365,
    )
    .with_code_source(Arc::new(move || {
        let mut remaining = source_codes.lock().unwrap();
        remaining.pop().unwrap_or_else(|| "SPA-2026-TAKEN234".to_string())
    }));

    let fixed = VoucherService::new(
        app.state.db.clone(),
        app.state.event_sender.clone(),
        "SPA".to_string(),
        365,
    )
    .with_code_source(Arc::new(|| "SPA-2026-TAKEN234".to_string()));

    let first_ref = app.create_order(150_000).await;
    let first_order = complete_order(&app, &first_ref).await;
    fixed.issue_for_order(&first_order).await.unwrap();

    // First draw collides with TAKEN234, second draw lands on FRESH345.
    let second_ref = app.create_order(90_000).await;
    let second_order = complete_order(&app, &second_ref).await;
    let issued = retrying.issue_for_order(&second_order).await.unwrap();
    assert_eq!(issued.code, "SPA-2026-FRESH345");
}

#[tokio::test]
async fn reissue_endpoint_refuses_a_pending_order() {
    let app = TestApp::new().await;
    let reference = app.create_order(150_000).await;

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/orders/{}/voucher", reference),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn reissue_endpoint_issues_for_a_completed_order() {
    let app = TestApp::new().await;
    let reference = app.create_order(150_000).await;
    complete_order(&app, &reference).await;

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/orders/{}/voucher", reference),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["already_issued"], false);
    let code = body["data"]["code"].as_str().unwrap().to_string();

    let repeat = app
        .request(
            Method::POST,
            &format!("/api/v1/orders/{}/voucher", reference),
            None,
        )
        .await;
    assert_eq!(repeat.status(), StatusCode::OK);
    let body = response_json(repeat).await;
    assert_eq!(body["data"]["already_issued"], true);
    assert_eq!(body["data"]["code"], code.as_str());
}

#[tokio::test]
async fn reissue_endpoint_404s_for_unknown_reference() {
    let app = TestApp::new().await;

    let response = app
        .request(Method::POST, "/api/v1/orders/ORD-NOPE/voucher", None)
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn issued_voucher_is_visible_by_code() {
    let app = TestApp::new().await;
    let reference = app.create_order(150_000).await;
    let order = complete_order(&app, &reference).await;
    let issued = app
        .state
        .services
        .vouchers
        .issue_for_order(&order)
        .await
        .unwrap();

    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/vouchers/{}", issued.code),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["code"], issued.code.as_str());
    assert_eq!(body["data"]["amount"], 150_000);
    assert_eq!(body["data"]["redeemed"], false);

    // And through the order view.
    let order_view = app
        .request(Method::GET, &format!("/api/v1/orders/{}", reference), None)
        .await;
    let body = response_json(order_view).await;
    assert_eq!(body["data"]["voucher_code"], issued.code.as_str());
}
