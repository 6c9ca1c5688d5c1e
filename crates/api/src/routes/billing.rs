//! Billing routes: checkout, verification, and the gateway webhook

use axum::{
    extract::State,
    http::HeaderMap,
    Extension, Json,
};
use serde::Deserialize;
use serde_json::json;

use inneros_billing::WebhookNotification;

use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::state::AppState;

/// Header carrying the webhook shared secret
const WEBHOOK_SECRET_HEADER: &str = "x-webhook-secret";

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub plan_id: String,
}

/// POST /api/v1/billing/checkout
///
/// Creates a pending order for the authenticated user. The amount comes from
/// the server-side plan catalog; the client never supplies a price.
pub async fn checkout(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<CheckoutRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let order = state.checkout.create_order(user.user_id, &req.plan_id).await?;

    Ok(Json(json!({
        "ok": true,
        "order_id": order.order_id,
        "amount": order.amount,
        "currency": order.currency,
        "order_name": order.order_name,
    })))
}

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub gateway_payment_id: String,
    pub order_id: String,
}

/// POST /api/v1/billing/verify
///
/// Client-driven completion path: re-checks the payment against the gateway
/// and, on success, marks the order paid and activates the plan.
pub async fn verify(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<VerifyRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let verified = state
        .verifier
        .verify_payment(&req.gateway_payment_id, &req.order_id)
        .await?;

    tracing::info!(
        user_id = %user.user_id,
        order_id = %verified.order_id,
        plan = %verified.plan_id,
        "Payment verified"
    );

    Ok(Json(json!({
        "ok": true,
        "via": "verify",
        "gateway_payment_id": verified.gateway_payment_id,
        "order_id": verified.order_id,
        "plan_id": verified.plan_id,
        "fulfillment_url": verified.fulfillment_url,
    })))
}

/// POST /api/v1/billing/webhook
///
/// Gateway-driven completion path. Public route: authenticated by the shared
/// secret header, never by a user session.
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(notification): Json<WebhookNotification>,
) -> ApiResult<Json<serde_json::Value>> {
    let presented = headers
        .get(WEBHOOK_SECRET_HEADER)
        .and_then(|h| h.to_str().ok());
    state.webhook.check_secret(presented)?;

    let outcome = state.webhook.handle_notification(&notification).await?;

    Ok(Json(json!({
        "ok": true,
        "merchant_uid": outcome.merchant_uid,
        "mapped_status": outcome.mapped_status.as_str(),
        "membership_upserted": outcome.membership_upserted,
    })))
}
