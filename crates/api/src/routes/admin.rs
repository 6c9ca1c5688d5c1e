//! Admin membership overrides
//!
//! Every mutation is gated on the configured administrator allow-list and
//! audit-logged with both actor and target.

use axum::{extract::State, Extension, Json};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use inneros_shared::Plan;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

fn require_admin(state: &AppState, user: &AuthUser) -> ApiResult<String> {
    let email = user.email.as_deref().ok_or(ApiError::Forbidden)?;
    if !state.config.is_admin(email) {
        tracing::warn!(
            actor_id = %user.user_id,
            actor_email = %email,
            "Admin endpoint denied: not on allow-list"
        );
        return Err(ApiError::Forbidden);
    }
    Ok(email.to_string())
}

/// Resolve a target email to a user id via the profiles mirror
async fn resolve_user(state: &AppState, email: &str) -> ApiResult<Uuid> {
    let row: Option<(Uuid,)> =
        sqlx::query_as("SELECT user_id FROM profiles WHERE LOWER(email) = LOWER($1)")
            .bind(email)
            .fetch_optional(&state.pool)
            .await?;

    row.map(|(id,)| id).ok_or(ApiError::NotFound)
}

#[derive(Debug, Deserialize)]
pub struct GrantRequest {
    pub target_email: String,
    pub plan: String,
    /// "active" (default) or "canceled"
    #[serde(default)]
    pub status: Option<String>,
}

/// POST /api/v1/admin/memberships
pub async fn grant_membership(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<GrantRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let actor_email = require_admin(&state, &user)?;

    let plan: Plan = req
        .plan
        .parse()
        .map_err(|_| ApiError::InvalidPlan(req.plan.clone()))?;
    let target_id = resolve_user(&state, &req.target_email).await?;

    let status = req.status.as_deref().unwrap_or("active");
    match status {
        "active" => {
            state.entitlements.upsert_grant(target_id, plan, None).await?;
        }
        "canceled" | "cancelled" => {
            state.entitlements.revoke_grant(target_id, plan).await?;
        }
        other => {
            return Err(ApiError::MissingParams(format!(
                "unsupported status: {other}"
            )));
        }
    }

    tracing::info!(
        actor = %actor_email,
        target = %req.target_email,
        target_id = %target_id,
        plan = %plan,
        status = %status,
        "Admin membership override"
    );

    Ok(Json(json!({
        "ok": true,
        "target_email": req.target_email,
        "plan": plan.to_string(),
        "status": status,
    })))
}

#[derive(Debug, Deserialize)]
pub struct RevokeRequest {
    pub target_email: String,
    /// When absent, every plan the user holds is revoked
    #[serde(default)]
    pub plan: Option<String>,
}

/// DELETE /api/v1/admin/memberships
pub async fn revoke_membership(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<RevokeRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let actor_email = require_admin(&state, &user)?;
    let target_id = resolve_user(&state, &req.target_email).await?;

    let revoked = match req.plan.as_deref() {
        Some(plan_str) => {
            let plan: Plan = plan_str
                .parse()
                .map_err(|_| ApiError::InvalidPlan(plan_str.to_string()))?;
            u64::from(state.entitlements.revoke_grant(target_id, plan).await?)
        }
        None => state.entitlements.revoke_all(target_id).await?,
    };

    tracing::info!(
        actor = %actor_email,
        target = %req.target_email,
        target_id = %target_id,
        plan = ?req.plan,
        revoked,
        "Admin membership revocation"
    );

    Ok(Json(json!({
        "ok": true,
        "target_email": req.target_email,
        "revoked": revoked,
    })))
}
