//! Membership query routes

use axum::{
    extract::{Query, State},
    Extension, Json,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct MembershipsQuery {
    /// Admins may inspect another user's memberships
    pub user_id: Option<Uuid>,
}

/// GET /api/v1/memberships
///
/// Active plans plus payment history for the authenticated user.
pub async fn list_memberships(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<MembershipsQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let target = match query.user_id {
        Some(other) if other != user.user_id => {
            let is_admin = user
                .email
                .as_deref()
                .is_some_and(|e| state.config.is_admin(e));
            if !is_admin {
                return Err(ApiError::Forbidden);
            }
            other
        }
        _ => user.user_id,
    };

    let active_plans = state.entitlements.active_grants(target).await?;
    let payments = state.ledger.history(target).await?;

    Ok(Json(json!({
        "ok": true,
        "active_plans": active_plans,
        "payments": payments,
    })))
}
