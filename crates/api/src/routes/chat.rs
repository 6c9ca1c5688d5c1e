//! Assistant chat proxy
//!
//! Forwards member chat messages to the external assistant API with the
//! server-side key. The key never reaches the browser, and only members
//! with an active plan can use the proxy.

use axum::{extract::State, Extension, Json};
use serde::{Deserialize, Serialize};

use inneros_shared::Plan;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct UpstreamRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
}

/// POST /api/v1/chat
pub async fn chat(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<ChatRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    if req.messages.is_empty() {
        return Err(ApiError::MissingParams("messages must not be empty".to_string()));
    }

    // Any active plan unlocks the assistant
    if !state
        .entitlements
        .has_at_least(user.user_id, Plan::StartOs)
        .await?
    {
        return Err(ApiError::Forbidden);
    }

    let url = format!(
        "{}/chat/completions",
        state.config.assistant_api_url.trim_end_matches('/')
    );

    let response = state
        .assistant_http
        .post(&url)
        .bearer_auth(&state.config.assistant_api_key)
        .json(&UpstreamRequest {
            model: &state.config.assistant_model,
            messages: &req.messages,
        })
        .send()
        .await
        .map_err(|e| {
            tracing::error!("Assistant API request failed: {}", e);
            ApiError::UpstreamUnavailable
        })?;

    if !response.status().is_success() {
        tracing::error!(
            status = %response.status(),
            "Assistant API returned an error"
        );
        return Err(ApiError::UpstreamUnavailable);
    }

    // Relay the assistant reply verbatim
    let reply: serde_json::Value = response
        .json()
        .await
        .map_err(|_| ApiError::UpstreamUnavailable)?;

    Ok(Json(reply))
}
