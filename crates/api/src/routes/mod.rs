//! API routes

pub mod admin;
pub mod billing;
pub mod chat;
pub mod health;
pub mod memberships;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{auth::require_auth, state::AppState};

/// Create all API routes
pub fn create_router(state: AppState) -> Router {
    let auth_state = state.auth_state();

    // Health check routes (at root level for infrastructure monitoring)
    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness));

    // Public API routes - the webhook authenticates with its own shared
    // secret, never a user session
    let public_api_routes = Router::new().route("/billing/webhook", post(billing::webhook));

    // Protected API routes (session auth required)
    let protected_api_routes = Router::new()
        .route("/billing/checkout", post(billing::checkout))
        .route("/billing/verify", post(billing::verify))
        .route("/memberships", get(memberships::list_memberships))
        .route(
            "/admin/memberships",
            post(admin::grant_membership).delete(admin::revoke_membership),
        )
        .route("/chat", post(chat::chat))
        .route_layer(middleware::from_fn_with_state(auth_state, require_auth));

    Router::new()
        .merge(health_routes)
        .nest("/api/v1", public_api_routes.merge(protected_api_routes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
