//! API error types and handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use inneros_billing::BillingError;

/// Application error type
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    // Authentication
    #[error("Authentication required")]
    Unauthorized,
    #[error("Insufficient permissions")]
    Forbidden,

    // Validation
    #[error("Unknown plan: {0}")]
    InvalidPlan(String),
    #[error("Missing or invalid parameters: {0}")]
    MissingParams(String),

    // Resources
    #[error("Order not found")]
    OrderNotFound,
    #[error("Payment not found at gateway")]
    PaymentNotFound,
    #[error("Resource not found")]
    NotFound,

    // Payment flow
    #[error("Payment record does not belong to this order")]
    MerchantMismatch,
    #[error("Payment not completed: {0}")]
    PaymentFailed(String),

    // Gateway
    #[error("Failed to authenticate with payment gateway")]
    TokenFailed,
    #[error("Upstream service unavailable")]
    UpstreamUnavailable,
    #[error("Payment gateway timed out")]
    GatewayTimeout,
    #[error("Webhook endpoint is not configured")]
    WebhookNotConfigured,

    // Internal
    #[error("Ledger insert rejected")]
    InsertFailed,
    #[error("Ledger update rejected")]
    UpdateFailed,
    #[error("Database error: {0}")]
    Database(String),
    #[error("Internal server error")]
    Internal,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", self.to_string()),
            ApiError::Forbidden => (StatusCode::FORBIDDEN, "forbidden", self.to_string()),

            ApiError::InvalidPlan(_) => (StatusCode::BAD_REQUEST, "invalid_plan", self.to_string()),
            ApiError::MissingParams(_) => {
                (StatusCode::BAD_REQUEST, "missing_params", self.to_string())
            }

            ApiError::OrderNotFound => (StatusCode::NOT_FOUND, "order_not_found", self.to_string()),
            ApiError::PaymentNotFound => {
                (StatusCode::NOT_FOUND, "payment_not_found", self.to_string())
            }
            ApiError::NotFound => (StatusCode::NOT_FOUND, "not_found", self.to_string()),

            ApiError::MerchantMismatch => {
                (StatusCode::CONFLICT, "merchant_mismatch", self.to_string())
            }
            ApiError::PaymentFailed(_) => {
                (StatusCode::PAYMENT_REQUIRED, "payment_failed", self.to_string())
            }

            ApiError::TokenFailed => (StatusCode::BAD_GATEWAY, "token_failed", self.to_string()),
            ApiError::UpstreamUnavailable => {
                (StatusCode::BAD_GATEWAY, "upstream_unavailable", self.to_string())
            }
            ApiError::GatewayTimeout => {
                (StatusCode::GATEWAY_TIMEOUT, "gateway_timeout", self.to_string())
            }
            ApiError::WebhookNotConfigured => (
                StatusCode::SERVICE_UNAVAILABLE,
                "webhook_not_configured",
                self.to_string(),
            ),

            ApiError::InsertFailed => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "insert_failed",
                self.to_string(),
            ),
            ApiError::UpdateFailed => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "update_failed",
                self.to_string(),
            ),
            ApiError::Database(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "database_error",
                "Database error".to_string(),
            ),
            ApiError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                self.to_string(),
            ),
        };

        let body = Json(json!({
            "ok": false,
            "error": {
                "code": code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

impl From<BillingError> for ApiError {
    fn from(err: BillingError) -> Self {
        match err {
            BillingError::InvalidPlan(plan) => ApiError::InvalidPlan(plan),
            BillingError::OrderNotFound(_) => ApiError::OrderNotFound,
            BillingError::OrderMismatch { .. } => ApiError::MerchantMismatch,
            BillingError::PaymentNotCompleted { status } => ApiError::PaymentFailed(status),
            BillingError::PaymentNotFound(_) => ApiError::PaymentNotFound,
            BillingError::TokenFailed(msg) => {
                tracing::error!("Gateway token failure: {}", msg);
                ApiError::TokenFailed
            }
            BillingError::GatewayTimeout => ApiError::GatewayTimeout,
            BillingError::UpstreamUnavailable(msg) => {
                tracing::error!("Upstream failure: {}", msg);
                ApiError::UpstreamUnavailable
            }
            BillingError::WebhookNotConfigured => ApiError::WebhookNotConfigured,
            BillingError::WebhookSecretInvalid => ApiError::Unauthorized,
            BillingError::InvalidInput(msg) => ApiError::MissingParams(msg),
            BillingError::InsertFailed(msg) => {
                tracing::error!("Ledger insert failed: {}", msg);
                ApiError::InsertFailed
            }
            BillingError::UpdateFailed(msg) => {
                tracing::error!("Ledger update failed: {}", msg);
                ApiError::UpdateFailed
            }
            BillingError::Database(msg) => ApiError::Database(msg),
            BillingError::Config(msg) | BillingError::Internal(msg) => {
                tracing::error!("Internal billing error: {}", msg);
                ApiError::Internal
            }
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("Database error: {:?}", err);
        match err {
            sqlx::Error::RowNotFound => ApiError::NotFound,
            _ => ApiError::Database(err.to_string()),
        }
    }
}

/// Result type alias for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_error_body_shape() {
        let response = ApiError::InvalidPlan("GOLD".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["ok"], false);
        assert_eq!(body["error"]["code"], "invalid_plan");
    }

    #[test]
    fn test_billing_error_mapping() {
        assert!(matches!(
            ApiError::from(BillingError::OrderNotFound("x".to_string())),
            ApiError::OrderNotFound
        ));
        assert!(matches!(
            ApiError::from(BillingError::GatewayTimeout),
            ApiError::GatewayTimeout
        ));
        assert!(matches!(
            ApiError::from(BillingError::WebhookSecretInvalid),
            ApiError::Unauthorized
        ));
        assert!(matches!(
            ApiError::from(BillingError::PaymentNotCompleted {
                status: "failed".to_string()
            }),
            ApiError::PaymentFailed(_)
        ));
    }

    #[tokio::test]
    async fn test_persistence_failures_keep_distinct_codes() {
        for (err, expected_code) in [
            (BillingError::InsertFailed("boom".to_string()), "insert_failed"),
            (BillingError::UpdateFailed("boom".to_string()), "update_failed"),
            (BillingError::Database("boom".to_string()), "database_error"),
        ] {
            let response = ApiError::from(err).into_response();
            assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

            let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
            assert_eq!(body["error"]["code"], expected_code);
        }
    }
}
