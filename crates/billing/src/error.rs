//! Billing error types

use thiserror::Error;

/// Billing-specific errors
#[derive(Debug, Error)]
pub enum BillingError {
    #[error("Invalid plan: {0}")]
    InvalidPlan(String),

    #[error("Order not found: {0}")]
    OrderNotFound(String),

    #[error("Gateway order reference '{actual}' does not match order '{expected}'")]
    OrderMismatch { expected: String, actual: String },

    #[error("Payment not completed, gateway status: {status}")]
    PaymentNotCompleted { status: String },

    #[error("Payment not found at gateway: {0}")]
    PaymentNotFound(String),

    #[error("Failed to obtain gateway access token: {0}")]
    TokenFailed(String),

    #[error("Gateway request timed out")]
    GatewayTimeout,

    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Webhook secret is not configured")]
    WebhookNotConfigured,

    #[error("Webhook secret mismatch")]
    WebhookSecretInvalid,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Ledger insert rejected: {0}")]
    InsertFailed(String),

    #[error("Ledger update rejected: {0}")]
    UpdateFailed(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for BillingError {
    fn from(err: sqlx::Error) -> Self {
        BillingError::Database(err.to_string())
    }
}

impl From<reqwest::Error> for BillingError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            BillingError::GatewayTimeout
        } else {
            BillingError::UpstreamUnavailable(err.to_string())
        }
    }
}

pub type BillingResult<T> = Result<T, BillingError>;
