//! Payment gateway client
//!
//! Thin server-to-server wrapper around the gateway's REST API: issue an
//! access token, then fetch the canonical payment record by the gateway's
//! payment identifier. The gateway is the source of truth for payment state;
//! this client never writes to it.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{BillingError, BillingResult};

/// Configuration for the payment gateway
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Base URL of the gateway REST API
    pub base_url: String,
    /// Merchant API key
    pub api_key: String,
    /// Merchant API secret
    pub api_secret: String,
    /// Timeout applied to every gateway call
    pub timeout: Duration,
}

impl GatewayConfig {
    /// Create config from environment variables
    pub fn from_env() -> BillingResult<Self> {
        Ok(Self {
            base_url: std::env::var("GATEWAY_BASE_URL")
                .unwrap_or_else(|_| "https://api.iamport.kr".to_string()),
            api_key: std::env::var("GATEWAY_API_KEY")
                .map_err(|_| BillingError::Config("GATEWAY_API_KEY not set".to_string()))?,
            api_secret: std::env::var("GATEWAY_API_SECRET")
                .map_err(|_| BillingError::Config("GATEWAY_API_SECRET not set".to_string()))?,
            timeout: Duration::from_millis(
                std::env::var("GATEWAY_TIMEOUT_MS")
                    .unwrap_or_else(|_| "10000".to_string())
                    .parse()
                    .unwrap_or(10_000),
            ),
        })
    }
}

/// Canonical payment record as reported by the gateway
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayPayment {
    /// Gateway-assigned payment identifier
    #[serde(rename = "imp_uid")]
    pub payment_id: String,
    /// Merchant order identifier embedded by the payment window at checkout
    pub merchant_uid: String,
    /// Raw gateway status string ("paid", "failed", "cancelled", ...)
    pub status: String,
    pub amount: i64,
    #[serde(default)]
    pub currency: Option<String>,
}

/// Envelope wrapping every gateway response: `code` 0 means success
#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct GatewayEnvelope<T> {
    code: i32,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    response: Option<T>,
}

#[derive(Debug, Serialize)]
struct TokenRequest<'a> {
    imp_key: &'a str,
    imp_secret: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Gateway REST client
#[derive(Clone)]
pub struct GatewayClient {
    http: reqwest::Client,
    config: GatewayConfig,
}

impl GatewayClient {
    /// Create a new gateway client from config
    pub fn new(config: GatewayConfig) -> BillingResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| BillingError::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { http, config })
    }

    /// Create a new gateway client from environment variables
    pub fn from_env() -> BillingResult<Self> {
        Self::new(GatewayConfig::from_env()?)
    }

    /// Obtain a short-lived access token for server-to-server calls
    pub async fn get_access_token(&self) -> BillingResult<String> {
        let url = format!("{}/users/getToken", self.config.base_url);

        let resp = self
            .http
            .post(&url)
            .json(&TokenRequest {
                imp_key: &self.config.api_key,
                imp_secret: &self.config.api_secret,
            })
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(BillingError::TokenFailed(format!(
                "token endpoint returned HTTP {}",
                status
            )));
        }

        let envelope: GatewayEnvelope<TokenResponse> = resp
            .json()
            .await
            .map_err(|e| BillingError::TokenFailed(format!("malformed token response: {}", e)))?;

        if envelope.code != 0 {
            return Err(BillingError::TokenFailed(
                envelope
                    .message
                    .unwrap_or_else(|| format!("gateway code {}", envelope.code)),
            ));
        }

        envelope
            .response
            .map(|t| t.access_token)
            .ok_or_else(|| BillingError::TokenFailed("empty token response".to_string()))
    }

    /// Fetch the canonical payment record by gateway payment identifier
    pub async fn fetch_payment(
        &self,
        access_token: &str,
        payment_id: &str,
    ) -> BillingResult<GatewayPayment> {
        let url = format!("{}/payments/{}", self.config.base_url, payment_id);

        let resp = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .send()
            .await?;

        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(BillingError::PaymentNotFound(payment_id.to_string()));
        }
        if !status.is_success() {
            return Err(BillingError::UpstreamUnavailable(format!(
                "payment lookup returned HTTP {}",
                status
            )));
        }

        let envelope: GatewayEnvelope<GatewayPayment> = resp.json().await.map_err(|e| {
            BillingError::UpstreamUnavailable(format!("malformed payment response: {}", e))
        })?;

        if envelope.code != 0 {
            tracing::warn!(
                payment_id = %payment_id,
                code = envelope.code,
                message = ?envelope.message,
                "Gateway rejected payment lookup"
            );
            return Err(BillingError::PaymentNotFound(payment_id.to_string()));
        }

        envelope
            .response
            .ok_or_else(|| BillingError::PaymentNotFound(payment_id.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn test_client(base_url: &str) -> GatewayClient {
        GatewayClient::new(GatewayConfig {
            base_url: base_url.to_string(),
            api_key: "test-key".to_string(),
            api_secret: "test-secret".to_string(),
            timeout: Duration::from_secs(2),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_get_access_token() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/users/getToken")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"code":0,"response":{"access_token":"tok_abc123"}}"#)
            .create_async()
            .await;

        let client = test_client(&server.url());
        let token = client.get_access_token().await.unwrap();
        assert_eq!(token, "tok_abc123");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_token_nonzero_code_is_token_failed() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/users/getToken")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"code":-1,"message":"invalid credentials","response":null}"#)
            .create_async()
            .await;

        let client = test_client(&server.url());
        let err = client.get_access_token().await.unwrap_err();
        assert!(matches!(err, BillingError::TokenFailed(_)));
    }

    #[tokio::test]
    async fn test_fetch_payment() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/payments/imp_999")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"code":0,"response":{"imp_uid":"imp_999","merchant_uid":"inneros_START_OS_1700000000000000","status":"paid","amount":49000,"currency":"KRW"}}"#,
            )
            .create_async()
            .await;

        let client = test_client(&server.url());
        let payment = client.fetch_payment("tok", "imp_999").await.unwrap();
        assert_eq!(payment.payment_id, "imp_999");
        assert_eq!(payment.merchant_uid, "inneros_START_OS_1700000000000000");
        assert_eq!(payment.status, "paid");
        assert_eq!(payment.amount, 49_000);
    }

    #[tokio::test]
    async fn test_fetch_payment_http_404_is_not_found() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/payments/imp_missing")
            .with_status(404)
            .create_async()
            .await;

        let client = test_client(&server.url());
        let err = client.fetch_payment("tok", "imp_missing").await.unwrap_err();
        assert!(matches!(err, BillingError::PaymentNotFound(_)));
    }
}
