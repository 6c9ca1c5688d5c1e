//! Application state

use std::sync::Arc;

use sqlx::PgPool;

use inneros_billing::{
    CheckoutService, EntitlementService, GatewayClient, OrderLedger, PaymentVerifier,
    WebhookHandler,
};

use crate::auth::AuthState;
use crate::config::Config;

/// Shared application state passed to all handlers
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    pub checkout: CheckoutService,
    pub verifier: PaymentVerifier,
    pub webhook: WebhookHandler,
    pub entitlements: EntitlementService,
    pub ledger: OrderLedger,
    /// Client for the assistant API proxy
    pub assistant_http: reqwest::Client,
}

impl AppState {
    pub fn new(pool: PgPool, config: Config, gateway: GatewayClient) -> anyhow::Result<Self> {
        let assistant_http = reqwest::Client::builder()
            .timeout(config.assistant_timeout)
            .build()?;

        Ok(Self {
            checkout: CheckoutService::new(pool.clone()),
            verifier: PaymentVerifier::new(pool.clone(), gateway),
            webhook: WebhookHandler::new(pool.clone(), config.webhook_secret.clone()),
            entitlements: EntitlementService::new(pool.clone()),
            ledger: OrderLedger::new(pool.clone()),
            pool,
            config: Arc::new(config),
            assistant_http,
        })
    }

    /// State subset used by the auth middleware
    pub fn auth_state(&self) -> AuthState {
        AuthState::new(&self.config.session_jwt_secret)
    }
}
