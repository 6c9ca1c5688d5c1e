//! Checkout initiation
//!
//! Creates the pending order the browser payment window will reference.
//! Pricing comes from the server-side plan catalog only; nothing here talks
//! to the gateway.

use sqlx::PgPool;
use uuid::Uuid;

use inneros_shared::Plan;

use crate::error::{BillingError, BillingResult};
use crate::orders::OrderLedger;

/// Everything the client needs to open the payment window
#[derive(Debug, Clone, serde::Serialize)]
pub struct CheckoutOrder {
    /// Merchant order identifier to pass to the payment window
    pub order_id: String,
    /// Amount to charge, in the currency's smallest unit
    pub amount: i64,
    pub currency: String,
    /// Human-readable order name shown in the payment window
    pub order_name: String,
}

/// Creates pending orders for checkout
#[derive(Clone)]
pub struct CheckoutService {
    ledger: OrderLedger,
}

impl CheckoutService {
    pub fn new(pool: PgPool) -> Self {
        Self {
            ledger: OrderLedger::new(pool),
        }
    }

    /// Create a pending order for the given plan
    ///
    /// The amount is always the catalog price; a client-supplied amount is
    /// never trusted.
    pub async fn create_order(&self, user_id: Uuid, plan_id: &str) -> BillingResult<CheckoutOrder> {
        let plan: Plan = plan_id
            .parse()
            .map_err(|_| BillingError::InvalidPlan(plan_id.to_string()))?;

        let order = self.ledger.create(user_id, plan).await?;

        tracing::info!(
            user_id = %user_id,
            order_id = %order.order_id,
            plan = %plan,
            amount = order.amount,
            "Checkout order created"
        );

        Ok(CheckoutOrder {
            order_id: order.order_id,
            amount: order.amount,
            currency: order.currency,
            order_name: plan.order_name(),
        })
    }
}
