//! Payment order ledger
//!
//! One row per checkout attempt. Finalization is a conditional write that
//! only fires while the order is still pending, so the verifier and the
//! webhook can race on the same row and whichever lands first wins.

use sqlx::PgPool;
use uuid::Uuid;

use inneros_shared::{new_order_id, Order, OrderStatus, Plan};

use crate::error::{BillingError, BillingResult};

/// Result of attempting to finalize an order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinalizeOutcome {
    /// This call performed the pending -> terminal transition
    Applied,
    /// The order was already in a terminal state; nothing was written
    AlreadyFinal(OrderStatus),
}

/// Order ledger access
#[derive(Clone)]
pub struct OrderLedger {
    pool: PgPool,
}

impl OrderLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a fresh pending order with the plan's canonical price
    pub async fn create(&self, user_id: Uuid, plan: Plan) -> BillingResult<Order> {
        let order_id = new_order_id(plan);

        let order: Order = sqlx::query_as(
            r#"
            INSERT INTO orders (order_id, user_id, plan_id, amount, currency, status)
            VALUES ($1, $2, $3, $4, $5, 'pending')
            RETURNING order_id, user_id, plan_id, amount, currency, status,
                      gateway_payment_id, gateway_status, created_at, updated_at
            "#,
        )
        .bind(&order_id)
        .bind(user_id)
        .bind(plan)
        .bind(plan.price())
        .bind(plan.currency())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| BillingError::InsertFailed(e.to_string()))?;

        Ok(order)
    }

    /// Fetch an order by merchant order identifier
    pub async fn find(&self, order_id: &str) -> BillingResult<Option<Order>> {
        let order: Option<Order> = sqlx::query_as(
            r#"
            SELECT order_id, user_id, plan_id, amount, currency, status,
                   gateway_payment_id, gateway_status, created_at, updated_at
            FROM orders
            WHERE order_id = $1
            "#,
        )
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(order)
    }

    /// Fetch an order by the gateway's payment identifier
    pub async fn find_by_gateway_payment_id(
        &self,
        gateway_payment_id: &str,
    ) -> BillingResult<Option<Order>> {
        let order: Option<Order> = sqlx::query_as(
            r#"
            SELECT order_id, user_id, plan_id, amount, currency, status,
                   gateway_payment_id, gateway_status, created_at, updated_at
            FROM orders
            WHERE gateway_payment_id = $1
            "#,
        )
        .bind(gateway_payment_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(order)
    }

    /// Transition a pending order to a terminal status
    ///
    /// The update is guarded by `status = 'pending'`: if another completion
    /// path already finalized the order this writes nothing and the current
    /// terminal state is reported back instead.
    pub async fn finalize(
        &self,
        order_id: &str,
        new_status: OrderStatus,
        gateway_payment_id: Option<&str>,
        raw_gateway_status: &str,
    ) -> BillingResult<FinalizeOutcome> {
        debug_assert!(matches!(
            new_status,
            OrderStatus::Paid | OrderStatus::Failed
        ));

        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = $2,
                gateway_payment_id = COALESCE($3, gateway_payment_id),
                gateway_status = $4,
                updated_at = NOW()
            WHERE order_id = $1 AND status = 'pending'
            "#,
        )
        .bind(order_id)
        .bind(new_status)
        .bind(gateway_payment_id)
        .bind(raw_gateway_status)
        .execute(&self.pool)
        .await
        .map_err(|e| BillingError::UpdateFailed(e.to_string()))?;

        if result.rows_affected() > 0 {
            tracing::info!(
                order_id = %order_id,
                status = %new_status,
                "Order finalized"
            );
            return Ok(FinalizeOutcome::Applied);
        }

        // Lost the race (or a retry): report the state the winner left behind
        let current = self
            .find(order_id)
            .await?
            .ok_or_else(|| BillingError::OrderNotFound(order_id.to_string()))?;

        tracing::info!(
            order_id = %order_id,
            requested = %new_status,
            current = %current.status,
            "Order already finalized, no-op"
        );

        Ok(FinalizeOutcome::AlreadyFinal(current.status))
    }

    /// Record an unrecognized raw gateway status without touching the
    /// order's own state machine
    pub async fn record_gateway_status(
        &self,
        order_id: &str,
        raw_gateway_status: &str,
    ) -> BillingResult<()> {
        sqlx::query(
            r#"
            UPDATE orders
            SET gateway_status = $2, updated_at = NOW()
            WHERE order_id = $1
            "#,
        )
        .bind(order_id)
        .bind(raw_gateway_status)
        .execute(&self.pool)
        .await
        .map_err(|e| BillingError::UpdateFailed(e.to_string()))?;

        Ok(())
    }

    /// Order history for a user, newest first
    pub async fn history(&self, user_id: Uuid) -> BillingResult<Vec<Order>> {
        let orders: Vec<Order> = sqlx::query_as(
            r#"
            SELECT order_id, user_id, plan_id, amount, currency, status,
                   gateway_payment_id, gateway_status, created_at, updated_at
            FROM orders
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(orders)
    }
}
