//! Client-driven payment verification
//!
//! After the payment window closes, the client posts the gateway payment id
//! back to us. We never trust that callback: the gateway's own record is
//! fetched server-to-server and is the only input to the ledger write.

use sqlx::PgPool;

use inneros_shared::{Order, OrderStatus};

use crate::client::GatewayClient;
use crate::entitlement::EntitlementService;
use crate::error::{BillingError, BillingResult};
use crate::orders::{FinalizeOutcome, OrderLedger};
use crate::webhook::{map_status, MappedStatus};

/// Outcome of a successful verification
#[derive(Debug, Clone, serde::Serialize)]
pub struct VerifiedPayment {
    pub order_id: String,
    pub gateway_payment_id: String,
    pub plan_id: String,
    pub amount: i64,
    /// Where the client should land now that the plan is active
    pub fulfillment_url: String,
}

/// Verifies payments against the gateway and applies the result
#[derive(Clone)]
pub struct PaymentVerifier {
    client: GatewayClient,
    ledger: OrderLedger,
    entitlements: EntitlementService,
}

impl PaymentVerifier {
    pub fn new(pool: PgPool, client: GatewayClient) -> Self {
        Self {
            client,
            ledger: OrderLedger::new(pool.clone()),
            entitlements: EntitlementService::new(pool),
        }
    }

    /// Verify a payment the client claims to have completed
    ///
    /// The gateway record is checked against the caller's order id before
    /// the ledger is read at all, so mismatch and not-paid rejections write
    /// nothing. Safe to call repeatedly for the same order: once the order
    /// is paid, repeat calls succeed without a second grant side effect.
    pub async fn verify_payment(
        &self,
        gateway_payment_id: &str,
        order_id: &str,
    ) -> BillingResult<VerifiedPayment> {
        let token = self.client.get_access_token().await?;
        let payment = self.client.fetch_payment(&token, gateway_payment_id).await?;

        if payment.merchant_uid != order_id {
            return Err(BillingError::OrderMismatch {
                expected: order_id.to_string(),
                actual: payment.merchant_uid,
            });
        }

        if map_status(&payment.status) != MappedStatus::Paid {
            return Err(BillingError::PaymentNotCompleted {
                status: payment.status,
            });
        }

        let order = self
            .ledger
            .find(order_id)
            .await?
            .ok_or_else(|| BillingError::OrderNotFound(order_id.to_string()))?;

        if payment.amount != order.amount {
            tracing::error!(
                order_id = %order.order_id,
                payment_id = %payment.payment_id,
                expected = order.amount,
                actual = payment.amount,
                "RECONCILIATION NEEDED: gateway amount does not match order"
            );
            return Err(BillingError::Internal(
                "payment amount mismatch".to_string(),
            ));
        }

        self.apply_paid(&order, &payment.payment_id, &payment.status)
            .await
    }

    async fn apply_paid(
        &self,
        order: &Order,
        payment_id: &str,
        raw_status: &str,
    ) -> BillingResult<VerifiedPayment> {
        let outcome = self
            .ledger
            .finalize(&order.order_id, OrderStatus::Paid, Some(payment_id), raw_status)
            .await?;

        match outcome {
            FinalizeOutcome::Applied | FinalizeOutcome::AlreadyFinal(OrderStatus::Paid) => {
                // Grant upsert is idempotent, so re-running it on a repeat
                // verification is harmless.
                self.entitlements
                    .upsert_grant(order.user_id, order.plan_id, None)
                    .await?;

                Ok(VerifiedPayment {
                    order_id: order.order_id.clone(),
                    gateway_payment_id: payment_id.to_string(),
                    plan_id: order.plan_id.to_string(),
                    amount: order.amount,
                    fulfillment_url: order.plan_id.fulfillment_url().to_string(),
                })
            }
            FinalizeOutcome::AlreadyFinal(current) => {
                tracing::error!(
                    order_id = %order.order_id,
                    payment_id = %payment_id,
                    ledger_status = %current,
                    "RECONCILIATION NEEDED: gateway reports paid but order is already failed"
                );
                Err(BillingError::Internal(
                    "order already finalized with a conflicting status".to_string(),
                ))
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::client::GatewayConfig;
    use sqlx::PgPool;
    use std::time::Duration;

    // The pool is lazy and never connects: rejection paths must return
    // before the ledger is touched.
    fn verifier_for(server_url: &str) -> PaymentVerifier {
        let client = GatewayClient::new(GatewayConfig {
            base_url: server_url.to_string(),
            api_key: "test-key".to_string(),
            api_secret: "test-secret".to_string(),
            timeout: Duration::from_secs(2),
        })
        .unwrap();
        let pool = PgPool::connect_lazy("postgres://localhost/unused").unwrap();
        PaymentVerifier::new(pool, client)
    }

    async fn mock_token(server: &mut mockito::ServerGuard) {
        server
            .mock("POST", "/users/getToken")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"code":0,"response":{"access_token":"tok_test"}}"#)
            .create_async()
            .await;
    }

    #[tokio::test]
    async fn test_merchant_mismatch_rejected_without_ledger_writes() {
        let mut server = mockito::Server::new_async().await;
        mock_token(&mut server).await;
        server
            .mock("GET", "/payments/imp_55")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"code":0,"response":{"imp_uid":"imp_55","merchant_uid":"inneros_GROWTH_OS_42","status":"paid","amount":99000,"currency":"KRW"}}"#,
            )
            .create_async()
            .await;

        let verifier = verifier_for(&server.url());
        let err = verifier
            .verify_payment("imp_55", "inneros_START_OS_1")
            .await
            .unwrap_err();

        match err {
            BillingError::OrderMismatch { expected, actual } => {
                assert_eq!(expected, "inneros_START_OS_1");
                assert_eq!(actual, "inneros_GROWTH_OS_42");
            }
            other => panic!("expected OrderMismatch, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unpaid_status_rejected_with_raw_status() {
        let mut server = mockito::Server::new_async().await;
        mock_token(&mut server).await;
        server
            .mock("GET", "/payments/imp_56")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"code":0,"response":{"imp_uid":"imp_56","merchant_uid":"inneros_START_OS_1","status":"cancelled","amount":49000,"currency":"KRW"}}"#,
            )
            .create_async()
            .await;

        let verifier = verifier_for(&server.url());
        let err = verifier
            .verify_payment("imp_56", "inneros_START_OS_1")
            .await
            .unwrap_err();

        match err {
            BillingError::PaymentNotCompleted { status } => assert_eq!(status, "cancelled"),
            other => panic!("expected PaymentNotCompleted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_token_failure_short_circuits_verification() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/users/getToken")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"code":-1,"message":"invalid credentials","response":null}"#)
            .create_async()
            .await;

        let verifier = verifier_for(&server.url());
        let err = verifier
            .verify_payment("imp_57", "inneros_START_OS_1")
            .await
            .unwrap_err();
        assert!(matches!(err, BillingError::TokenFailed(_)));
    }
}
