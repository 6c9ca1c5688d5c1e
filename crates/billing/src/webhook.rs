//! Gateway webhook handling
//!
//! The second completion path: the gateway notifies us directly, so orders
//! finalize even when the buyer closes the browser before the client-side
//! verification call. Deliveries are authenticated by a shared secret and
//! may arrive more than once; every notification is treated as a possible
//! retry.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use sqlx::PgPool;

use inneros_shared::{Order, OrderStatus};

use crate::entitlement::EntitlementService;
use crate::error::{BillingError, BillingResult};
use crate::orders::{FinalizeOutcome, OrderLedger};

type HmacSha256 = Hmac<Sha256>;

const SECRET_MAC_CONTEXT: &[u8] = b"inneros-webhook-secret-v1";

/// Normalized view of a raw gateway status string
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MappedStatus {
    Paid,
    Failed,
    /// Anything we don't recognize, carried through unchanged
    Other(String),
}

impl MappedStatus {
    pub fn as_str(&self) -> &str {
        match self {
            MappedStatus::Paid => "paid",
            MappedStatus::Failed => "failed",
            MappedStatus::Other(raw) => raw,
        }
    }
}

/// Map the gateway's status vocabulary onto our order state machine
///
/// Matching is case-insensitive. Gateways have shipped both "cancelled" and
/// "canceled", and several synonyms for success, so the table is forgiving
/// on the terminal states and strict about everything else.
pub fn map_status(raw: &str) -> MappedStatus {
    match raw.to_ascii_lowercase().as_str() {
        "paid" | "success" | "succeeded" | "completed" | "captured" | "approved" => {
            MappedStatus::Paid
        }
        "failed" | "cancelled" | "canceled" | "declined" => MappedStatus::Failed,
        _ => MappedStatus::Other(raw.to_string()),
    }
}

/// Webhook notification body posted by the gateway
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookNotification {
    /// Gateway-assigned payment identifier
    #[serde(default, alias = "imp_uid")]
    pub payment_id: Option<String>,
    /// Merchant order identifier
    #[serde(default)]
    pub merchant_uid: Option<String>,
    /// Raw status as reported by the gateway
    pub status: String,
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
}

/// Outcome of processing a webhook notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookOutcome {
    pub merchant_uid: String,
    pub mapped_status: MappedStatus,
    /// True when this delivery (or an earlier one for the same payment)
    /// left the user with an active grant
    pub membership_upserted: bool,
}

/// Processes gateway webhook notifications
#[derive(Clone)]
pub struct WebhookHandler {
    ledger: OrderLedger,
    entitlements: EntitlementService,
    secret: Option<String>,
}

impl WebhookHandler {
    pub fn new(pool: PgPool, secret: Option<String>) -> Self {
        Self {
            ledger: OrderLedger::new(pool.clone()),
            entitlements: EntitlementService::new(pool),
            secret,
        }
    }

    /// Check the shared secret presented by the caller
    ///
    /// Rejects every request when no secret is configured. Both strings are
    /// run through HMAC-SHA256 and the tags compared in constant time, so
    /// neither length nor content leaks through timing.
    pub fn check_secret(&self, presented: Option<&str>) -> BillingResult<()> {
        let Some(expected) = self.secret.as_deref() else {
            return Err(BillingError::WebhookNotConfigured);
        };
        let presented = presented.ok_or(BillingError::WebhookSecretInvalid)?;

        let mut expected_mac = HmacSha256::new_from_slice(SECRET_MAC_CONTEXT)
            .map_err(|e| BillingError::Internal(e.to_string()))?;
        expected_mac.update(expected.as_bytes());
        let expected_tag = expected_mac.finalize().into_bytes();

        let mut presented_mac = HmacSha256::new_from_slice(SECRET_MAC_CONTEXT)
            .map_err(|e| BillingError::Internal(e.to_string()))?;
        presented_mac.update(presented.as_bytes());

        presented_mac
            .verify_slice(&expected_tag)
            .map_err(|_| BillingError::WebhookSecretInvalid)
    }

    /// Process an authenticated notification end to end
    ///
    /// Deliveries may carry the merchant order identifier, the gateway's
    /// payment identifier, or both. A payment-id-only delivery can only be
    /// reconciled after a completion path has stored that id on the order.
    pub async fn handle_notification(
        &self,
        notification: &WebhookNotification,
    ) -> BillingResult<WebhookOutcome> {
        tracing::info!(
            merchant_uid = ?notification.merchant_uid,
            payment_id = ?notification.payment_id,
            status = %notification.status,
            "Webhook notification received"
        );

        let order = match (
            notification.merchant_uid.as_deref(),
            notification.payment_id.as_deref(),
        ) {
            (Some(merchant_uid), _) => self
                .ledger
                .find(merchant_uid)
                .await?
                .ok_or_else(|| BillingError::OrderNotFound(merchant_uid.to_string()))?,
            (None, Some(payment_id)) => self
                .ledger
                .find_by_gateway_payment_id(payment_id)
                .await?
                .ok_or_else(|| BillingError::OrderNotFound(payment_id.to_string()))?,
            (None, None) => {
                return Err(BillingError::InvalidInput(
                    "payment_id or merchant_uid is required".to_string(),
                ));
            }
        };

        if let Some(amount) = notification.amount {
            if amount != order.amount {
                tracing::error!(
                    order_id = %order.order_id,
                    expected = order.amount,
                    actual = amount,
                    "RECONCILIATION NEEDED: webhook amount does not match order"
                );
                return Err(BillingError::Internal(
                    "payment amount mismatch".to_string(),
                ));
            }
        }

        let mapped = map_status(&notification.status);
        match &mapped {
            MappedStatus::Paid => {
                let upserted = self
                    .apply_paid(
                        &order,
                        notification.payment_id.as_deref(),
                        &notification.status,
                    )
                    .await?;
                Ok(WebhookOutcome {
                    merchant_uid: order.order_id,
                    mapped_status: mapped,
                    membership_upserted: upserted,
                })
            }
            MappedStatus::Failed => {
                self.ledger
                    .finalize(
                        &order.order_id,
                        OrderStatus::Failed,
                        notification.payment_id.as_deref(),
                        &notification.status,
                    )
                    .await?;
                Ok(WebhookOutcome {
                    merchant_uid: order.order_id,
                    mapped_status: mapped,
                    membership_upserted: false,
                })
            }
            MappedStatus::Other(raw) => {
                tracing::warn!(
                    order_id = %order.order_id,
                    gateway_status = %raw,
                    "Unrecognized gateway status, recording raw"
                );
                self.ledger
                    .record_gateway_status(&order.order_id, raw)
                    .await?;
                Ok(WebhookOutcome {
                    merchant_uid: order.order_id,
                    mapped_status: mapped,
                    membership_upserted: false,
                })
            }
        }
    }

    async fn apply_paid(
        &self,
        order: &Order,
        payment_id: Option<&str>,
        raw_status: &str,
    ) -> BillingResult<bool> {
        let outcome = self
            .ledger
            .finalize(&order.order_id, OrderStatus::Paid, payment_id, raw_status)
            .await?;

        match outcome {
            FinalizeOutcome::Applied | FinalizeOutcome::AlreadyFinal(OrderStatus::Paid) => {
                // A retry after the verifier already won lands here; the
                // grant upsert is idempotent so re-asserting it is safe.
                self.entitlements
                    .upsert_grant(order.user_id, order.plan_id, None)
                    .await?;
                Ok(true)
            }
            FinalizeOutcome::AlreadyFinal(current) => {
                tracing::error!(
                    order_id = %order.order_id,
                    payment_id = ?payment_id,
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
