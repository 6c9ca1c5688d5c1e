//! InnerOS Billing
//!
//! Payment gateway integration, the order ledger, and membership entitlement
//! management. Two independent completion paths (client-driven verification
//! and gateway webhooks) converge on the same idempotent ledger writes.

pub mod checkout;
pub mod client;
pub mod entitlement;
pub mod error;
pub mod orders;
pub mod verify;
pub mod webhook;

pub use checkout::{CheckoutOrder, CheckoutService};
pub use client::{GatewayClient, GatewayConfig, GatewayPayment};
pub use entitlement::EntitlementService;
pub use error::{BillingError, BillingResult};
pub use orders::{FinalizeOutcome, OrderLedger};
pub use verify::{PaymentVerifier, VerifiedPayment};
pub use webhook::{MappedStatus, WebhookHandler, WebhookNotification, WebhookOutcome};
