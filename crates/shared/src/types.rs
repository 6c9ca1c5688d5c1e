//! Core domain types for the InnerOS membership platform

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI64, Ordering};
use time::OffsetDateTime;
use uuid::Uuid;

/// Prefix for merchant order identifiers passed to the payment gateway
pub const ORDER_ID_PREFIX: &str = "inneros";

// =============================================================================
// Enums
// =============================================================================

/// Membership plan tier
///
/// Closed set: a plan identifier outside this enumeration is rejected at parse
/// time, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Plan {
    StartOs,
    GrowthOs,
    MasterOs,
}

impl Plan {
    /// All plans, in ascending rank order
    pub const ALL: [Plan; 3] = [Plan::StartOs, Plan::GrowthOs, Plan::MasterOs];

    /// Display title shown on checkout and dashboards
    pub fn title(&self) -> &'static str {
        match self {
            Self::StartOs => "Start OS",
            Self::GrowthOs => "Growth OS",
            Self::MasterOs => "Master OS",
        }
    }

    /// Canonical price in KRW
    ///
    /// Single source of truth: the same amount is returned to the checkout
    /// caller and written to the order ledger.
    pub fn price(&self) -> i64 {
        match self {
            Self::StartOs => 49_000,
            Self::GrowthOs => 99_000,
            Self::MasterOs => 199_000,
        }
    }

    /// Settlement currency for this plan
    pub fn currency(&self) -> &'static str {
        "KRW"
    }

    /// Where the buyer is redirected after fulfillment
    pub fn fulfillment_url(&self) -> &'static str {
        match self {
            Self::StartOs => "/os/start",
            Self::GrowthOs => "/os/growth",
            Self::MasterOs => "/os/master",
        }
    }

    /// Relative rank for "at least tier X" comparisons
    pub fn rank(&self) -> u8 {
        match self {
            Self::StartOs => 1,
            Self::GrowthOs => 2,
            Self::MasterOs => 3,
        }
    }

    /// Human-readable order name passed to the gateway's payment window
    pub fn order_name(&self) -> String {
        format!("InnerOS {}", self.title())
    }
}

impl std::fmt::Display for Plan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StartOs => write!(f, "START_OS"),
            Self::GrowthOs => write!(f, "GROWTH_OS"),
            Self::MasterOs => write!(f, "MASTER_OS"),
        }
    }
}

impl std::str::FromStr for Plan {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "START_OS" => Ok(Self::StartOs),
            "GROWTH_OS" => Ok(Self::GrowthOs),
            "MASTER_OS" => Ok(Self::MasterOs),
            _ => Err(format!("Invalid plan: {}", s)),
        }
    }
}

/// Payment order lifecycle status
///
/// Transitions: pending -> paid, pending -> failed. Paid never regresses;
/// a failed order is superseded by a fresh order, never mutated back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Paid,
    Failed,
    Unknown,
}

impl Default for OrderStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Paid => write!(f, "paid"),
            Self::Failed => write!(f, "failed"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "failed" => Ok(Self::Failed),
            "unknown" => Ok(Self::Unknown),
            _ => Err(format!("Invalid order status: {}", s)),
        }
    }
}

/// Membership grant status
///
/// `past_due` exists for future dunning support; no transition in this
/// subsystem produces it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum GrantStatus {
    Active,
    Canceled,
    PastDue,
}

impl std::fmt::Display for GrantStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Canceled => write!(f, "canceled"),
            Self::PastDue => write!(f, "past_due"),
        }
    }
}

impl std::str::FromStr for GrantStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "canceled" | "cancelled" => Ok(Self::Canceled),
            "past_due" => Ok(Self::PastDue),
            _ => Err(format!("Invalid grant status: {}", s)),
        }
    }
}

// =============================================================================
// Ledger rows
// =============================================================================

/// One checkout attempt, from initiation to settlement
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Order {
    pub order_id: String,
    pub user_id: Uuid,
    pub plan_id: Plan,
    pub amount: i64,
    pub currency: String,
    pub status: OrderStatus,
    /// Gateway-assigned payment identifier, once a completion path has seen it
    pub gateway_payment_id: Option<String>,
    /// Last raw status string received from the gateway, unmapped
    pub gateway_status: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Record that a user holds access to a plan tier
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PlanGrant {
    pub user_id: Uuid,
    pub plan_id: Plan,
    pub status: GrantStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub activated_at: OffsetDateTime,
    /// None means non-expiring
    #[serde(with = "time::serde::rfc3339::option")]
    pub expires_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

// =============================================================================
// Order identifier generation
// =============================================================================

static LAST_ORDER_TS: AtomicI64 = AtomicI64::new(0);

/// Monotonic microsecond timestamp: two checkouts landing in the same
/// microsecond still get distinct values within this process. The primary key
/// on `orders.order_id` backs this up across processes.
fn next_order_timestamp() -> i64 {
    let now = (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000) as i64;
    let mut prev = LAST_ORDER_TS.load(Ordering::Relaxed);
    loop {
        let next = now.max(prev + 1);
        match LAST_ORDER_TS.compare_exchange_weak(prev, next, Ordering::Relaxed, Ordering::Relaxed)
        {
            Ok(_) => return next,
            Err(observed) => prev = observed,
        }
    }
}

/// Generate a fresh merchant order identifier: `inneros_{PLAN}_{timestamp}`
pub fn new_order_id(plan: Plan) -> String {
    format!("{}_{}_{}", ORDER_ID_PREFIX, plan, next_order_timestamp())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::str::FromStr;

    #[test]
    fn test_plan_roundtrip() {
        for plan in Plan::ALL {
            assert_eq!(Plan::from_str(&plan.to_string()).unwrap(), plan);
        }
        assert!(Plan::from_str("PLATINUM_OS").is_err());
        // Closed set is case-sensitive on purpose: identifiers come from our
        // own frontend, not free text
        assert!(Plan::from_str("start_os").is_err());
    }

    #[test]
    fn test_plan_rank_ordering() {
        assert!(Plan::StartOs.rank() < Plan::GrowthOs.rank());
        assert!(Plan::GrowthOs.rank() < Plan::MasterOs.rank());
    }

    #[test]
    fn test_order_status_roundtrip() {
        for s in ["pending", "paid", "failed", "unknown"] {
            assert_eq!(OrderStatus::from_str(s).unwrap().to_string(), s);
        }
        assert!(OrderStatus::from_str("refunded").is_err());
    }

    #[test]
    fn test_grant_status_accepts_british_spelling() {
        assert_eq!(
            GrantStatus::from_str("cancelled").unwrap(),
            GrantStatus::Canceled
        );
    }

    #[test]
    fn test_order_id_format() {
        let id = new_order_id(Plan::StartOs);
        assert!(id.starts_with("inneros_START_OS_"));
        let ts: i64 = id.rsplit('_').next().unwrap().parse().unwrap();
        assert!(ts > 0);
    }

    #[test]
    fn test_order_id_unique_under_concurrency() {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                std::thread::spawn(|| {
                    (0..500)
                        .map(|_| new_order_id(Plan::GrowthOs))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id), "duplicate order_id generated");
            }
        }
    }
}
