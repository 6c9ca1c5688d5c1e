//! Membership entitlements
//!
//! Plan grants keyed by (user, plan). A user can hold several plans at once;
//! access checks compare plan ranks so a higher plan satisfies a lower
//! requirement.

use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use inneros_shared::{GrantStatus, Plan, PlanGrant};

use crate::error::{BillingError, BillingResult};

/// Manages plan grants for users
#[derive(Clone)]
pub struct EntitlementService {
    pool: PgPool,
}

impl EntitlementService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// All grants for a user, regardless of status or expiry
    pub async fn all_grants(&self, user_id: Uuid) -> BillingResult<Vec<PlanGrant>> {
        let grants: Vec<PlanGrant> = sqlx::query_as(
            r#"
            SELECT user_id, plan_id, status, activated_at, expires_at, updated_at
            FROM membership_grants
            WHERE user_id = $1
            ORDER BY activated_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(grants)
    }

    /// Grants that currently confer access: status active and not expired
    ///
    /// A NULL expiry means the grant does not expire.
    pub async fn active_grants(&self, user_id: Uuid) -> BillingResult<Vec<PlanGrant>> {
        let grants: Vec<PlanGrant> = sqlx::query_as(
            r#"
            SELECT user_id, plan_id, status, activated_at, expires_at, updated_at
            FROM membership_grants
            WHERE user_id = $1
              AND status = 'active'
              AND (expires_at IS NULL OR expires_at > NOW())
            ORDER BY activated_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(grants)
    }

    /// Grant a plan to a user, reactivating any prior grant for the same plan
    ///
    /// Re-granting resets the activation time and clears a previous expiry,
    /// so a repeat purchase of an already-held plan is a harmless refresh.
    pub async fn upsert_grant(
        &self,
        user_id: Uuid,
        plan: Plan,
        expires_at: Option<OffsetDateTime>,
    ) -> BillingResult<PlanGrant> {
        let grant: PlanGrant = sqlx::query_as(
            r#"
            INSERT INTO membership_grants (user_id, plan_id, status, activated_at, expires_at)
            VALUES ($1, $2, 'active', NOW(), $3)
            ON CONFLICT (user_id, plan_id) DO UPDATE
            SET status = 'active',
                activated_at = NOW(),
                expires_at = EXCLUDED.expires_at,
                updated_at = NOW()
            RETURNING user_id, plan_id, status, activated_at, expires_at, updated_at
            "#,
        )
        .bind(user_id)
        .bind(plan)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| BillingError::UpdateFailed(e.to_string()))?;

        tracing::info!(
            user_id = %user_id,
            plan = %plan,
            "Plan granted"
        );

        Ok(grant)
    }

    /// Cancel a single plan grant; returns false if no grant existed
    pub async fn revoke_grant(&self, user_id: Uuid, plan: Plan) -> BillingResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE membership_grants
            SET status = 'canceled', updated_at = NOW()
            WHERE user_id = $1 AND plan_id = $2 AND status <> 'canceled'
            "#,
        )
        .bind(user_id)
        .bind(plan)
        .execute(&self.pool)
        .await
        .map_err(|e| BillingError::UpdateFailed(e.to_string()))?;

        let revoked = result.rows_affected() > 0;
        if revoked {
            tracing::info!(user_id = %user_id, plan = %plan, "Plan grant revoked");
        }
        Ok(revoked)
    }

    /// Cancel every grant a user holds; returns how many were canceled
    pub async fn revoke_all(&self, user_id: Uuid) -> BillingResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE membership_grants
            SET status = 'canceled', updated_at = NOW()
            WHERE user_id = $1 AND status <> 'canceled'
            "#,
        )
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(|e| BillingError::UpdateFailed(e.to_string()))?;

        let count = result.rows_affected();
        tracing::info!(user_id = %user_id, count, "All plan grants revoked");
        Ok(count)
    }

    /// Does the user hold an active grant at or above the required plan rank?
    pub async fn has_at_least(&self, user_id: Uuid, required: Plan) -> BillingResult<bool> {
        let grants = self.active_grants(user_id).await?;
        Ok(grants
            .iter()
            .any(|g| g.status == GrantStatus::Active && g.plan_id.rank() >= required.rank()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    async fn test_pool() -> PgPool {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL required");
        inneros_shared::db::create_pool(&url)
            .await
            .expect("Failed to create pool")
    }

    #[tokio::test]
    #[ignore] // Requires database
    async fn test_upsert_then_revoke() {
        let svc = EntitlementService::new(test_pool().await);
        let user_id = Uuid::new_v4();

        svc.upsert_grant(user_id, Plan::StartOs, None).await.unwrap();
        svc.upsert_grant(user_id, Plan::GrowthOs, None).await.unwrap();

        let active = svc.active_grants(user_id).await.unwrap();
        assert_eq!(active.len(), 2);
        assert!(svc.has_at_least(user_id, Plan::StartOs).await.unwrap());
        assert!(svc.has_at_least(user_id, Plan::GrowthOs).await.unwrap());
        assert!(!svc.has_at_least(user_id, Plan::MasterOs).await.unwrap());

        assert!(svc.revoke_grant(user_id, Plan::GrowthOs).await.unwrap());
        assert!(!svc.has_at_least(user_id, Plan::GrowthOs).await.unwrap());
        assert!(svc.has_at_least(user_id, Plan::StartOs).await.unwrap());
    }

    #[tokio::test]
    #[ignore] // Requires database
    async fn test_regrant_reactivates_canceled_plan() {
        let svc = EntitlementService::new(test_pool().await);
        let user_id = Uuid::new_v4();

        svc.upsert_grant(user_id, Plan::StartOs, None).await.unwrap();
        svc.revoke_grant(user_id, Plan::StartOs).await.unwrap();
        assert!(svc.active_grants(user_id).await.unwrap().is_empty());

        let grant = svc.upsert_grant(user_id, Plan::StartOs, None).await.unwrap();
        assert_eq!(grant.status, GrantStatus::Active);
        assert_eq!(svc.active_grants(user_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    #[ignore] // Requires database
    async fn test_expired_grant_confers_no_access() {
        let svc = EntitlementService::new(test_pool().await);
        let user_id = Uuid::new_v4();

        let past = OffsetDateTime::now_utc() - time::Duration::days(1);
        svc.upsert_grant(user_id, Plan::MasterOs, Some(past))
            .await
            .unwrap();

        assert!(svc.active_grants(user_id).await.unwrap().is_empty());
        assert!(!svc.has_at_least(user_id, Plan::StartOs).await.unwrap());
        // Still visible in the full listing
        assert_eq!(svc.all_grants(user_id).await.unwrap().len(), 1);
    }
}
