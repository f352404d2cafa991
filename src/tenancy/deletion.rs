//! Tenant decommissioning.
//!
//! Two paths: an immediate, irreversible hard delete and a reversible
//! scheduled deletion. Both gate on ownership: only the actor recorded at
//! registration may delete a tenant.
//!
//! The hard delete runs its teardown steps with independent failure
//! boundaries and reports what happened in a [`DeletionOutcome`] instead of
//! aborting mid-teardown: once the decision to delete is made, a failed
//! step must not leave the remaining resources alive and unreported.

use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::domain::TenantId;
use crate::errors::{Result, TenantError};
use crate::storage::TenantDirectory;
use crate::tenancy::resolver::TenantResolver;
use crate::tenancy::security::TenantSecurityService;

/// Grace period before a scheduled deletion becomes eligible for the hard
/// path.
pub const DEFAULT_DELETION_GRACE_DAYS: i64 = 30;

/// Pause between revocation and the forced database drop.
const DROP_GRACE: std::time::Duration = std::time::Duration::from_millis(500);

/// Step-by-step report of a hard delete.
#[derive(Debug, Clone, Default)]
pub struct DeletionOutcome {
    pub tenant_id: Option<TenantId>,
    /// Names of steps that completed.
    pub completed: Vec<&'static str>,
    /// Step name and error text for steps that failed.
    pub failures: Vec<(&'static str, String)>,
}

impl DeletionOutcome {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    fn record(&mut self, step: &'static str, result: Result<()>) {
        match result {
            Ok(()) => self.completed.push(step),
            Err(e) => {
                warn!(step = %step, error = %e, "Deletion step failed; continuing teardown");
                self.failures.push((step, e.to_string()));
            }
        }
    }
}

/// Orchestrates tenant decommissioning.
pub struct TenantDeletionService {
    directory: Arc<dyn TenantDirectory>,
    security: Arc<TenantSecurityService>,
    resolver: Arc<TenantResolver>,
}

impl TenantDeletionService {
    pub fn new(
        directory: Arc<dyn TenantDirectory>,
        security: Arc<TenantSecurityService>,
        resolver: Arc<TenantResolver>,
    ) -> Self {
        Self { directory, security, resolver }
    }

    /// Irreversibly delete a tenant: principal, database, registry records.
    ///
    /// The ownership check happens before any mutation; an unauthorized
    /// actor leaves the tenant untouched. After that point every step runs
    /// regardless of earlier failures, and the outcome reports both lists.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, actor = %actor, database = %database))]
    pub async fn delete_tenant(
        &self,
        tenant_id: TenantId,
        actor: &str,
        database: &str,
    ) -> Result<DeletionOutcome> {
        self.authorize(tenant_id, actor).await?;

        let mut outcome = DeletionOutcome { tenant_id: Some(tenant_id), ..Default::default() };

        // Revocation is internally best-effort and never fails the teardown.
        self.security.revoke_tenant_database_user(tenant_id, database).await;
        outcome.completed.push("revoke_principal");

        // Sessions terminated during revocation may still be draining.
        tokio::time::sleep(DROP_GRACE).await;
        outcome.record("drop_database", self.security.drop_tenant_database(database).await);
        outcome.record("delete_registry_records", self.directory.delete_cascade(tenant_id).await);

        self.resolver.invalidate(tenant_id);

        info!(
            tenant_id = %tenant_id,
            complete = outcome.is_complete(),
            failed_steps = outcome.failures.len(),
            "Tenant deletion finished"
        );

        Ok(outcome)
    }

    /// Schedule a reversible deletion: the tenant is deactivated immediately
    /// and carries a deadline after which it is eligible for the hard path.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, actor = %actor))]
    pub async fn schedule_deletion(
        &self,
        tenant_id: TenantId,
        actor: &str,
        grace_days: i64,
    ) -> Result<()> {
        self.authorize(tenant_id, actor).await?;

        let deadline = Utc::now() + Duration::days(grace_days);
        self.directory.set_active(tenant_id, false, Some(deadline)).await?;
        // A descriptor cached while the tenant was active must not keep
        // resolving for the remainder of its TTL.
        self.resolver.invalidate(tenant_id);

        info!(tenant_id = %tenant_id, deadline = %deadline, "Tenant deletion scheduled");
        Ok(())
    }

    /// Cancel a scheduled deletion and reactivate the tenant.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, actor = %actor))]
    pub async fn cancel_scheduled_deletion(&self, tenant_id: TenantId, actor: &str) -> Result<()> {
        self.authorize(tenant_id, actor).await?;

        self.directory.set_active(tenant_id, true, None).await?;
        self.resolver.invalidate(tenant_id);

        info!(tenant_id = %tenant_id, "Scheduled tenant deletion cancelled");
        Ok(())
    }

    async fn authorize(&self, tenant_id: TenantId, actor: &str) -> Result<()> {
        let owner = self.directory.owner_of(tenant_id).await?.ok_or_else(|| {
            TenantError::authorization(format!(
                "No registration record for tenant '{}'",
                tenant_id
            ))
        })?;

        if owner != actor {
            return Err(TenantError::authorization(format!(
                "Actor '{}' is not the registered owner of tenant '{}'",
                actor, tenant_id
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{StoredConnectionString, Tenant, TenantDomain};
    use crate::secrets::{SecretEncryption, SecretEncryptionConfig, SecretStore};
    use crate::tenancy::testing::InMemoryDirectory;

    fn sample_tenant() -> Tenant {
        Tenant {
            id: TenantId::new(),
            name: "Acme".to_string(),
            code: "acme".to_string(),
            domains: vec![TenantDomain::verified("acme.suite.example.com")],
            connection_string: StoredConnectionString::SecretRef("tenant-cs-x".to_string()),
            is_active: true,
            deletion_scheduled_at: None,
            created_at: Utc::now(),
        }
    }

    fn service(directory: Arc<InMemoryDirectory>) -> (TenantDeletionService, Arc<TenantResolver>) {
        let store = SecretStore::local_only(
            SecretEncryption::new(&SecretEncryptionConfig::for_testing()).unwrap(),
        );
        let resolver = Arc::new(TenantResolver::new(
            directory.clone() as Arc<dyn TenantDirectory>,
            std::time::Duration::from_secs(60),
        ));
        let security = Arc::new(
            TenantSecurityService::new(
                "postgresql://admin:pw@localhost:5432/registry",
                store,
                directory.clone() as Arc<dyn TenantDirectory>,
                resolver.clone(),
            )
            .unwrap(),
        );
        (TenantDeletionService::new(directory, security, resolver.clone()), resolver)
    }

    #[tokio::test]
    async fn test_non_owner_cannot_delete() {
        let tenant = sample_tenant();
        let id = tenant.id;
        let directory = Arc::new(InMemoryDirectory::with_tenant(tenant));
        directory.set_owner(id, "alice");
        let (deletion, _) = service(directory.clone());

        let err = deletion.delete_tenant(id, "mallory", "db_acme").await.unwrap_err();
        assert!(matches!(err, TenantError::Authorization { .. }));
        // Nothing was mutated.
        assert!(directory.contains(id));
        assert!(directory.get(id).unwrap().is_active);
    }

    #[tokio::test]
    async fn test_missing_registration_record_blocks_delete() {
        let tenant = sample_tenant();
        let id = tenant.id;
        let directory = Arc::new(InMemoryDirectory::with_tenant(tenant));
        let (deletion, _) = service(directory);

        let err = deletion.delete_tenant(id, "alice", "db_acme").await.unwrap_err();
        assert!(matches!(err, TenantError::Authorization { .. }));
    }

    #[tokio::test]
    async fn test_schedule_and_cancel_deletion() {
        let tenant = sample_tenant();
        let id = tenant.id;
        let directory = Arc::new(InMemoryDirectory::with_tenant(tenant));
        directory.set_owner(id, "alice");
        let (deletion, _) = service(directory.clone());

        deletion.schedule_deletion(id, "alice", DEFAULT_DELETION_GRACE_DAYS).await.unwrap();
        let scheduled = directory.get(id).unwrap();
        assert!(!scheduled.is_active);
        let deadline = scheduled.deletion_scheduled_at.unwrap();
        assert!(deadline > Utc::now() + Duration::days(DEFAULT_DELETION_GRACE_DAYS - 1));

        deletion.cancel_scheduled_deletion(id, "alice").await.unwrap();
        let restored = directory.get(id).unwrap();
        assert!(restored.is_active);
        assert!(restored.deletion_scheduled_at.is_none());
    }

    #[tokio::test]
    async fn test_schedule_requires_ownership() {
        let tenant = sample_tenant();
        let id = tenant.id;
        let directory = Arc::new(InMemoryDirectory::with_tenant(tenant));
        directory.set_owner(id, "alice");
        let (deletion, _) = service(directory.clone());

        let err = deletion.schedule_deletion(id, "mallory", 30).await.unwrap_err();
        assert!(matches!(err, TenantError::Authorization { .. }));
        assert!(directory.get(id).unwrap().is_active);
    }

    #[tokio::test]
    async fn test_scheduled_deletion_evicts_cached_descriptor() {
        let tenant = sample_tenant();
        let id = tenant.id;
        let directory = Arc::new(InMemoryDirectory::with_tenant(tenant));
        directory.set_owner(id, "alice");
        let (deletion, resolver) = service(directory);

        // Warm the cache while the tenant is still active.
        assert!(resolver.resolve_by_code("acme").await.unwrap().is_some());
        assert_eq!(resolver.cache_len(), 1);

        deletion.schedule_deletion(id, "alice", DEFAULT_DELETION_GRACE_DAYS).await.unwrap();

        // The deactivated tenant must not keep resolving from the cache.
        assert!(resolver.resolve_by_code("acme").await.unwrap().is_none());
        assert!(resolver.resolve_by_id(id).await.unwrap().is_none());

        deletion.cancel_scheduled_deletion(id, "alice").await.unwrap();
        assert!(resolver.resolve_by_code("acme").await.unwrap().is_some());
    }

    #[test]
    fn test_outcome_reports_partial_failure() {
        let mut outcome = DeletionOutcome::default();
        outcome.record("drop_database", Ok(()));
        outcome.record("delete_registry_records", Err(TenantError::internal("boom")));

        assert!(!outcome.is_complete());
        assert_eq!(outcome.completed, vec!["drop_database"]);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].0, "delete_registry_records");
    }
}
