//! Tenant data access for callers without a request context.
//!
//! Background jobs, migrations, and operator tooling address tenants by id
//! rather than by inbound-request signals. The factory resolves the tenant,
//! decrypts the persisted connection string, and hands back either a small
//! dedicated pool or a single connection, always authenticated as the
//! tenant's own principal. Pools are per-tenant; nothing here shares
//! connections across tenants.

use sqlx::postgres::PgPoolOptions;
use sqlx::{Connection, PgConnection};
use std::sync::Arc;
use tracing::{error, instrument};

use crate::domain::{Tenant, TenantId};
use crate::errors::{Result, TenantError};
use crate::secrets::SecretString;
use crate::storage::DbPool;
use crate::tenancy::context::{RequestContext, TenantContextService};

/// Connection budget for a factory-built tenant pool.
const TENANT_POOL_MAX_CONNECTIONS: u32 = 5;

pub struct TenantContextFactory {
    context: Arc<TenantContextService>,
}

impl TenantContextFactory {
    pub fn new(context: Arc<TenantContextService>) -> Self {
        Self { context }
    }

    /// Load the tenant descriptor. Unknown and inactive tenants both fail
    /// with not-found: the resolver never yields inactive tenants.
    pub async fn describe(&self, id: TenantId) -> Result<Tenant> {
        self.context
            .resolver()
            .resolve_by_id(id)
            .await?
            .ok_or_else(|| TenantError::not_found("tenant", id.to_string()))
    }

    /// The tenant's decrypted connection string.
    pub async fn connection_string_for(&self, id: TenantId) -> Result<SecretString> {
        let tenant = self.describe(id).await?;
        self.context.connection_string_for(&tenant).await
    }

    /// Build a dedicated pool for the tenant's database.
    #[instrument(skip(self), fields(tenant_id = %id))]
    pub async fn create(&self, id: TenantId) -> Result<DbPool> {
        let connection_string = self.connection_string_for(id).await?;

        PgPoolOptions::new()
            .max_connections(TENANT_POOL_MAX_CONNECTIONS)
            .connect(connection_string.expose_secret())
            .await
            .map_err(|e| {
                error!(error = %e, tenant_id = %id, "Failed to create tenant pool");
                TenantError::database(e, format!("Failed to create pool for tenant '{}'", id))
            })
    }

    /// Build a dedicated pool for whatever tenant the context resolves to.
    pub async fn create_for_current_tenant(&self, ctx: &RequestContext) -> Result<DbPool> {
        let resolved = self.context.resolve(ctx).await?;
        self.create(resolved.id()).await
    }

    /// Open a single connection to the tenant's database, authenticated
    /// as the tenant's own principal.
    #[instrument(skip(self), fields(tenant_id = %id))]
    pub async fn connect(&self, id: TenantId) -> Result<PgConnection> {
        let connection_string = self.connection_string_for(id).await?;

        PgConnection::connect(connection_string.expose_secret()).await.map_err(|e| {
            error!(error = %e, tenant_id = %id, "Failed to open tenant connection");
            TenantError::database(e, format!("Failed to connect to tenant '{}'", id))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{StoredConnectionString, TenantDomain};
    use crate::secrets::{SecretEncryption, SecretEncryptionConfig, SecretStore};
    use crate::tenancy::resolver::TenantResolver;
    use crate::tenancy::testing::InMemoryDirectory;
    use chrono::Utc;
    use std::time::Duration;

    fn factory_with(tenant: Tenant) -> TenantContextFactory {
        let resolver = Arc::new(TenantResolver::new(
            Arc::new(InMemoryDirectory::with_tenant(tenant)),
            Duration::from_secs(60),
        ));
        let store = Arc::new(SecretStore::local_only(
            SecretEncryption::new(&SecretEncryptionConfig::for_testing()).unwrap(),
        ));
        TenantContextFactory::new(Arc::new(TenantContextService::new(resolver, store)))
    }

    fn tenant(active: bool) -> (Tenant, String) {
        let encryption = SecretEncryption::new(&SecretEncryptionConfig::for_testing()).unwrap();
        let plaintext = "postgresql://tenant_user_x:pw@db/db_acme".to_string();
        let tenant = Tenant {
            id: TenantId::new(),
            name: "Acme".to_string(),
            code: "acme".to_string(),
            domains: vec![TenantDomain::verified("acme.suite.example.com")],
            connection_string: StoredConnectionString::Encrypted(
                encryption.encrypt_string(&plaintext).unwrap(),
            ),
            is_active: active,
            deletion_scheduled_at: None,
            created_at: Utc::now(),
        };
        (tenant, plaintext)
    }

    #[tokio::test]
    async fn test_connection_string_for_tenant() {
        let (tenant, plaintext) = tenant(true);
        let id = tenant.id;
        let factory = factory_with(tenant);

        let cs = factory.connection_string_for(id).await.unwrap();
        assert_eq!(cs.expose_secret(), plaintext);
    }

    #[tokio::test]
    async fn test_unknown_tenant_is_not_found() {
        let (tenant, _) = tenant(true);
        let factory = factory_with(tenant);

        let err = factory.describe(TenantId::new()).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_inactive_tenant_is_rejected() {
        let (tenant, _) = tenant(false);
        let id = tenant.id;
        let factory = factory_with(tenant);

        let err = factory.describe(id).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_create_for_current_tenant_requires_a_resolution() {
        let (tenant, _) = tenant(true);
        let factory = factory_with(tenant);

        let err =
            factory.create_for_current_tenant(&RequestContext::default()).await.unwrap_err();
        assert!(matches!(err, TenantError::NoCurrentTenant { .. }));
    }
}
