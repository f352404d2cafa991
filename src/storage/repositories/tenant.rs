//! Tenant registry repository.
//!
//! The [`TenantDirectory`] trait is the seam between the isolation core and
//! the registry: the resolver, context service, deletion orchestrator, and
//! rotation sweeper all depend on the trait, so tests can substitute an
//! in-memory directory. [`SqlxTenantRepository`] is the Postgres
//! implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use tracing::instrument;
use uuid::Uuid;

use crate::domain::{StoredConnectionString, Tenant, TenantDomain, TenantId};
use crate::errors::{Result, TenantError};
use crate::storage::DbPool;

/// Database row structure for tenants
#[derive(Debug, Clone, FromRow)]
struct TenantRow {
    pub id: Uuid,
    pub name: String,
    pub code: String,
    pub connection_string: String,
    pub is_active: bool,
    pub deletion_scheduled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
struct DomainRow {
    pub domain: String,
    pub is_verified: bool,
}

/// Credential metadata row used by the rotation sweep.
#[derive(Debug, Clone, FromRow)]
pub struct CredentialRecord {
    pub tenant_id: Uuid,
    pub username: String,
    pub database_name: String,
    pub rotated_at: DateTime<Utc>,
    pub rotate_after: DateTime<Utc>,
}

/// New tenant registration payload.
///
/// Tenant onboarding proper lives outside this core; this is the slice the
/// core (and its tests) need to seed registry records.
#[derive(Debug, Clone)]
pub struct NewTenant {
    pub id: TenantId,
    pub name: String,
    pub code: String,
    pub domains: Vec<TenantDomain>,
    /// Identity of the registering actor, used for deletion ownership checks.
    pub registered_by: String,
}

/// Registry access needed by the tenant isolation core.
#[async_trait]
pub trait TenantDirectory: Send + Sync {
    /// Look up a tenant by id. Returns `None` on a legitimate miss.
    async fn find_by_id(&self, id: TenantId) -> Result<Option<Tenant>>;

    /// Look up a tenant by its short code.
    async fn find_by_code(&self, code: &str) -> Result<Option<Tenant>>;

    /// Look up a tenant by a verified domain (case-normalized).
    async fn find_by_domain(&self, domain: &str) -> Result<Option<Tenant>>;

    /// All active tenants, oldest first.
    async fn list_active(&self) -> Result<Vec<Tenant>>;

    /// Replace the persisted connection-string value.
    async fn update_connection_string(&self, id: TenantId, wire: &str) -> Result<()>;

    /// Flip the active flag, optionally recording a scheduled-deletion deadline.
    async fn set_active(
        &self,
        id: TenantId,
        active: bool,
        deletion_scheduled_at: Option<DateTime<Utc>>,
    ) -> Result<()>;

    /// The registering actor for a tenant, if a registration record exists.
    async fn owner_of(&self, id: TenantId) -> Result<Option<String>>;

    /// Delete the tenant and every tenant-scoped registry row in one
    /// transaction.
    async fn delete_cascade(&self, id: TenantId) -> Result<()>;

    /// Record credential metadata after provisioning or rotation.
    async fn upsert_credential_record(
        &self,
        id: TenantId,
        username: &str,
        database: &str,
        rotated_at: DateTime<Utc>,
        rotate_after: DateTime<Utc>,
    ) -> Result<()>;

    /// Credentials whose rotate-after deadline has passed.
    async fn list_rotation_due(&self, now: DateTime<Utc>) -> Result<Vec<CredentialRecord>>;
}

/// Postgres implementation of [`TenantDirectory`].
#[derive(Debug, Clone)]
pub struct SqlxTenantRepository {
    pool: DbPool,
}

impl SqlxTenantRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Insert a tenant with its domains and registration record.
    #[instrument(skip(self, tenant), fields(tenant_id = %tenant.id, tenant_code = %tenant.code), name = "db_create_tenant")]
    pub async fn create(&self, tenant: NewTenant) -> Result<Tenant> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO tenants (id, name, code, connection_string, is_active, created_at) \
             VALUES ($1, $2, $3, '', TRUE, $4)",
        )
        .bind(tenant.id.as_uuid())
        .bind(&tenant.name)
        .bind(&tenant.code)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, tenant_code = %tenant.code, "Failed to create tenant");
            TenantError::database(e, format!("Failed to create tenant '{}'", tenant.code))
        })?;

        for domain in &tenant.domains {
            sqlx::query(
                "INSERT INTO tenant_domains (tenant_id, domain, is_verified) VALUES ($1, $2, $3)",
            )
            .bind(tenant.id.as_uuid())
            .bind(&domain.domain)
            .bind(domain.is_verified)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            "INSERT INTO tenant_registrations (tenant_id, registered_by, registered_at) \
             VALUES ($1, $2, $3)",
        )
        .bind(tenant.id.as_uuid())
        .bind(&tenant.registered_by)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(tenant_id = %tenant.id, tenant_code = %tenant.code, "Tenant registered");

        Ok(Tenant {
            id: tenant.id,
            name: tenant.name,
            code: tenant.code,
            domains: tenant.domains,
            connection_string: StoredConnectionString::parse(""),
            is_active: true,
            deletion_scheduled_at: None,
            created_at: now,
        })
    }

    async fn load_domains(&self, id: TenantId) -> Result<Vec<TenantDomain>> {
        let rows: Vec<DomainRow> =
            sqlx::query_as("SELECT domain, is_verified FROM tenant_domains WHERE tenant_id = $1")
                .bind(id.as_uuid())
                .fetch_all(&self.pool)
                .await?;

        Ok(rows
            .into_iter()
            .map(|r| TenantDomain { domain: r.domain, is_verified: r.is_verified })
            .collect())
    }

    async fn hydrate(&self, row: TenantRow) -> Result<Tenant> {
        let id = TenantId::from_uuid(row.id);
        Ok(Tenant {
            id,
            name: row.name,
            code: row.code,
            domains: self.load_domains(id).await?,
            connection_string: StoredConnectionString::parse(&row.connection_string),
            is_active: row.is_active,
            deletion_scheduled_at: row.deletion_scheduled_at,
            created_at: row.created_at,
        })
    }

    async fn fetch_one(&self, query: &str, bind: &str) -> Result<Option<Tenant>> {
        let row: Option<TenantRow> =
            sqlx::query_as(query).bind(bind).fetch_optional(&self.pool).await?;

        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }
}

const TENANT_COLUMNS: &str =
    "id, name, code, connection_string, is_active, deletion_scheduled_at, created_at";

#[async_trait]
impl TenantDirectory for SqlxTenantRepository {
    #[instrument(skip(self), name = "db_find_tenant_by_id")]
    async fn find_by_id(&self, id: TenantId) -> Result<Option<Tenant>> {
        let row: Option<TenantRow> =
            sqlx::query_as(&format!("SELECT {} FROM tenants WHERE id = $1", TENANT_COLUMNS))
                .bind(id.as_uuid())
                .fetch_optional(&self.pool)
                .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self), name = "db_find_tenant_by_code")]
    async fn find_by_code(&self, code: &str) -> Result<Option<Tenant>> {
        self.fetch_one(
            &format!("SELECT {} FROM tenants WHERE lower(code) = lower($1)", TENANT_COLUMNS),
            code,
        )
        .await
    }

    #[instrument(skip(self), name = "db_find_tenant_by_domain")]
    async fn find_by_domain(&self, domain: &str) -> Result<Option<Tenant>> {
        self.fetch_one(
            "SELECT t.id, t.name, t.code, t.connection_string, t.is_active, \
                    t.deletion_scheduled_at, t.created_at \
             FROM tenants t \
             JOIN tenant_domains d ON d.tenant_id = t.id \
             WHERE d.is_verified AND lower(d.domain) = lower($1)",
            domain,
        )
        .await
    }

    #[instrument(skip(self), name = "db_list_active_tenants")]
    async fn list_active(&self) -> Result<Vec<Tenant>> {
        let rows: Vec<TenantRow> = sqlx::query_as(&format!(
            "SELECT {} FROM tenants WHERE is_active ORDER BY created_at",
            TENANT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        let mut tenants = Vec::with_capacity(rows.len());
        for row in rows {
            tenants.push(self.hydrate(row).await?);
        }
        Ok(tenants)
    }

    #[instrument(skip(self, wire), name = "db_update_connection_string")]
    async fn update_connection_string(&self, id: TenantId, wire: &str) -> Result<()> {
        let result = sqlx::query("UPDATE tenants SET connection_string = $1 WHERE id = $2")
            .bind(wire)
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(TenantError::not_found("tenant", id.to_string()));
        }
        Ok(())
    }

    #[instrument(skip(self), name = "db_set_tenant_active")]
    async fn set_active(
        &self,
        id: TenantId,
        active: bool,
        deletion_scheduled_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE tenants SET is_active = $1, deletion_scheduled_at = $2 WHERE id = $3",
        )
        .bind(active)
        .bind(deletion_scheduled_at)
        .bind(id.as_uuid())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(TenantError::not_found("tenant", id.to_string()));
        }
        Ok(())
    }

    async fn owner_of(&self, id: TenantId) -> Result<Option<String>> {
        let owner: Option<(String,)> =
            sqlx::query_as("SELECT registered_by FROM tenant_registrations WHERE tenant_id = $1")
                .bind(id.as_uuid())
                .fetch_optional(&self.pool)
                .await?;

        Ok(owner.map(|(o,)| o))
    }

    #[instrument(skip(self), name = "db_delete_tenant_cascade")]
    async fn delete_cascade(&self, id: TenantId) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        // Children first; the tenant row last. One transaction so a failed
        // cascade leaves the registry untouched.
        for table in [
            "tenant_subscriptions",
            "tenant_contracts",
            "tenant_registrations",
            "tenant_billing",
            "tenant_domains",
            "tenant_health_checks",
            "tenant_backups",
            "tenant_credentials",
        ] {
            sqlx::query(&format!("DELETE FROM {} WHERE tenant_id = $1", table))
                .bind(id.as_uuid())
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    tracing::error!(error = %e, table = %table, tenant_id = %id, "Registry cascade delete failed");
                    TenantError::database(e, format!("Failed to delete rows from '{}'", table))
                })?;
        }

        let result = sqlx::query("DELETE FROM tenants WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(TenantError::not_found("tenant", id.to_string()));
        }

        tx.commit().await?;

        tracing::info!(tenant_id = %id, "Tenant registry records deleted");
        Ok(())
    }

    async fn upsert_credential_record(
        &self,
        id: TenantId,
        username: &str,
        database: &str,
        rotated_at: DateTime<Utc>,
        rotate_after: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO tenant_credentials (tenant_id, username, database_name, rotated_at, rotate_after) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (tenant_id) DO UPDATE \
             SET username = $2, database_name = $3, rotated_at = $4, rotate_after = $5",
        )
        .bind(id.as_uuid())
        .bind(username)
        .bind(database)
        .bind(rotated_at)
        .bind(rotate_after)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_rotation_due(&self, now: DateTime<Utc>) -> Result<Vec<CredentialRecord>> {
        let rows: Vec<CredentialRecord> = sqlx::query_as(
            "SELECT c.tenant_id, c.username, c.database_name, c.rotated_at, c.rotate_after \
             FROM tenant_credentials c \
             JOIN tenants t ON t.id = c.tenant_id \
             WHERE t.is_active AND c.rotate_after <= $1",
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
