//! # Registry Schema Migrations
//!
//! Embedded, idempotent DDL for the central tenant registry. Statements are
//! compiled into the binary and executed in order on startup when
//! auto-migrate is enabled. Tenant business schemas are owned by the
//! business modules and are out of scope here; this covers only the registry
//! tables the isolation core reads and cascades over.

use crate::errors::{Result, TenantError};
use crate::storage::DbPool;
use tracing::info;

/// Registry DDL in dependency order. Every statement is idempotent so the
/// set can be re-run safely on every startup.
const REGISTRY_DDL: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS tenants (
        id UUID PRIMARY KEY,
        name TEXT NOT NULL,
        code TEXT NOT NULL UNIQUE,
        connection_string TEXT NOT NULL DEFAULT '',
        is_active BOOLEAN NOT NULL DEFAULT TRUE,
        deletion_scheduled_at TIMESTAMPTZ,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS tenant_domains (
        tenant_id UUID NOT NULL REFERENCES tenants(id),
        domain TEXT NOT NULL,
        is_verified BOOLEAN NOT NULL DEFAULT FALSE,
        PRIMARY KEY (tenant_id, domain)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS tenant_registrations (
        tenant_id UUID PRIMARY KEY REFERENCES tenants(id),
        registered_by TEXT NOT NULL,
        registered_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS tenant_credentials (
        tenant_id UUID PRIMARY KEY REFERENCES tenants(id),
        username TEXT NOT NULL,
        database_name TEXT NOT NULL,
        rotated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        rotate_after TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS tenant_subscriptions (
        id UUID PRIMARY KEY,
        tenant_id UUID NOT NULL REFERENCES tenants(id),
        plan TEXT NOT NULL,
        started_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS tenant_contracts (
        id UUID PRIMARY KEY,
        tenant_id UUID NOT NULL REFERENCES tenants(id),
        body TEXT NOT NULL DEFAULT '',
        signed_at TIMESTAMPTZ
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS tenant_billing (
        id UUID PRIMARY KEY,
        tenant_id UUID NOT NULL REFERENCES tenants(id),
        amount_cents BIGINT NOT NULL DEFAULT 0,
        billed_at TIMESTAMPTZ
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS tenant_health_checks (
        id UUID PRIMARY KEY,
        tenant_id UUID NOT NULL REFERENCES tenants(id),
        status TEXT NOT NULL,
        checked_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS tenant_backups (
        id UUID PRIMARY KEY,
        tenant_id UUID NOT NULL REFERENCES tenants(id),
        location TEXT NOT NULL,
        taken_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_tenant_domains_domain ON tenant_domains (domain)",
    "CREATE INDEX IF NOT EXISTS idx_tenant_credentials_rotate_after ON tenant_credentials (rotate_after)",
];

/// Run all registry migrations.
pub async fn run_migrations(pool: &DbPool) -> Result<()> {
    for statement in REGISTRY_DDL {
        sqlx::query(statement).execute(pool).await.map_err(|e| {
            tracing::error!(error = %e, "Registry migration statement failed");
            TenantError::database(e, "Registry migration failed")
        })?;
    }

    info!(statements = REGISTRY_DDL.len(), "Registry migrations applied");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ddl_is_idempotent_by_construction() {
        for statement in REGISTRY_DDL {
            assert!(
                statement.contains("IF NOT EXISTS"),
                "non-idempotent migration statement: {}",
                statement
            );
        }
    }

    #[test]
    fn test_cascade_tables_present() {
        // Every table the deletion orchestrator cascades over must exist in
        // the registry schema.
        let ddl = REGISTRY_DDL.join("\n");
        for table in [
            "tenant_subscriptions",
            "tenant_contracts",
            "tenant_registrations",
            "tenant_billing",
            "tenant_domains",
            "tenant_health_checks",
            "tenant_backups",
        ] {
            assert!(ddl.contains(table), "missing registry table: {}", table);
        }
    }
}
