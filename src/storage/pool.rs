//! # Database Connection Management
//!
//! Provides the registry connection pool plus per-operation administrative
//! connections. The administrative connection is opened and closed per
//! logical operation rather than pooled across calls, so no connection is
//! ever reused across tenants.

use crate::config::DatabaseConfig;
use crate::errors::{Result, TenantError};
use crate::observability::sanitize_url;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{ConnectOptions, Connection, PgConnection, Pool, Postgres};
use std::str::FromStr;

/// Type alias for the registry connection pool
pub type DbPool = Pool<Postgres>;

/// Create the tenant-registry connection pool.
pub async fn create_registry_pool(config: &DatabaseConfig) -> Result<DbPool> {
    validate_config(config)?;

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.connect_timeout())
        .test_before_acquire(true)
        .connect(&config.admin_url)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, url = %sanitize_url(&config.admin_url), "Failed to create registry pool");
            TenantError::database(
                e,
                format!("Failed to connect to registry: {}", sanitize_url(&config.admin_url)),
            )
        })?;

    tracing::info!(
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        connect_timeout_ms = config.connect_timeout().as_millis(),
        "Registry connection pool created"
    );

    if config.auto_migrate {
        tracing::info!("Auto-migration enabled, running registry migrations");
        crate::storage::migrations::run_migrations(&pool).await?;
    }

    Ok(pool)
}

/// Open a single administrative connection for one logical DDL operation.
///
/// Dropped (and thereby closed) when the operation finishes.
pub async fn admin_connection(admin_url: &str) -> Result<PgConnection> {
    let options = PgConnectOptions::from_str(admin_url)
        .map_err(|e| {
            TenantError::database(
                e,
                format!("Invalid admin connection string: {}", sanitize_url(admin_url)),
            )
        })?
        .disable_statement_logging();

    PgConnection::connect_with(&options).await.map_err(|e| {
        tracing::error!(error = %e, url = %sanitize_url(admin_url), "Failed to open admin connection");
        TenantError::database(
            e,
            format!("Failed to open admin connection: {}", sanitize_url(admin_url)),
        )
    })
}

/// Open a single connection to a specific database on the same server as the
/// administrative URL. Used for the in-database grant steps of provisioning.
pub async fn connect_to_database(admin_url: &str, database: &str) -> Result<PgConnection> {
    let options = PgConnectOptions::from_str(admin_url)
        .map_err(|e| {
            TenantError::database(
                e,
                format!("Invalid admin connection string: {}", sanitize_url(admin_url)),
            )
        })?
        .database(database)
        .disable_statement_logging();

    PgConnection::connect_with(&options).await.map_err(|e| {
        tracing::error!(error = %e, database = %database, "Failed to connect to tenant database");
        TenantError::database(e, format!("Failed to connect to database '{}'", database))
    })
}

/// Validate database configuration
fn validate_config(config: &DatabaseConfig) -> Result<()> {
    if config.max_connections == 0 {
        return Err(TenantError::validation("max_connections must be greater than 0"));
    }

    if config.min_connections > config.max_connections {
        return Err(TenantError::validation(
            "min_connections cannot be greater than max_connections",
        ));
    }

    if config.admin_url.is_empty() {
        return Err(TenantError::config("administrative database URL cannot be empty"));
    }

    if !config.admin_url.starts_with("postgresql://") && !config.admin_url.starts_with("postgres://")
    {
        return Err(TenantError::validation(
            "database URL must start with 'postgresql://' or 'postgres://'",
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_config_valid() {
        let config = DatabaseConfig {
            admin_url: "postgresql://localhost/registry".to_string(),
            max_connections: 10,
            min_connections: 2,
            ..Default::default()
        };
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_config_zero_max_connections() {
        let config = DatabaseConfig {
            admin_url: "postgresql://localhost/registry".to_string(),
            max_connections: 0,
            ..Default::default()
        };
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_config_min_exceeds_max() {
        let config = DatabaseConfig {
            admin_url: "postgresql://localhost/registry".to_string(),
            max_connections: 5,
            min_connections: 10,
            ..Default::default()
        };
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_config_rejects_other_schemes() {
        let config = DatabaseConfig {
            admin_url: "sqlite://./registry.db".to_string(),
            ..Default::default()
        };
        assert!(validate_config(&config).is_err());
    }
}
