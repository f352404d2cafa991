//! # Configuration Settings
//!
//! Defines the configuration structure for the tenant isolation core. Every
//! section loads from environment variables with sensible defaults and is
//! checked with `validator` before the services are constructed.

use crate::errors::{Result, TenantError};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::Validate;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default)]
pub struct AppConfig {
    /// Administrative database configuration
    #[validate(nested)]
    pub database: DatabaseConfig,

    /// External secret store configuration
    #[validate(nested)]
    pub secret_store: SecretStoreConfig,

    /// Credential rotation policy
    #[validate(nested)]
    pub rotation: RotationConfig,

    /// Tenant-resolution cache tuning
    #[validate(nested)]
    pub cache: CacheConfig,
}

impl AppConfig {
    /// Load the full configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            database: DatabaseConfig::from_env()?,
            secret_store: SecretStoreConfig::from_env(),
            rotation: RotationConfig::from_env(),
            cache: CacheConfig::from_env(),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<()> {
        Validate::validate(self).map_err(TenantError::from)?;
        self.validate_custom()
    }

    fn validate_custom(&self) -> Result<()> {
        if !self.database.admin_url.starts_with("postgresql://")
            && !self.database.admin_url.starts_with("postgres://")
        {
            return Err(TenantError::validation(
                "Administrative database URL must start with 'postgresql://' or 'postgres://'",
            ));
        }

        if self.secret_store.enabled && self.secret_store.vault_address.is_none() {
            return Err(TenantError::validation(
                "Secret store is enabled but no Vault address is configured",
            ));
        }

        Ok(())
    }
}

/// Administrative database configuration.
///
/// The admin connection is the one the security service uses for principal
/// and database DDL; it is opened per logical operation, never shared across
/// tenants.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DatabaseConfig {
    /// Administrative connection URL (registry + DDL)
    #[validate(length(min = 1, message = "Admin database URL cannot be empty"))]
    pub admin_url: String,

    /// Maximum number of connections in the registry pool
    #[validate(range(min = 1, max = 100, message = "Max connections must be between 1 and 100"))]
    pub max_connections: u32,

    /// Minimum number of connections in the registry pool
    #[validate(range(max = 50, message = "Min connections must be <= 50"))]
    pub min_connections: u32,

    /// Connection timeout in seconds
    #[validate(range(
        min = 1,
        max = 60,
        message = "Connect timeout must be between 1 and 60 seconds"
    ))]
    pub connect_timeout_seconds: u64,

    /// Enable automatic registry migrations
    pub auto_migrate: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            admin_url: "postgresql://localhost:5432/tenant_registry".to_string(),
            max_connections: 10,
            min_connections: 0,
            connect_timeout_seconds: 10,
            auto_migrate: true,
        }
    }
}

impl DatabaseConfig {
    /// Create DatabaseConfig from environment variables.
    ///
    /// The administrative connection string is required: without it the
    /// security service cannot function at all.
    pub fn from_env() -> Result<Self> {
        let admin_url = std::env::var("TENANTPLANE_ADMIN_DATABASE_URL")
            .or_else(|_| std::env::var("DATABASE_URL"))
            .map_err(|_| {
                TenantError::config(
                    "TENANTPLANE_ADMIN_DATABASE_URL (or DATABASE_URL) must be set",
                )
            })?;

        let max_connections = env_parse("TENANTPLANE_DB_MAX_CONNECTIONS", 10);
        let min_connections = env_parse("TENANTPLANE_DB_MIN_CONNECTIONS", 0);
        let connect_timeout_seconds = env_parse("TENANTPLANE_DB_CONNECT_TIMEOUT_SECONDS", 10);
        let auto_migrate = std::env::var("TENANTPLANE_DB_AUTO_MIGRATE")
            .map(|s| s.to_lowercase() == "true" || s == "1")
            .unwrap_or(true);

        Ok(Self { admin_url, max_connections, min_connections, connect_timeout_seconds, auto_migrate })
    }

    /// Get connection timeout as Duration
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }
}

/// External secret store configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default)]
pub struct SecretStoreConfig {
    /// Whether to attempt connecting a secret store at startup
    pub enabled: bool,

    /// Vault server address
    pub vault_address: Option<String>,

    /// Vault authentication token
    pub vault_token: Option<String>,

    /// Vault KV v2 mount path
    pub vault_mount_path: Option<String>,
}

impl SecretStoreConfig {
    pub fn from_env() -> Self {
        let vault_address = std::env::var("VAULT_ADDR").ok();
        Self {
            enabled: vault_address.is_some(),
            vault_address,
            vault_token: std::env::var("VAULT_TOKEN").ok(),
            vault_mount_path: std::env::var("VAULT_MOUNT_PATH").ok(),
        }
    }
}

/// Credential rotation policy.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RotationConfig {
    /// Interval between rotation sweep passes, in seconds
    #[validate(range(min = 60, message = "Sweep interval must be at least 60 seconds"))]
    pub sweep_interval_seconds: u64,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self { sweep_interval_seconds: 3600 }
    }
}

impl RotationConfig {
    pub fn from_env() -> Self {
        Self { sweep_interval_seconds: env_parse("TENANTPLANE_ROTATION_SWEEP_SECONDS", 3600) }
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_seconds)
    }
}

/// Tenant-resolution cache tuning.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CacheConfig {
    /// Sliding-expiration TTL for resolved tenant contexts, in seconds
    #[validate(range(min = 1, max = 3600, message = "Cache TTL must be between 1 and 3600 seconds"))]
    pub ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { ttl_seconds: 60 }
    }
}

impl CacheConfig {
    pub fn from_env() -> Self {
        Self { ttl_seconds: env_parse("TENANTPLANE_RESOLUTION_CACHE_TTL_SECONDS", 60) }
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }
}

fn env_parse<T: std::str::FromStr>(var: &str, default: T) -> T {
    std::env::var(var).ok().and_then(|s| s.parse().ok()).unwrap_or(default)
}
