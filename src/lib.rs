//! # Tenantplane
//!
//! Tenantplane is the data-plane isolation core for a multi-tenant business
//! suite: every tenant gets a dedicated database, a dedicated database
//! principal with a rotating credential, and row-level-security policies as
//! defense in depth.
//!
//! ## Architecture
//!
//! ```text
//! Request Context → Tenant Resolver → Context Service → Tenant Connection
//!        ↓                ↓                  ↓
//!   Registry (sqlx)  Resolution Cache  Secret Store / Local Encryption
//!                         ↓
//!            Security Service (principals, RLS, rotation)
//! ```
//!
//! ## Core Components
//!
//! - **Tenant Registry**: sqlx/Postgres storage for tenant records, domains,
//!   and credential metadata
//! - **Security Service**: provisions and revokes per-tenant database
//!   principals, toggles row-level security, rotates passwords
//! - **Secret Store**: HashiCorp Vault KV v2 backend with an AES-256-GCM
//!   local-encryption fallback
//! - **Context Service**: resolves header/claim/subdomain signals to the
//!   current tenant and its decrypted connection string
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use tenantplane::{AppConfig, Result, TenantPlane};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = AppConfig::from_env()?;
//!     let plane = TenantPlane::bootstrap(config).await?;
//!     plane.run_until_shutdown().await
//! }
//! ```

pub mod config;
pub mod domain;
pub mod errors;
pub mod observability;
pub mod secrets;
pub mod storage;
pub mod tenancy;

// Re-export commonly used types and traits
pub use config::AppConfig;
pub use errors::{Result, TenantError};
pub use observability::init_tracing;

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use secrets::{SecretEncryption, SecretEncryptionConfig, SecretStore, VaultConfig, VaultSecretsClient};
use storage::{create_registry_pool, DbPool, SqlxTenantRepository, TenantDirectory};
use tenancy::{
    RotationSweeper, TenantContextFactory, TenantContextService, TenantDeletionService,
    TenantResolver, TenantSecurityService,
};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name from Cargo.toml
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");

/// Fully wired isolation core.
///
/// Owns the registry pool and every service; construction performs all
/// fallible startup work (pool, migrations, secret-store probe) so the
/// services themselves never re-probe anything.
pub struct TenantPlane {
    config: AppConfig,
    pool: DbPool,
    directory: Arc<dyn TenantDirectory>,
    store: Arc<SecretStore>,
    resolver: Arc<TenantResolver>,
    security: Arc<TenantSecurityService>,
    context: Arc<TenantContextService>,
    factory: Arc<TenantContextFactory>,
    deletion: Arc<TenantDeletionService>,
}

impl TenantPlane {
    /// Connect, migrate, probe the secret store, and wire every service.
    pub async fn bootstrap(config: AppConfig) -> Result<Self> {
        let pool = create_registry_pool(&config.database).await?;
        let directory: Arc<dyn TenantDirectory> = Arc::new(SqlxTenantRepository::new(pool.clone()));

        let encryption = SecretEncryption::new(&SecretEncryptionConfig::from_env()?)?;
        let store = Arc::new(Self::connect_secret_store(&config, encryption).await);

        let resolver = Arc::new(TenantResolver::new(directory.clone(), config.cache.ttl()));
        let security = Arc::new(TenantSecurityService::new(
            config.database.admin_url.clone(),
            (*store).clone(),
            directory.clone(),
            resolver.clone(),
        )?);
        let context = Arc::new(TenantContextService::new(resolver.clone(), store.clone()));
        let factory = Arc::new(TenantContextFactory::new(context.clone()));
        let deletion = Arc::new(TenantDeletionService::new(
            directory.clone(),
            security.clone(),
            resolver.clone(),
        ));

        info!(
            app_name = APP_NAME,
            version = VERSION,
            secret_store_available = store.is_available(),
            "Tenant isolation core bootstrapped"
        );

        Ok(Self {
            config,
            pool,
            directory,
            store,
            resolver,
            security,
            context,
            factory,
            deletion,
        })
    }

    /// Attempt the external store; an unreachable store degrades to
    /// local-encryption-only instead of failing startup.
    async fn connect_secret_store(config: &AppConfig, encryption: SecretEncryption) -> SecretStore {
        if !config.secret_store.enabled {
            return SecretStore::local_only(encryption);
        }

        let vault_config = VaultConfig {
            address: config.secret_store.vault_address.clone().unwrap_or_default(),
            token: config.secret_store.vault_token.clone(),
            namespace: None,
            mount_path: config
                .secret_store
                .vault_mount_path
                .clone()
                .unwrap_or_else(|| "secret".to_string()),
        };

        match VaultSecretsClient::new(vault_config).await {
            Ok(client) => SecretStore::new(Some(Arc::new(client)), encryption),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "Secret store unreachable at startup; using local encryption"
                );
                SecretStore::local_only(encryption)
            }
        }
    }

    /// Run the rotation sweeper until a shutdown signal arrives.
    pub async fn run_until_shutdown(self) -> Result<()> {
        let shutdown = CancellationToken::new();
        let sweeper = RotationSweeper::new(
            self.directory.clone(),
            self.security.clone(),
            self.config.rotation.sweep_interval(),
        );

        let sweeper_handle = tokio::spawn(sweeper.run(shutdown.clone()));

        tokio::signal::ctrl_c().await.map_err(TenantError::from)?;
        info!("Shutdown signal received");

        shutdown.cancel();
        let _ = sweeper_handle.await;
        self.pool.close().await;

        info!("Tenant isolation core shut down");
        Ok(())
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub fn directory(&self) -> Arc<dyn TenantDirectory> {
        self.directory.clone()
    }

    pub fn secret_store(&self) -> Arc<SecretStore> {
        self.store.clone()
    }

    pub fn resolver(&self) -> Arc<TenantResolver> {
        self.resolver.clone()
    }

    pub fn security(&self) -> Arc<TenantSecurityService> {
        self.security.clone()
    }

    pub fn context(&self) -> Arc<TenantContextService> {
        self.context.clone()
    }

    pub fn factory(&self) -> Arc<TenantContextFactory> {
        self.factory.clone()
    }

    pub fn deletion(&self) -> Arc<TenantDeletionService> {
        self.deletion.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_available() {
        assert!(!VERSION.is_empty());
        assert_eq!(APP_NAME, "tenantplane");
    }
}
