//! HashiCorp Vault KV v2 secrets backend.
//!
//! Stores each tenant secret as a KV v2 entry whose data map carries the
//! secret under `value`, the rotate-after deadline under `expires_at`, and
//! every tag under a `tag:`-prefixed key. Deletion removes all versions.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use vaultrs::client::{VaultClient, VaultClientSettingsBuilder};
use vaultrs::kv2;

use super::client::{SecretTags, SecretsClient};
use super::error::{Result, SecretsError};

/// Configuration for connecting to HashiCorp Vault.
#[derive(Debug, Clone)]
pub struct VaultConfig {
    /// Vault server address (e.g. `https://vault.example.com:8200`)
    pub address: String,
    /// Authentication token
    pub token: Option<String>,
    /// Optional Vault namespace (Enterprise)
    pub namespace: Option<String>,
    /// KV v2 mount path (default: `secret`)
    pub mount_path: String,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            address: "http://127.0.0.1:8200".to_string(),
            token: None,
            namespace: None,
            mount_path: "secret".to_string(),
        }
    }
}

/// Vault KV v2 implementation of [`SecretsClient`].
pub struct VaultSecretsClient {
    client: VaultClient,
    mount_path: String,
}

impl VaultSecretsClient {
    /// Creates a new Vault secrets client and verifies connectivity.
    ///
    /// # Errors
    ///
    /// - [`SecretsError::ConfigError`] if the configuration is invalid
    /// - [`SecretsError::ConnectionFailed`] if the health check fails
    pub async fn new(config: VaultConfig) -> Result<Self> {
        if config.address.is_empty() {
            return Err(SecretsError::config_error("Vault address cannot be empty"));
        }

        let mut settings_builder = VaultClientSettingsBuilder::default();
        settings_builder.address(&config.address);

        if let Some(ref token) = config.token {
            settings_builder.token(token);
        }

        if let Some(namespace) = config.namespace {
            settings_builder.namespace(Some(namespace));
        }

        let settings = settings_builder.build().map_err(|e| {
            SecretsError::config_error(format!("Invalid Vault configuration: {}", e))
        })?;

        let client = VaultClient::new(settings).map_err(|e| {
            SecretsError::connection_failed(format!("Failed to create Vault client: {}", e))
        })?;

        match vaultrs::sys::health(&client).await {
            Ok(_) => {
                tracing::info!(address = %config.address, "Connected to Vault secret store");
            }
            Err(e) => {
                tracing::error!(error = %e, address = %config.address, "Vault health check failed");
                return Err(SecretsError::connection_failed(format!(
                    "Vault health check failed: {}",
                    e
                )));
            }
        }

        Ok(Self { client, mount_path: config.mount_path })
    }

    /// Creates a Vault client from environment variables.
    ///
    /// Reads `VAULT_ADDR`, `VAULT_TOKEN`, `VAULT_NAMESPACE` (optional), and
    /// `VAULT_MOUNT_PATH` (default: `secret`).
    pub async fn from_env() -> Result<Self> {
        let address = std::env::var("VAULT_ADDR")
            .map_err(|_| SecretsError::config_error("VAULT_ADDR environment variable not set"))?;

        let config = VaultConfig {
            address,
            token: std::env::var("VAULT_TOKEN").ok(),
            namespace: std::env::var("VAULT_NAMESPACE").ok(),
            mount_path: std::env::var("VAULT_MOUNT_PATH").unwrap_or_else(|_| "secret".to_string()),
        };

        Self::new(config).await
    }
}

#[async_trait]
impl SecretsClient for VaultSecretsClient {
    async fn set_secret(
        &self,
        name: &str,
        value: &str,
        tags: &SecretTags,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut data = HashMap::new();
        data.insert("value".to_string(), value.to_string());
        data.insert("expires_at".to_string(), expires_at.to_rfc3339());
        for (key, tag_value) in tags.iter() {
            data.insert(format!("tag:{}", key), tag_value.to_string());
        }

        kv2::set(&self.client, &self.mount_path, name, &data).await.map_err(|e| {
            tracing::error!(error = %e, name = %name, "Failed to write secret to Vault");
            SecretsError::backend_error(format!("Failed to store secret '{}': {}", name, e))
        })?;

        tracing::info!(name = %name, mount_path = %self.mount_path, "Stored secret in Vault");
        Ok(())
    }

    async fn get_secret(&self, name: &str) -> Result<String> {
        let secret: HashMap<String, String> =
            kv2::read(&self.client, &self.mount_path, name).await.map_err(|e| {
                tracing::warn!(error = %e, name = %name, "Failed to read secret from Vault");
                SecretsError::not_found(name)
            })?;

        secret.get("value").cloned().ok_or_else(|| {
            SecretsError::backend_error(format!("Secret '{}' has no 'value' field", name))
        })
    }

    async fn delete_secret(&self, name: &str) -> Result<()> {
        // Metadata delete removes all versions.
        kv2::delete_metadata(&self.client, &self.mount_path, name).await.map_err(|e| {
            tracing::error!(error = %e, name = %name, "Failed to delete secret from Vault");
            SecretsError::backend_error(format!("Failed to delete secret '{}': {}", name, e))
        })?;

        tracing::info!(name = %name, mount_path = %self.mount_path, "Deleted secret from Vault");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vault_config_default() {
        let config = VaultConfig::default();
        assert_eq!(config.mount_path, "secret");
        assert!(config.token.is_none());
        assert!(config.namespace.is_none());
    }

    #[tokio::test]
    async fn test_empty_address_rejected() {
        let config = VaultConfig { address: String::new(), ..Default::default() };
        let result = VaultSecretsClient::new(config).await;
        assert!(matches!(result, Err(SecretsError::ConfigError { .. })));
    }
}
