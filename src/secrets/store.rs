//! Optional secret-store capability with local-encryption fallback.
//!
//! The external secret store may or may not be wired up at runtime. Instead
//! of scattering availability checks through the security service, this
//! wrapper decides availability once at construction and routes every
//! persistence call through one fallback-decision function:
//! [`SecretStore::persist_connection_string`].

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, warn};

use super::client::{SecretTags, SecretsClient};
use super::encryption::SecretEncryption;
use super::error::Result;
use super::types::SecretString;

/// Outcome of persisting a tenant credential.
///
/// Exactly one of the two forms is produced per persistence call; the
/// registry stores the wire rendering of whichever it received.
#[derive(Debug, Clone, PartialEq)]
pub enum PersistedSecret {
    /// The connection string lives in the external store under this name.
    Reference(String),
    /// The connection string was encrypted locally; this is the ciphertext.
    Encrypted(String),
}

/// Secret persistence facade combining an optional external store with the
/// always-present local encryption fallback.
#[derive(Clone)]
pub struct SecretStore {
    client: Option<Arc<dyn SecretsClient>>,
    encryption: SecretEncryption,
}

impl SecretStore {
    /// Build the store. Availability of the external backend is fixed here;
    /// callers never re-probe it.
    pub fn new(client: Option<Arc<dyn SecretsClient>>, encryption: SecretEncryption) -> Self {
        if client.is_some() {
            info!("Secret store configured; credentials will be persisted externally");
        } else {
            info!("No secret store configured; falling back to local encryption");
        }
        Self { client, encryption }
    }

    /// Local-encryption-only store.
    pub fn local_only(encryption: SecretEncryption) -> Self {
        Self::new(None, encryption)
    }

    /// Whether an external secret store backend is wired up.
    pub fn is_available(&self) -> bool {
        self.client.is_some()
    }

    /// Persist a freshly generated credential pair.
    ///
    /// With an available backend, the connection string and the password are
    /// written as two separate tagged secrets with the given expiry, and a
    /// [`PersistedSecret::Reference`] to the connection-string secret is
    /// returned. If the backend is absent or either write fails, the
    /// connection string is encrypted locally instead — the degradation is
    /// invisible to the caller apart from the returned variant.
    pub async fn persist_connection_string(
        &self,
        cs_name: &str,
        pwd_name: &str,
        connection_string: &SecretString,
        password: &SecretString,
        tags: &SecretTags,
        expires_at: DateTime<Utc>,
    ) -> Result<PersistedSecret> {
        if let Some(client) = &self.client {
            let stored = async {
                client
                    .set_secret(cs_name, connection_string.expose_secret(), tags, expires_at)
                    .await?;
                client.set_secret(pwd_name, password.expose_secret(), tags, expires_at).await
            }
            .await;

            match stored {
                Ok(()) => return Ok(PersistedSecret::Reference(cs_name.to_string())),
                Err(e) => {
                    warn!(
                        error = %e,
                        secret_name = %cs_name,
                        "Secret store write failed; degrading to local encryption"
                    );
                }
            }
        }

        let ciphertext = self.encryption.encrypt_string(connection_string.expose_secret())?;
        Ok(PersistedSecret::Encrypted(ciphertext))
    }

    /// Fetch a secret value from the external store.
    pub async fn fetch(&self, name: &str) -> Result<SecretString> {
        match &self.client {
            Some(client) => Ok(SecretString::new(client.get_secret(name).await?)),
            None => Err(super::error::SecretsError::backend_error(format!(
                "Secret '{}' is a store reference but no secret store is configured",
                name
            ))),
        }
    }

    /// Decrypt a locally-encrypted value.
    pub fn decrypt_local(&self, ciphertext: &str) -> Result<SecretString> {
        self.encryption.decrypt_string(ciphertext)
    }

    /// Best-effort deletion of secrets during tenant teardown.
    ///
    /// Failures (including an absent backend) are logged and swallowed:
    /// teardown must proceed even if a sub-step is already moot.
    pub async fn delete_best_effort(&self, names: &[&str]) {
        let Some(client) = &self.client else {
            return;
        };

        for name in names {
            if let Err(e) = client.delete_secret(name).await {
                warn!(error = %e, secret_name = %name, "Best-effort secret deletion failed");
            }
        }
    }
}

impl std::fmt::Debug for SecretStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretStore").field("available", &self.is_available()).finish()
    }
}
