//! Core secrets client trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use super::error::{Result, SecretsError};

/// Tag metadata attached to a stored secret.
///
/// Tags let operators trace a stored secret back to the tenant and lifecycle
/// event that produced it (provisioning vs. rotation) without reading the
/// secret value itself.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SecretTags(BTreeMap<String, String>);

impl SecretTags {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Add a tag, replacing any previous value for the same key.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Trait for secrets management backends.
///
/// Provides the key-value protocol the credential lifecycle needs: tagged
/// writes with an expiry, reads, and best-effort deletes. Implementations
/// MUST NOT log secret values, and network communication MUST use TLS.
#[async_trait]
pub trait SecretsClient: Send + Sync {
    /// Store or update a secret value with tag metadata and an expiry.
    ///
    /// The expiry marks the rotate-after deadline; backends that support
    /// native expiration should apply it, others store it as metadata.
    async fn set_secret(
        &self,
        name: &str,
        value: &str,
        tags: &SecretTags,
        expires_at: DateTime<Utc>,
    ) -> Result<()>;

    /// Retrieve a secret value by name.
    ///
    /// # Errors
    ///
    /// - [`SecretsError::NotFound`] if the secret doesn't exist
    /// - [`SecretsError::ConnectionFailed`] if the backend is unreachable
    async fn get_secret(&self, name: &str) -> Result<String>;

    /// Delete a secret from the backend.
    async fn delete_secret(&self, name: &str) -> Result<()>;

    /// Check if a secret exists.
    async fn secret_exists(&self, name: &str) -> Result<bool> {
        match self.get_secret(name).await {
            Ok(_) => Ok(true),
            Err(SecretsError::NotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_builder() {
        let tags = SecretTags::new()
            .with("tenant_id", "t1")
            .with("kind", "password")
            .with("kind", "connection-string");

        assert_eq!(tags.get("tenant_id"), Some("t1"));
        // Last write wins per key.
        assert_eq!(tags.get("kind"), Some("connection-string"));
        assert_eq!(tags.iter().count(), 2);
    }

    #[test]
    fn test_tags_empty() {
        assert!(SecretTags::new().is_empty());
        assert!(!SecretTags::new().with("a", "b").is_empty());
    }
}
