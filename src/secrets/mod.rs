//! Secrets management for tenant credentials.
//!
//! This module provides the storage side of the credential lifecycle: a
//! backend-agnostic [`SecretsClient`] trait, a HashiCorp Vault KV v2
//! implementation, an AES-256-GCM local encryption service, and the
//! [`SecretStore`] capability wrapper that decides once, at construction,
//! whether an external secret store is available and otherwise degrades to
//! local encryption.
//!
//! # Architecture
//!
//! ```text
//! TenantSecurityService
//!        │
//!        ▼
//!   SecretStore ──(available)──▶ SecretsClient (Vault KV v2)
//!        │
//!        └─────(fallback)──────▶ SecretEncryption (AES-256-GCM)
//! ```
//!
//! Secret names follow the fixed patterns `tenant-cs-<12hex>` (connection
//! string) and `tenant-pwd-<12hex>` (password). The registry never stores a
//! plaintext password: it holds either a `SECRET:<name>` reference or a
//! locally-encrypted ciphertext.
//!
//! # Security Considerations
//!
//! - Secret values are never logged or included in error messages
//! - [`SecretString`] zeroes its memory on drop
//! - Store writes during provisioning degrade to local encryption; store
//!   deletes during teardown are best-effort

pub mod client;
pub mod encryption;
pub mod error;
pub mod store;
pub mod types;
pub mod vault;

pub use client::{SecretTags, SecretsClient};
pub use encryption::{SecretEncryption, SecretEncryptionConfig};
pub use error::{Result, SecretsError};
pub use store::{PersistedSecret, SecretStore};
pub use types::SecretString;
pub use vault::{VaultConfig, VaultSecretsClient};
