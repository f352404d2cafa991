//! Tenant registry domain types.
//!
//! The central registry holds one record per customer organization. Each
//! tenant owns a dedicated database and a dedicated database principal; the
//! registry stores only the persisted form of the connection string, never
//! the plaintext credential.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Prefix sentinel marking a secret-store reference in the persisted field.
const SECRET_REF_PREFIX: &str = "SECRET:";

/// Type-safe tenant identifier (UUID-backed).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct TenantId(Uuid);

impl TenantId {
    /// Create a fresh random tenant id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Parse a tenant id from its string form.
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// The id's 32-character lowercase hex form (no hyphens). Principal and
    /// secret names are derived from a prefix of this.
    pub fn as_simple_hex(&self) -> String {
        self.0.simple().to_string()
    }
}

impl Default for TenantId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TenantId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// A domain name registered to a tenant. Only verified domains participate
/// in request resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantDomain {
    pub domain: String,
    pub is_verified: bool,
}

impl TenantDomain {
    pub fn verified(domain: impl Into<String>) -> Self {
        Self { domain: domain.into().to_lowercase(), is_verified: true }
    }

    pub fn unverified(domain: impl Into<String>) -> Self {
        Self { domain: domain.into().to_lowercase(), is_verified: false }
    }
}

/// The persisted connection-string value, parsed from its wire string at the
/// storage boundary.
///
/// The wire field is empty until provisioning runs, and afterwards one of
/// three shapes distinguished by prefix: an engine-recognizable plaintext
/// URL, a `SECRET:<name>` store reference, or opaque locally-encrypted
/// ciphertext. Prefix sniffing happens exactly here; the rest of the
/// codebase matches on the variants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoredConnectionString {
    /// No credential provisioned yet.
    Unset,
    /// Unencrypted connection string (recognized engine prefix).
    Plaintext(String),
    /// Reference to a secret-store entry holding the connection string.
    SecretRef(String),
    /// Locally-encrypted ciphertext.
    Encrypted(String),
}

impl StoredConnectionString {
    /// Parse the persisted wire form.
    pub fn parse(wire: &str) -> Self {
        if wire.is_empty() {
            Self::Unset
        } else if wire.starts_with("postgresql://") || wire.starts_with("postgres://") {
            Self::Plaintext(wire.to_string())
        } else if let Some(name) = wire.strip_prefix(SECRET_REF_PREFIX) {
            Self::SecretRef(name.to_string())
        } else {
            Self::Encrypted(wire.to_string())
        }
    }

    /// Render the wire form stored in the registry.
    pub fn to_wire(&self) -> String {
        match self {
            Self::Unset => String::new(),
            Self::Plaintext(url) => url.clone(),
            Self::SecretRef(name) => format!("{}{}", SECRET_REF_PREFIX, name),
            Self::Encrypted(ciphertext) => ciphertext.clone(),
        }
    }

    /// True when decryption requires a secret-store round trip.
    pub fn is_secret_ref(&self) -> bool {
        matches!(self, Self::SecretRef(_))
    }
}

/// A tenant registry record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    pub id: TenantId,
    pub name: String,
    /// Short unique code used in headers and subdomain matching.
    pub code: String,
    pub domains: Vec<TenantDomain>,
    /// Persisted connection-string value; exactly one per tenant.
    pub connection_string: StoredConnectionString,
    pub is_active: bool,
    /// Deadline for a scheduled (soft) deletion, if one is pending.
    pub deletion_scheduled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Tenant {
    /// Whether this tenant may resolve to a usable context.
    pub fn is_resolvable(&self) -> bool {
        self.is_active
    }

    /// The tenant's verified domains, case-normalized.
    pub fn verified_domains(&self) -> impl Iterator<Item = &str> {
        self.domains.iter().filter(|d| d.is_verified).map(|d| d.domain.as_str())
    }
}
