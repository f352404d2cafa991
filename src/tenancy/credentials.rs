//! Credential generation: deterministic names, random secrets.
//!
//! Principal and secret names are derived from a fixed-length prefix of the
//! tenant id's hex form, so retries of a provisioning call always target the
//! same principal and two distinct tenants collide only with negligible
//! probability (12 hex chars ≈ 48 bits).

use base64::Engine;
use ring::rand::{SecureRandom, SystemRandom};

use crate::domain::TenantId;
use crate::errors::{Result, TenantError};
use crate::secrets::SecretString;

/// Number of hex characters of the tenant id carried into derived names.
const NAME_HEX_LEN: usize = 12;

/// Bytes of entropy in a generated password.
const PASSWORD_BYTES: usize = 32;

/// Generates principal names, secret names, and passwords for tenants.
#[derive(Clone)]
pub struct CredentialGenerator {
    rng: SystemRandom,
}

impl Default for CredentialGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialGenerator {
    pub fn new() -> Self {
        Self { rng: SystemRandom::new() }
    }

    fn hex_prefix(tenant_id: TenantId) -> String {
        let hex = tenant_id.as_simple_hex();
        hex[..NAME_HEX_LEN].to_string()
    }

    /// Deterministic database principal name: `tenant_user_<12hex>`.
    pub fn tenant_username(tenant_id: TenantId) -> String {
        format!("tenant_user_{}", Self::hex_prefix(tenant_id))
    }

    /// Secret-store name for the tenant's connection string.
    pub fn connection_string_secret_name(tenant_id: TenantId) -> String {
        format!("tenant-cs-{}", Self::hex_prefix(tenant_id))
    }

    /// Secret-store name for the tenant's password.
    pub fn password_secret_name(tenant_id: TenantId) -> String {
        format!("tenant-pwd-{}", Self::hex_prefix(tenant_id))
    }

    /// Generate a fresh password: 32 bytes from a CSPRNG, base64-encoded,
    /// with the `+`, `/`, and `=` characters remapped to alphanumerics so
    /// the value embeds safely in generated SQL and connection strings.
    pub fn generate_password(&self) -> Result<SecretString> {
        let mut bytes = [0u8; PASSWORD_BYTES];
        self.rng
            .fill(&mut bytes)
            .map_err(|_| TenantError::internal("Failed to draw random bytes for password"))?;

        let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
        let remapped: String = encoded
            .chars()
            .map(|c| match c {
                '+' => 'A',
                '/' => 'b',
                '=' => 'x',
                other => other,
            })
            .collect();

        Ok(SecretString::new(remapped))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tenant_id(s: &str) -> TenantId {
        TenantId::parse(s).unwrap()
    }

    #[test]
    fn test_username_is_deterministic() {
        let id = tenant_id("6ba7b810-9dad-11d1-80b4-00c04fd430c8");
        let first = CredentialGenerator::tenant_username(id);
        let second = CredentialGenerator::tenant_username(id);
        assert_eq!(first, second);
        assert_eq!(first, "tenant_user_6ba7b8109dad");
    }

    #[test]
    fn test_distinct_tenants_get_distinct_names() {
        let a = CredentialGenerator::tenant_username(TenantId::new());
        let b = CredentialGenerator::tenant_username(TenantId::new());
        assert_ne!(a, b);
    }

    #[test]
    fn test_secret_name_patterns() {
        let id = tenant_id("6ba7b810-9dad-11d1-80b4-00c04fd430c8");
        assert_eq!(
            CredentialGenerator::connection_string_secret_name(id),
            "tenant-cs-6ba7b8109dad"
        );
        assert_eq!(CredentialGenerator::password_secret_name(id), "tenant-pwd-6ba7b8109dad");
    }

    #[test]
    fn test_password_charset_is_sql_safe() {
        let generator = CredentialGenerator::new();
        for _ in 0..100 {
            let password = generator.generate_password().unwrap();
            let value = password.expose_secret();
            // base64 of 32 bytes
            assert_eq!(value.len(), 44);
            assert!(
                value.chars().all(|c| c.is_ascii_alphanumeric()),
                "password contains non-alphanumeric character: {}",
                value
            );
        }
    }

    #[test]
    fn test_passwords_are_unique() {
        let generator = CredentialGenerator::new();
        let a = generator.generate_password().unwrap();
        let b = generator.generate_password().unwrap();
        assert_ne!(a.expose_secret(), b.expose_secret());
    }
}
