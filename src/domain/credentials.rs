//! Credential value objects produced by provisioning and rotation.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use super::tenant::StoredConnectionString;
use crate::secrets::SecretString;

/// Fixed rotation period applied uniformly to freshly provisioned and
/// freshly rotated credentials.
pub const CREDENTIAL_ROTATION_PERIOD_DAYS: i64 = 90;

/// Ephemeral value returned by provisioning and rotation.
///
/// The plaintext password is returned exactly once, for operator tooling; it
/// is never persisted by this crate. Only `stored` (a secret-store reference
/// or locally-encrypted ciphertext) reaches the registry.
#[derive(Debug, Clone, Serialize)]
pub struct TenantDatabaseCredentials {
    /// Deterministic principal name (`tenant_user_<12hex>`).
    pub username: String,
    /// One-time plaintext secret. Redacted in Debug/serialization.
    pub password: SecretString,
    /// Fully assembled plaintext connection string. Redacted likewise.
    pub connection_string: SecretString,
    /// The persisted form of the connection string.
    pub stored: StoredConnectionString,
    /// The tenant's own database.
    pub database: String,
    pub created_at: DateTime<Utc>,
    /// Deadline after which the credential should be rotated.
    pub rotate_after: DateTime<Utc>,
}

impl TenantDatabaseCredentials {
    /// Compute the rotate-after deadline from a creation time.
    pub fn rotation_deadline(created_at: DateTime<Utc>) -> DateTime<Utc> {
        created_at + Duration::days(CREDENTIAL_ROTATION_PERIOD_DAYS)
    }

    /// Whether the credential is past its rotation deadline.
    pub fn is_rotation_due(&self, now: DateTime<Utc>) -> bool {
        now >= self.rotate_after
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials(created_at: DateTime<Utc>) -> TenantDatabaseCredentials {
        TenantDatabaseCredentials {
            username: "tenant_user_0123456789ab".to_string(),
            password: SecretString::new("pw"),
            connection_string: SecretString::new("postgresql://u:pw@h/db"),
            stored: StoredConnectionString::Encrypted("cipher".to_string()),
            database: "db_t1".to_string(),
            created_at,
            rotate_after: TenantDatabaseCredentials::rotation_deadline(created_at),
        }
    }

    #[test]
    fn test_rotation_deadline_is_ninety_days() {
        let created = Utc::now();
        let deadline = TenantDatabaseCredentials::rotation_deadline(created);
        assert_eq!(deadline - created, Duration::days(90));
    }

    #[test]
    fn test_rotation_due() {
        let created = Utc::now() - Duration::days(91);
        assert!(credentials(created).is_rotation_due(Utc::now()));

        let fresh = Utc::now();
        assert!(!credentials(fresh).is_rotation_due(Utc::now()));
    }

    #[test]
    fn test_serialization_never_exposes_password() {
        let creds = credentials(Utc::now());
        let json = serde_json::to_string(&creds).unwrap();
        assert!(!json.contains("pw@h"));
        assert!(json.contains("[REDACTED]"));
        assert!(json.contains("tenant_user_0123456789ab"));
    }
}
