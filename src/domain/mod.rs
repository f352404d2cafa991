//! Domain types for the tenant registry and credential lifecycle.

pub mod credentials;
pub mod tenant;

pub use credentials::{TenantDatabaseCredentials, CREDENTIAL_ROTATION_PERIOD_DAYS};
pub use tenant::{StoredConnectionString, Tenant, TenantDomain, TenantId};
