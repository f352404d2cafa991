//! Repositories for registry data access.

mod tenant;

pub use tenant::{CredentialRecord, NewTenant, SqlxTenantRepository, TenantDirectory};
