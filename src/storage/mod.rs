//! # Storage Layer
//!
//! Registry persistence: connection pooling for the central tenant registry,
//! per-operation administrative connections for DDL, embedded schema
//! migrations, and the tenant repository.

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{admin_connection, connect_to_database, create_registry_pool, DbPool};
pub use repositories::{NewTenant, SqlxTenantRepository, TenantDirectory};
