//! # Error Handling
//!
//! Error types for the tenant isolation core, built on `thiserror`.

mod types;

pub use types::{Result, TenantError};
