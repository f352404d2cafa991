//! # Configuration Management
//!
//! Environment-driven configuration for the tenant isolation core.

mod settings;

pub use settings::{
    AppConfig, CacheConfig, DatabaseConfig, RotationConfig, SecretStoreConfig,
};
