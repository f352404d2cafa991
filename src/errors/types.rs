//! # Error Types
//!
//! Error types for the tenant isolation core using `thiserror`.
//!
//! The taxonomy mirrors the failure semantics of the credential lifecycle:
//! lookups that legitimately miss surface as [`TenantError::NotFound`] so
//! callers can branch on absence, database-engine failures carry context and
//! propagate, and configuration failures abort construction immediately.

use crate::secrets::SecretsError;

/// Custom result type for tenant isolation operations
pub type Result<T> = std::result::Result<T, TenantError>;

/// Main error type for the tenant isolation core
#[derive(thiserror::Error, Debug)]
pub enum TenantError {
    /// Configuration errors (missing admin connection string, bad key material)
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Database-engine errors during provisioning, rotation, or validation
    #[error("Database error: {context}")]
    Database {
        #[source]
        source: sqlx::Error,
        context: String,
    },

    /// Secrets backend errors
    #[error("Secrets error: {context}")]
    Secrets {
        #[source]
        source: SecretsError,
        context: String,
    },

    /// Validation errors
    #[error("Validation error: {message}")]
    Validation { message: String, field: Option<String> },

    /// Authorization errors (e.g. a non-owner requesting tenant deletion)
    #[error("Authorization error: {message}")]
    Authorization { message: String },

    /// Resource not found errors
    #[error("Resource not found: {resource_type} with ID '{id}'")]
    NotFound { resource_type: String, id: String },

    /// No tenant context could be established for the current unit of work
    #[error("No current tenant: {message}")]
    NoCurrentTenant { message: String },

    /// Serialization/deserialization errors
    #[error("Serialization error: {context}")]
    Serialization {
        #[source]
        source: serde_json::Error,
        context: String,
    },

    /// I/O errors with additional context
    #[error("I/O error: {context}")]
    Io {
        #[source]
        source: std::io::Error,
        context: String,
    },

    /// Internal errors
    #[error("Internal error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl TenantError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config { message: message.into(), source: None }
    }

    /// Create a configuration error with source
    pub fn config_with_source<S: Into<String>>(
        message: S,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self::Config { message: message.into(), source: Some(source) }
    }

    /// Create a database error with context
    pub fn database<S: Into<String>>(source: sqlx::Error, context: S) -> Self {
        Self::Database { source, context: context.into() }
    }

    /// Create a secrets error with context
    pub fn secrets<S: Into<String>>(source: SecretsError, context: S) -> Self {
        Self::Secrets { source, context: context.into() }
    }

    /// Create a validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation { message: message.into(), field: None }
    }

    /// Create a validation error with field information
    pub fn validation_field<S: Into<String>, F: Into<String>>(message: S, field: F) -> Self {
        Self::Validation { message: message.into(), field: Some(field.into()) }
    }

    /// Create an authorization error
    pub fn authorization<S: Into<String>>(message: S) -> Self {
        Self::Authorization { message: message.into() }
    }

    /// Create a not found error
    pub fn not_found<R: Into<String>, I: Into<String>>(resource_type: R, id: I) -> Self {
        Self::NotFound { resource_type: resource_type.into(), id: id.into() }
    }

    /// Create a no-current-tenant error
    pub fn no_current_tenant<S: Into<String>>(message: S) -> Self {
        Self::NoCurrentTenant { message: message.into() }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal { message: message.into(), source: None }
    }

    /// True when the error represents a legitimate miss rather than a fault
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this error should be retried
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Database { .. } | Self::Io { .. })
    }
}

// Error conversions for common external error types
impl From<sqlx::Error> for TenantError {
    fn from(error: sqlx::Error) -> Self {
        Self::Database { source: error, context: "Database operation failed".to_string() }
    }
}

impl From<std::io::Error> for TenantError {
    fn from(error: std::io::Error) -> Self {
        Self::Io { source: error, context: "I/O operation failed".to_string() }
    }
}

impl From<serde_json::Error> for TenantError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization { source: error, context: "JSON serialization failed".to_string() }
    }
}

impl From<SecretsError> for TenantError {
    fn from(error: SecretsError) -> Self {
        Self::Secrets { source: error, context: "Secrets backend operation failed".to_string() }
    }
}

impl From<validator::ValidationErrors> for TenantError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let message = errors
            .field_errors()
            .iter()
            .map(|(field, field_errors)| {
                let messages: Vec<String> = field_errors
                    .iter()
                    .map(|e| {
                        e.message.as_ref().map_or("Invalid value".to_string(), |m| m.to_string())
                    })
                    .collect();
                format!("{}: {}", field, messages.join(", "))
            })
            .collect::<Vec<_>>()
            .join("; ");

        Self::validation(format!("Validation failed: {}", message))
    }
}
