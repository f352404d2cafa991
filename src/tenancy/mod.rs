//! # Tenant Isolation Core
//!
//! The data-plane isolation subsystem: every tenant gets a dedicated
//! database identity with a rotate-able credential, row-level-security
//! policies as defense in depth, and a resolution path from an inbound unit
//! of work to the correct isolated connection.
//!
//! Components, leaf-first:
//!
//! - [`credentials`] — deterministic principal/secret names and password
//!   generation
//! - [`security`] — principal provisioning, revocation, rotation, RLS
//!   toggles, connection-string decryption, permission validation
//! - [`resolver`] — identifier → tenant descriptor lookups
//! - [`context`] — per-unit-of-work "current tenant" resolution with caching
//! - [`factory`] — per-tenant data-access handles for request-less callers
//! - [`deletion`] — irreversible tenant decommissioning plus the reversible
//!   scheduled-deletion path
//! - [`sweeper`] — periodic credential-rotation sweep

pub mod context;
pub mod credentials;
pub mod deletion;
pub mod factory;
pub mod resolver;
pub mod security;
pub mod sweeper;

#[cfg(test)]
pub(crate) mod testing;

pub use context::{RequestContext, ResolvedTenant, TenantContextService};
pub use credentials::CredentialGenerator;
pub use deletion::{DeletionOutcome, TenantDeletionService};
pub use factory::TenantContextFactory;
pub use resolver::TenantResolver;
pub use security::TenantSecurityService;
pub use sweeper::{RotationSweeper, SweepReport};
