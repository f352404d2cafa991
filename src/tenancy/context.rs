//! Per-unit-of-work tenant resolution.
//!
//! A [`RequestContext`] carries the three identification signals an inbound
//! unit of work can present, in priority order: an explicit tenant header, a
//! tenant claim from an authenticated token, and the request host whose
//! subdomain may name a tenant. The context is passed explicitly; there is
//! no ambient "current tenant" state, so concurrent units of work cannot
//! observe each other's resolution. The first successful resolution is
//! memoized on the context, so every later read within the same unit of
//! work observes the same tenant even if the registry changes mid-flight.

use std::sync::{Arc, OnceLock};
use tracing::{debug, instrument, warn};

use crate::domain::{StoredConnectionString, Tenant, TenantId};
use crate::errors::{Result, TenantError};
use crate::secrets::{SecretStore, SecretString};
use crate::tenancy::resolver::TenantResolver;
use crate::tenancy::security::decrypt_connection_string;

/// Identification signals extracted from an inbound unit of work.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Value of the explicit tenant header (`X-Tenant-ID`), if present.
    pub header: Option<String>,
    /// Tenant identifier claim from an authenticated token, if present.
    pub claim: Option<String>,
    /// Request host, for subdomain-based resolution.
    pub host: Option<String>,
    /// Memoized resolution for the remainder of this unit of work.
    resolved: OnceLock<ResolvedTenant>,
}

impl RequestContext {
    pub fn with_header(mut self, value: impl Into<String>) -> Self {
        self.header = Some(value.into());
        self
    }

    pub fn with_claim(mut self, value: impl Into<String>) -> Self {
        self.claim = Some(value.into());
        self
    }

    pub fn with_host(mut self, value: impl Into<String>) -> Self {
        self.host = Some(value.into());
        self
    }
}

/// Which signal produced a resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionSource {
    Header,
    Claim,
    Subdomain,
}

/// A successfully resolved tenant together with its resolution provenance.
#[derive(Debug, Clone)]
pub struct ResolvedTenant {
    pub tenant: Tenant,
    pub source: ResolutionSource,
}

impl ResolvedTenant {
    pub fn id(&self) -> TenantId {
        self.tenant.id
    }
}

/// Resolves request contexts to tenants and their connection strings.
pub struct TenantContextService {
    resolver: Arc<TenantResolver>,
    store: Arc<SecretStore>,
}

impl TenantContextService {
    pub fn new(resolver: Arc<TenantResolver>, store: Arc<SecretStore>) -> Self {
        Self { resolver, store }
    }

    pub fn resolver(&self) -> &TenantResolver {
        &self.resolver
    }

    /// Resolve the current tenant for a unit of work.
    ///
    /// The first successful resolution is memoized on the context and
    /// returned as-is for every later call. Signals are tried strictly in
    /// priority order; a signal that is present but resolves to nothing
    /// falls through to the next one. Inactive tenants never resolve (the
    /// resolver filters them), so a suspended tenant's header or domain
    /// behaves like an unknown one.
    #[instrument(skip(self, ctx))]
    pub async fn resolve(&self, ctx: &RequestContext) -> Result<ResolvedTenant> {
        if let Some(resolved) = ctx.resolved.get() {
            return Ok(resolved.clone());
        }

        if let Some(value) = ctx.header.as_deref() {
            if let Some(tenant) = self.lookup_identifier(value).await? {
                return Ok(self.admit(ctx, tenant, ResolutionSource::Header));
            }
            debug!(identifier = %value, "Tenant header did not resolve; trying next signal");
        }

        if let Some(value) = ctx.claim.as_deref() {
            if let Some(tenant) = self.lookup_identifier(value).await? {
                return Ok(self.admit(ctx, tenant, ResolutionSource::Claim));
            }
            debug!(identifier = %value, "Tenant claim did not resolve; trying next signal");
        }

        if let Some(host) = ctx.host.as_deref() {
            if let Some(subdomain) = extract_subdomain(host) {
                if let Some(tenant) = self.resolver.resolve_by_code(subdomain).await? {
                    return Ok(self.admit(ctx, tenant, ResolutionSource::Subdomain));
                }
                if let Some(tenant) = self.resolver.resolve_by_domain(host).await? {
                    return Ok(self.admit(ctx, tenant, ResolutionSource::Subdomain));
                }
            }
        }

        Err(TenantError::no_current_tenant(
            "No tenant could be resolved from the request context",
        ))
    }

    /// Resolve the current tenant and decrypt its connection string.
    pub async fn current_connection_string(&self, ctx: &RequestContext) -> Result<SecretString> {
        let resolved = self.resolve(ctx).await?;
        self.connection_string_for(&resolved.tenant).await
    }

    /// Id of the current tenant.
    pub async fn current_tenant_id(&self, ctx: &RequestContext) -> Result<TenantId> {
        Ok(self.resolve(ctx).await?.id())
    }

    /// Display name of the current tenant.
    pub async fn current_tenant_name(&self, ctx: &RequestContext) -> Result<String> {
        Ok(self.resolve(ctx).await?.tenant.name)
    }

    /// Pin the context to an explicit tenant, overriding weaker signals.
    ///
    /// Returns `false` (without mutating the context, and without erroring)
    /// when the tenant is unknown or inactive; registry faults still
    /// propagate. A successful pin discards any memoized resolution.
    pub async fn set_current_tenant(
        &self,
        ctx: &mut RequestContext,
        id: TenantId,
    ) -> Result<bool> {
        match self.resolver.resolve_by_id(id).await? {
            Some(_) => {
                ctx.header = Some(id.to_string());
                ctx.resolved = OnceLock::new();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Decrypt a tenant's persisted connection string.
    pub async fn connection_string_for(&self, tenant: &Tenant) -> Result<SecretString> {
        if matches!(tenant.connection_string, StoredConnectionString::Plaintext(_)) {
            warn!(tenant_id = %tenant.id, "Tenant connection string is persisted in plaintext");
        }
        decrypt_connection_string(&self.store, &tenant.connection_string).await
    }

    fn admit(&self, ctx: &RequestContext, tenant: Tenant, source: ResolutionSource) -> ResolvedTenant {
        debug!(tenant_id = %tenant.id, source = ?source, "Tenant resolved");
        let resolved = ResolvedTenant { tenant, source };
        // A concurrent resolution on the same context may already have won;
        // the stored value is authoritative either way.
        let _ = ctx.resolved.set(resolved.clone());
        ctx.resolved.get().cloned().unwrap_or(resolved)
    }

    /// An identifier signal may carry either a tenant id or a tenant code.
    async fn lookup_identifier(&self, value: &str) -> Result<Option<Tenant>> {
        let value = value.trim();
        if value.is_empty() {
            return Ok(None);
        }

        if let Ok(id) = TenantId::parse(value) {
            return self.resolver.resolve_by_id(id).await;
        }
        self.resolver.resolve_by_code(value).await
    }
}

/// Extract the candidate tenant label from a request host.
///
/// Only hosts with at least three DNS labels qualify (`acme.suite.example`
/// yes, `suite.example` no), and numeric or loopback hosts never do.
pub fn extract_subdomain(host: &str) -> Option<&str> {
    let host = host.rsplit_once(':').map_or(host, |(h, port)| {
        // Only strip a real port suffix; IPv6 literals contain colons too.
        if port.chars().all(|c| c.is_ascii_digit()) {
            h
        } else {
            host
        }
    });

    if host.is_empty() || host.starts_with('[') || host.parse::<std::net::IpAddr>().is_ok() {
        return None;
    }
    if host.eq_ignore_ascii_case("localhost") || host.to_lowercase().ends_with(".localhost") {
        return None;
    }

    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() < 3 || labels.iter().any(|l| l.is_empty()) {
        return None;
    }

    Some(labels[0])
}
