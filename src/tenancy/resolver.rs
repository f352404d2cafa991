//! Identifier-to-tenant resolution with a sliding-TTL cache.
//!
//! Resolution is read-heavy and sits on the hot path of every unit of work,
//! so positive lookups are cached. Each hit slides the entry's expiry
//! forward. Inactive tenants resolve to `None` and are never cached, so
//! reactivation becomes visible on the next lookup;
//! [`TenantResolver::invalidate`] evicts every key pointing at a tenant
//! after a registry mutation.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, instrument};

use crate::domain::{Tenant, TenantId};
use crate::errors::Result;
use crate::storage::TenantDirectory;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum CacheKey {
    Id(TenantId),
    Code(String),
    Domain(String),
}

struct CacheEntry {
    tenant: Tenant,
    expires_at: Instant,
}

/// Cached lookups against the tenant registry.
pub struct TenantResolver {
    directory: Arc<dyn TenantDirectory>,
    cache: DashMap<CacheKey, CacheEntry>,
    ttl: Duration,
}

impl TenantResolver {
    pub fn new(directory: Arc<dyn TenantDirectory>, ttl: Duration) -> Self {
        Self { directory, cache: DashMap::new(), ttl }
    }

    /// Resolve a bare identifier: UUID form resolves by id, anything else
    /// first by code, then by verified domain.
    pub async fn resolve(&self, identifier: &str) -> Result<Option<Tenant>> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return Ok(None);
        }

        if let Ok(id) = TenantId::parse(identifier) {
            return self.resolve_by_id(id).await;
        }
        if let Some(tenant) = self.resolve_by_code(identifier).await? {
            return Ok(Some(tenant));
        }
        self.resolve_by_domain(identifier).await
    }

    /// Resolve by tenant id.
    #[instrument(skip(self), fields(tenant_id = %id))]
    pub async fn resolve_by_id(&self, id: TenantId) -> Result<Option<Tenant>> {
        if let Some(tenant) = self.cache_get(&CacheKey::Id(id)) {
            return Ok(Some(tenant));
        }

        let tenant = self.directory.find_by_id(id).await?;
        Ok(self.cache_put(CacheKey::Id(id), tenant))
    }

    /// Resolve by short tenant code (case-insensitive).
    #[instrument(skip(self))]
    pub async fn resolve_by_code(&self, code: &str) -> Result<Option<Tenant>> {
        let key = CacheKey::Code(code.to_lowercase());
        if let Some(tenant) = self.cache_get(&key) {
            return Ok(Some(tenant));
        }

        let tenant = self.directory.find_by_code(code).await?;
        Ok(self.cache_put(key, tenant))
    }

    /// Resolve by a verified domain (case-insensitive).
    #[instrument(skip(self))]
    pub async fn resolve_by_domain(&self, domain: &str) -> Result<Option<Tenant>> {
        let key = CacheKey::Domain(domain.to_lowercase());
        if let Some(tenant) = self.cache_get(&key) {
            return Ok(Some(tenant));
        }

        let tenant = self.directory.find_by_domain(domain).await?;
        Ok(self.cache_put(key, tenant))
    }

    /// Evict every cache entry resolving to the given tenant. Call after any
    /// registry mutation (rotation, deactivation, deletion) so stale
    /// descriptors never outlive the TTL in the mutated direction.
    pub fn invalidate(&self, id: TenantId) {
        self.cache.retain(|_, entry| entry.tenant.id != id);
        debug!(tenant_id = %id, "Resolution cache invalidated");
    }

    /// Number of live cache entries (expired entries may still be counted).
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    fn cache_get(&self, key: &CacheKey) -> Option<Tenant> {
        let mut entry = self.cache.get_mut(key)?;
        if entry.expires_at < Instant::now() {
            drop(entry);
            self.cache.remove(key);
            return None;
        }

        // Sliding expiry: hot tenants stay cached.
        entry.expires_at = Instant::now() + self.ttl;
        Some(entry.tenant.clone())
    }

    /// Cache a fresh lookup result. Misses pass through, and inactive
    /// tenants are dropped to `None` so a deactivated tenant never resolves.
    fn cache_put(&self, key: CacheKey, tenant: Option<Tenant>) -> Option<Tenant> {
        let tenant = tenant.filter(Tenant::is_resolvable);
        if let Some(tenant) = &tenant {
            self.cache.insert(
                key,
                CacheEntry { tenant: tenant.clone(), expires_at: Instant::now() + self.ttl },
            );
        }
        tenant
    }
}
