//! In-memory [`TenantDirectory`] for unit tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::domain::{StoredConnectionString, Tenant, TenantId};
use crate::errors::{Result, TenantError};
use crate::storage::repositories::CredentialRecord;
use crate::storage::TenantDirectory;

#[derive(Default)]
pub struct InMemoryDirectory {
    tenants: Mutex<HashMap<TenantId, Tenant>>,
    owners: Mutex<HashMap<TenantId, String>>,
    credentials: Mutex<HashMap<TenantId, CredentialRecord>>,
    lookups: AtomicUsize,
}

impl InMemoryDirectory {
    pub fn with_tenant(tenant: Tenant) -> Self {
        let directory = Self::default();
        directory.insert(tenant);
        directory
    }

    pub fn insert(&self, tenant: Tenant) {
        self.tenants.lock().unwrap().insert(tenant.id, tenant);
    }

    pub fn set_owner(&self, id: TenantId, owner: &str) {
        self.owners.lock().unwrap().insert(id, owner.to_string());
    }

    pub fn insert_credential(&self, record: CredentialRecord) {
        self.credentials
            .lock()
            .unwrap()
            .insert(TenantId::from_uuid(record.tenant_id), record);
    }

    pub fn get(&self, id: TenantId) -> Option<Tenant> {
        self.tenants.lock().unwrap().get(&id).cloned()
    }

    pub fn contains(&self, id: TenantId) -> bool {
        self.tenants.lock().unwrap().contains_key(&id)
    }

    /// Number of `find_by_*` calls served so far.
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TenantDirectory for InMemoryDirectory {
    async fn find_by_id(&self, id: TenantId) -> Result<Option<Tenant>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.get(id))
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<Tenant>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .tenants
            .lock()
            .unwrap()
            .values()
            .find(|t| t.code.eq_ignore_ascii_case(code))
            .cloned())
    }

    async fn find_by_domain(&self, domain: &str) -> Result<Option<Tenant>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let needle = domain.to_lowercase();
        Ok(self
            .tenants
            .lock()
            .unwrap()
            .values()
            .find(|t| t.verified_domains().any(|d| d == needle))
            .cloned())
    }

    async fn list_active(&self) -> Result<Vec<Tenant>> {
        let mut tenants: Vec<Tenant> =
            self.tenants.lock().unwrap().values().filter(|t| t.is_active).cloned().collect();
        tenants.sort_by_key(|t| t.created_at);
        Ok(tenants)
    }

    async fn update_connection_string(&self, id: TenantId, wire: &str) -> Result<()> {
        let mut tenants = self.tenants.lock().unwrap();
        let tenant = tenants
            .get_mut(&id)
            .ok_or_else(|| TenantError::not_found("tenant", id.to_string()))?;
        tenant.connection_string = StoredConnectionString::parse(wire);
        Ok(())
    }

    async fn set_active(
        &self,
        id: TenantId,
        active: bool,
        deletion_scheduled_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let mut tenants = self.tenants.lock().unwrap();
        let tenant = tenants
            .get_mut(&id)
            .ok_or_else(|| TenantError::not_found("tenant", id.to_string()))?;
        tenant.is_active = active;
        tenant.deletion_scheduled_at = deletion_scheduled_at;
        Ok(())
    }

    async fn owner_of(&self, id: TenantId) -> Result<Option<String>> {
        Ok(self.owners.lock().unwrap().get(&id).cloned())
    }

    async fn delete_cascade(&self, id: TenantId) -> Result<()> {
        let removed = self.tenants.lock().unwrap().remove(&id);
        self.owners.lock().unwrap().remove(&id);
        self.credentials.lock().unwrap().remove(&id);
        if removed.is_none() {
            return Err(TenantError::not_found("tenant", id.to_string()));
        }
        Ok(())
    }

    async fn upsert_credential_record(
        &self,
        id: TenantId,
        username: &str,
        database: &str,
        rotated_at: DateTime<Utc>,
        rotate_after: DateTime<Utc>,
    ) -> Result<()> {
        self.credentials.lock().unwrap().insert(
            id,
            CredentialRecord {
                tenant_id: *id.as_uuid(),
                username: username.to_string(),
                database_name: database.to_string(),
                rotated_at,
                rotate_after,
            },
        );
        Ok(())
    }

    async fn list_rotation_due(&self, now: DateTime<Utc>) -> Result<Vec<CredentialRecord>> {
        let tenants = self.tenants.lock().unwrap();
        Ok(self
            .credentials
            .lock()
            .unwrap()
            .values()
            .filter(|c| c.rotate_after <= now)
            .filter(|c| {
                tenants
                    .get(&TenantId::from_uuid(c.tenant_id))
                    .map(|t| t.is_active)
                    .unwrap_or(false)
            })
            .cloned()
            .collect())
    }
}
