//! Periodic credential-rotation sweep.
//!
//! Tenant passwords carry a rotate-after deadline (90 days from issuance).
//! The sweeper wakes on a fixed interval, asks the registry for credentials
//! past their deadline, and rotates each one in place. A failed rotation is
//! logged and retried on the next sweep; one bad tenant never blocks the
//! rest of the batch.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

use crate::domain::TenantId;
use crate::errors::Result;
use crate::storage::TenantDirectory;
use crate::tenancy::security::TenantSecurityService;

pub struct RotationSweeper {
    directory: Arc<dyn TenantDirectory>,
    security: Arc<TenantSecurityService>,
    interval: Duration,
}

/// Counts from one sweep pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub due: usize,
    pub rotated: usize,
    pub failed: usize,
}

impl RotationSweeper {
    pub fn new(
        directory: Arc<dyn TenantDirectory>,
        security: Arc<TenantSecurityService>,
        interval: Duration,
    ) -> Self {
        Self { directory, security, interval }
    }

    /// Run sweeps until the token is cancelled. A sweep in flight finishes
    /// its current tenant before the loop observes cancellation.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(interval_seconds = self.interval.as_secs(), "Rotation sweeper started");
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Rotation sweeper stopping");
                    return;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.sweep_once().await {
                        error!(error = %e, "Rotation sweep failed; will retry next interval");
                    }
                }
            }
        }
    }

    /// One sweep pass: rotate every credential past its deadline.
    #[instrument(skip(self))]
    pub async fn sweep_once(&self) -> Result<SweepReport> {
        let due = self.directory.list_rotation_due(Utc::now()).await?;
        let mut report = SweepReport { due: due.len(), ..Default::default() };

        if due.is_empty() {
            debug!("No credentials due for rotation");
            return Ok(report);
        }

        for record in due {
            let tenant_id = TenantId::from_uuid(record.tenant_id);
            match self
                .security
                .rotate_tenant_credentials(tenant_id, &record.database_name)
                .await
            {
                Ok(_) => report.rotated += 1,
                Err(e) => {
                    error!(
                        error = %e,
                        tenant_id = %tenant_id,
                        username = %record.username,
                        "Credential rotation failed; will retry next sweep"
                    );
                    report.failed += 1;
                }
            }
        }

        info!(due = report.due, rotated = report.rotated, failed = report.failed, "Rotation sweep finished");
        Ok(report)
    }
}
