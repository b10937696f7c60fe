//! Concurrent "which zones changed" scan
//!
//! Fetching live records is the slow part of a run, so the scan spawns one
//! task per zone. Each task only appends to a shared result list; nothing
//! else is shared between tasks. Applying stays sequential.

use crate::changeset::Changeset;
use crate::error::{Error, Result};
use crate::registry::ProviderRegistry;
use crate::retry::RetryPolicy;
use crate::zone::Zone;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

/// A zone whose live records differ from its definition
#[derive(Debug, Clone)]
pub struct ZoneDiff {
    /// The zone
    pub zone: Arc<Zone>,
    /// One changeset per configured provider, in config order
    pub changesets: Vec<Changeset>,
}

impl ZoneDiff {
    /// Changesets with at least one change
    pub fn pending(&self) -> impl Iterator<Item = &Changeset> {
        self.changesets.iter().filter(|c| !c.is_empty())
    }
}

/// Find the zones whose providers do not serve their desired records
///
/// Every zone is scanned even when one fails; the first failure (in
/// completion order) is returned once all tasks have finished. Zones are
/// returned sorted by name.
pub async fn changed_zones(
    zones: Vec<Arc<Zone>>,
    registry: Arc<ProviderRegistry>,
    policy: RetryPolicy,
) -> Result<Vec<ZoneDiff>> {
    let results = Arc::new(Mutex::new(Vec::new()));
    let mut tasks = JoinSet::new();

    info!("Scanning {} zones", zones.len());

    for zone in zones {
        let results = Arc::clone(&results);
        let registry = Arc::clone(&registry);
        let policy = policy.clone();

        tasks.spawn(async move {
            let changesets = zone.changesets(&registry, &policy).await?;

            if changesets.iter().all(Changeset::is_empty) {
                debug!("{} is up to date", zone.name());
                return Ok(());
            }

            debug!("{} has pending changes", zone.name());
            results.lock().await.push(ZoneDiff { zone, changesets });
            Ok::<(), Error>(())
        });
    }

    let mut first_error = None;
    while let Some(joined) = tasks.join_next().await {
        let outcome = joined.unwrap_or_else(|e| Err(Error::Other(format!("scan task failed: {}", e))));
        if let Err(e) = outcome {
            error!("Zone scan failed: {}", e);
            first_error.get_or_insert(e);
        }
    }

    if let Some(e) = first_error {
        return Err(e);
    }

    let mut diffs = std::mem::take(&mut *results.lock().await);
    diffs.sort_by(|a, b| a.zone.name().cmp(b.zone.name()));
    info!("{} zones have pending changes", diffs.len());
    Ok(diffs)
}
