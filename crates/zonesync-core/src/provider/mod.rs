//! Provider-side helpers
//!
//! - [`MemoryProvider`]: in-memory [`Provider`](crate::Provider)
//! - [`apply_changeset()`]: the write protocol every apply goes through
//!
//! ## Apply protocol
//!
//! ```text
//! thaw (if locking)
//!   -> updates, removals, additions (one call each, retried)
//!   -> publish (if batching)
//!   on failure: discard (if batching)
//! freeze (if locking, always)
//! ```
//!
//! The first failure is returned once cleanup has run. Cleanup failures are
//! logged; a failed freeze after an otherwise successful apply is returned.

pub mod memory;

pub use memory::MemoryProvider;

use crate::changeset::{Change, Changeset};
use crate::error::{Error, Result};
use crate::retry::RetryPolicy;
use crate::traits::Provider;
use tracing::{debug, error, info, warn};

async fn apply_change(
    provider: &dyn Provider,
    zone: &str,
    change: &Change,
    policy: &RetryPolicy,
) -> Result<()> {
    let description = format!("{} on {}", change, provider.name());
    debug!("Applying {}", description);

    match change {
        Change::Addition(record) => {
            policy
                .run(&description, || provider.add(record, zone))
                .await
        }
        Change::Removal(record) => {
            policy
                .run(&description, || provider.remove(record, zone))
                .await
        }
        Change::Update { before, after } => {
            let id = before
                .id()
                .ok_or_else(|| Error::MissingRecordId(before.to_string()))?;
            policy
                .run(&description, || provider.update(id, after, zone))
                .await
        }
    }
}

async fn replay(provider: &dyn Provider, changeset: &Changeset, policy: &RetryPolicy) -> Result<()> {
    let zone = changeset.zone();

    for change in changeset.changes() {
        apply_change(provider, zone, change, policy).await?;
    }

    if provider.batches_writes() {
        policy
            .run(&format!("publish {} on {}", zone, provider.name()), || {
                provider.publish(zone)
            })
            .await?;
    }

    Ok(())
}

/// Replay `changeset` against its provider
///
/// Changes are sent one at a time in [`Changeset::changes()`] order, each
/// through `policy`. An empty changeset still goes through thaw/freeze.
pub async fn apply_changeset(changeset: &Changeset, policy: &RetryPolicy) -> Result<()> {
    let provider = changeset.provider().as_ref();
    let zone = changeset.zone();

    info!(
        "Applying {} to {} on {}: {} updates, {} removals, {} additions",
        if changeset.is_empty() { "empty changeset" } else { "changeset" },
        zone,
        provider.name(),
        changeset.updates().len(),
        changeset.removals().len(),
        changeset.additions().len()
    );

    let thawed = if provider.supports_locking() {
        policy
            .run(&format!("thaw {} on {}", zone, provider.name()), || {
                provider.thaw_zone(zone)
            })
            .await
    } else {
        Ok(())
    };

    // Nothing is replayed into a zone that stayed locked, but it is still frozen
    let result = match thawed {
        Ok(()) => replay(provider, changeset, policy).await,
        Err(e) => Err(e),
    };

    if let Err(e) = &result {
        error!("Applying changes to {} on {} failed: {}", zone, provider.name(), e);

        if provider.batches_writes() {
            if let Err(discard_error) = provider.discard(zone).await {
                warn!(
                    "Failed to discard staged changes for {} on {}: {}",
                    zone,
                    provider.name(),
                    discard_error
                );
            }
        }
    }

    if provider.supports_locking() {
        let frozen = policy
            .run(&format!("freeze {} on {}", zone, provider.name()), || {
                provider.freeze_zone(zone)
            })
            .await;

        if let Err(freeze_error) = frozen {
            if result.is_ok() {
                return Err(freeze_error);
            }
            warn!(
                "Failed to freeze {} on {} after error: {}",
                zone,
                provider.name(),
                freeze_error
            );
        }
    }

    if result.is_ok() {
        info!("Applied changes to {} on {}", zone, provider.name());
    }
    result
}
