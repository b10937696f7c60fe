// # Provider Trait
//
// Defines the interface between the reconciliation core and a DNS vendor.
//
// ## Implementations
//
// - In-memory: `zonesync_core::provider::MemoryProvider`
// - Cloudflare: `zonesync-provider-cloudflare` crate
//
// ## Usage
//
// ```rust,ignore
// use zonesync_core::{Provider, RetryPolicy};
//
// let provider: Arc<dyn Provider> = /* Provider implementation */;
// let changeset = zone.changeset(provider, &RetryPolicy::default()).await?;
// changeset.apply(&RetryPolicy::default()).await?;
// ```

use crate::error::Result;
use crate::record::{Record, RecordType};
use async_trait::async_trait;
use std::collections::BTreeSet;

/// Trait for DNS provider implementations
///
/// A provider fetches the live records of a zone and applies single
/// changes to them. It translates between [`Record`] and the vendor's wire
/// format and nothing more.
///
/// # Thread Safety
///
/// Implementations must be thread-safe: the zone scan calls
/// [`retrieve_current_records()`](Self::retrieve_current_records) from one
/// task per zone concurrently.
///
/// # Responsibilities
///
/// Providers **must**:
/// - Perform one remote call per method invocation (plus pagination)
/// - Classify failures: timeouts, connection resets, unparseable bodies and
///   throttling map to the transient [`Error`](crate::Error) variants so the
///   core can retry them
/// - Map authentication failures, unknown ids and unsupported types to the
///   matching protocol variants
///
/// Providers **must not**:
/// - Retry or sleep (owned by [`RetryPolicy`](crate::retry::RetryPolicy))
/// - Decide what to change (owned by [`Changeset`](crate::Changeset))
/// - Reorder or batch changes on their own, unless they advertise
///   [`batches_writes()`](Self::batches_writes) and commit in
///   [`publish()`](Self::publish)
#[async_trait]
pub trait Provider: Send + Sync {
    /// Provider name (for logging and error messages)
    fn name(&self) -> &'static str;

    /// Fetch every record currently served for `zone`
    ///
    /// Returned records carry their provider id.
    async fn retrieve_current_records(&self, zone: &str) -> Result<Vec<Record>>;

    /// Create `record` in `zone`
    async fn add(&self, record: &Record, zone: &str) -> Result<()>;

    /// Delete `record` (identified by its provider id) from `zone`
    async fn remove(&self, record: &Record, zone: &str) -> Result<()>;

    /// Replace the record identified by `id` with `record`
    async fn update(&self, id: &str, record: &Record, zone: &str) -> Result<()>;

    /// Names of the zones this provider serves for the account
    async fn zones(&self) -> Result<Vec<String>>;

    /// Whether the provider locks zones against manual edits
    ///
    /// When true, [`thaw_zone()`](Self::thaw_zone) is called before and
    /// [`freeze_zone()`](Self::freeze_zone) after every apply.
    fn supports_locking(&self) -> bool {
        false
    }

    /// Lock `zone` against edits
    async fn freeze_zone(&self, _zone: &str) -> Result<()> {
        Ok(())
    }

    /// Unlock `zone` for edits
    async fn thaw_zone(&self, _zone: &str) -> Result<()> {
        Ok(())
    }

    /// Whether writes are staged and only take effect on [`publish()`](Self::publish)
    fn batches_writes(&self) -> bool {
        false
    }

    /// Commit staged writes for `zone`
    async fn publish(&self, _zone: &str) -> Result<()> {
        Ok(())
    }

    /// Drop staged writes for `zone`
    async fn discard(&self, _zone: &str) -> Result<()> {
        Ok(())
    }

    /// Record types the provider can store
    fn record_types(&self) -> BTreeSet<RecordType>;

    /// Whether the provider serves ALIAS records natively
    fn supports_alias(&self) -> bool {
        self.record_types().contains(&RecordType::Alias)
    }
}
