// # zonesync-core
//
// Reconciliation core for declarative DNS zone management.
//
// ## Architecture Overview
//
// - **Record**: typed DNS resource record with pull-based validation
// - **Zone**: desired records plus config, owning the cross-record rules
// - **Changeset**: diff between live and desired records, and its replay
// - **Provider**: trait every DNS vendor adapter implements
// - **ProviderRegistry**: identifier -> provider lookup table
// - **RetryPolicy**: bounded retry for transient provider failures
// - **scan**: concurrent "which zones changed" check
//
// ## Design Principles
//
// 1. **Separation of Concerns**: the core decides what to change; providers
//    only translate and transport
// 2. **Explicit Configuration**: no environment or global state in the core
// 3. **Plugin-Based**: providers are registered by identifier
// 4. **Accumulated Validation**: every problem in a zone is reported at once
// 5. **Bounded Retries**: every retry budget is finite

pub mod changeset;
pub mod config;
pub mod error;
pub mod ignore;
pub mod provider;
pub mod record;
pub mod registry;
pub mod retry;
pub mod scan;
pub mod traits;
pub mod zone;

// Re-export core types for convenience
pub use changeset::{Change, ChangeKind, Changeset};
pub use config::{RetryConfig, SyncConfig};
pub use error::{Error, Result};
pub use ignore::{IgnorePattern, MatchMode};
pub use provider::{MemoryProvider, apply_changeset};
pub use record::{Record, RecordData, RecordType, ValidationError};
pub use registry::ProviderRegistry;
pub use retry::{RateLimit, RetryPolicy};
pub use scan::{ZoneDiff, changed_zones};
pub use traits::Provider;
pub use zone::{Zone, ZoneConfig, ZoneDefinition};
