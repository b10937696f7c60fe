//! Changeset: the plan turning current records into desired records
//!
//! ## Algorithm
//!
//! 1. Records present (by equality, ids ignored) on both sides are
//!    *unchanged* and drop out.
//! 2. The rest of each side is grouped by [`Record::key()`] (`type,fqdn`).
//! 3. Within a key, both groups are sorted by `(rdata_txt, ttl)` and zipped
//!    positionally, padding the shorter group:
//!    - `(None, after)` is an addition
//!    - `(before, None)` is a removal
//!    - `(before, after)` is an update of `before`'s provider id
//!
//! Positional pairing is a heuristic for multi-value names (three A records
//! on one host): it does not look for a minimal edit matching, and can plan
//! an update where a stricter diff would plan an add and a remove. Sorting
//! first makes the pairing, and therefore the plan, reproducible.
//!
//! The diff itself is pure; only [`Changeset::apply()`] talks to the
//! provider.

use crate::error::Result;
use crate::provider::apply_changeset;
use crate::record::Record;
use crate::retry::RetryPolicy;
use crate::traits::Provider;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// Kind of a [`Change`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// Create a record
    Addition,
    /// Delete a record
    Removal,
    /// Replace a record in place
    Update,
}

/// One step of a changeset
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    /// Create `0`
    Addition(Record),
    /// Delete `0`
    Removal(Record),
    /// Replace `before` (by its provider id) with `after`
    Update {
        /// Current record, carrying the provider id
        before: Record,
        /// Desired replacement
        after: Record,
    },
}

impl Change {
    /// Kind of this change
    pub fn kind(&self) -> ChangeKind {
        match self {
            Change::Addition(_) => ChangeKind::Addition,
            Change::Removal(_) => ChangeKind::Removal,
            Change::Update { .. } => ChangeKind::Update,
        }
    }

    /// The record the provider acts on
    ///
    /// The added record, the removed record, or the replacement of an
    /// update.
    pub fn record(&self) -> &Record {
        match self {
            Change::Addition(record) | Change::Removal(record) => record,
            Change::Update { after, .. } => after,
        }
    }

    /// Provider id of the current record this change touches
    pub fn id(&self) -> Option<&str> {
        match self {
            Change::Addition(_) => None,
            Change::Removal(record) => record.id(),
            Change::Update { before, .. } => before.id(),
        }
    }

    /// Current side of the change, if any
    pub fn before(&self) -> Option<&Record> {
        match self {
            Change::Addition(_) => None,
            Change::Removal(record) => Some(record),
            Change::Update { before, .. } => Some(before),
        }
    }

    /// Desired side of the change, if any
    pub fn after(&self) -> Option<&Record> {
        match self {
            Change::Addition(record) => Some(record),
            Change::Removal(_) => None,
            Change::Update { after, .. } => Some(after),
        }
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Change::Addition(record) => write!(f, "+ {}", record),
            Change::Removal(record) => write!(f, "- {}", record),
            Change::Update { before, after } => write!(f, "~ {} => {}", before, after),
        }
    }
}

/// Result of diffing two record sets
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diff {
    /// Records present on both sides (current side, with ids)
    pub unchanged: Vec<Record>,
    /// Records to create
    pub additions: Vec<Change>,
    /// Records to delete
    pub removals: Vec<Change>,
    /// Records to replace
    pub updates: Vec<Change>,
}

fn dedup(records: Vec<Record>) -> Vec<Record> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|record| seen.insert(record.clone()))
        .collect()
}

fn group_by_key<'a>(records: impl Iterator<Item = &'a Record>) -> BTreeMap<String, Vec<Record>> {
    let mut groups: BTreeMap<String, Vec<Record>> = BTreeMap::new();
    for record in records {
        groups.entry(record.key()).or_default().push(record.clone());
    }
    for group in groups.values_mut() {
        group.sort_by_cached_key(|record| (record.rdata_txt(), record.ttl()));
    }
    groups
}

/// Diff `current` against `desired`
///
/// Both inputs are treated as sets: duplicates collapse onto their first
/// occurrence.
pub fn diff(current: &[Record], desired: &[Record]) -> Diff {
    let current_set: HashSet<&Record> = current.iter().collect();
    let desired_set: HashSet<&Record> = desired.iter().collect();

    let mut result = Diff {
        unchanged: dedup(
            current
                .iter()
                .filter(|record| desired_set.contains(record))
                .cloned()
                .collect(),
        ),
        ..Diff::default()
    };

    let mut before_groups = group_by_key(
        current
            .iter()
            .filter(|record| !desired_set.contains(record)),
    );
    let mut after_groups = group_by_key(
        desired
            .iter()
            .filter(|record| !current_set.contains(record)),
    );

    let keys: Vec<String> = before_groups
        .keys()
        .chain(after_groups.keys())
        .cloned()
        .collect::<std::collections::BTreeSet<_>>()
        .into_iter()
        .collect();

    for key in keys {
        let mut before = dedup(before_groups.remove(&key).unwrap_or_default()).into_iter();
        let mut after = dedup(after_groups.remove(&key).unwrap_or_default()).into_iter();

        loop {
            match (before.next(), after.next()) {
                (None, None) => break,
                (None, Some(after)) => result.additions.push(Change::Addition(after)),
                (Some(before), None) => result.removals.push(Change::Removal(before)),
                (Some(before), Some(after)) => {
                    result.updates.push(Change::Update { before, after })
                }
            }
        }
    }

    result
}

/// Plan for one zone on one provider
#[derive(Clone)]
pub struct Changeset {
    zone: String,
    provider: Arc<dyn Provider>,
    current: Vec<Record>,
    desired: Vec<Record>,
    diff: Diff,
}

impl fmt::Debug for Changeset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Changeset")
            .field("zone", &self.zone)
            .field("provider", &self.provider.name())
            .field("additions", &self.diff.additions.len())
            .field("removals", &self.diff.removals.len())
            .field("updates", &self.diff.updates.len())
            .finish()
    }
}

impl Changeset {
    /// Diff `current` against `desired` for `zone` on `provider`
    pub fn new(
        current: Vec<Record>,
        desired: Vec<Record>,
        zone: impl Into<String>,
        provider: Arc<dyn Provider>,
    ) -> Self {
        let current = dedup(current);
        let desired = dedup(desired);
        let diff = diff(&current, &desired);

        Self {
            zone: zone.into(),
            provider,
            current,
            desired,
            diff,
        }
    }

    /// Zone this changeset applies to
    pub fn zone(&self) -> &str {
        &self.zone
    }

    /// Provider this changeset applies to
    pub fn provider(&self) -> &Arc<dyn Provider> {
        &self.provider
    }

    /// Current records (as fetched, after ignore filtering)
    pub fn current(&self) -> &[Record] {
        &self.current
    }

    /// Desired records
    pub fn desired(&self) -> &[Record] {
        &self.desired
    }

    /// Records identical on both sides
    pub fn unchanged(&self) -> &[Record] {
        &self.diff.unchanged
    }

    /// Planned additions
    pub fn additions(&self) -> &[Change] {
        &self.diff.additions
    }

    /// Planned removals
    pub fn removals(&self) -> &[Change] {
        &self.diff.removals
    }

    /// Planned updates
    pub fn updates(&self) -> &[Change] {
        &self.diff.updates
    }

    /// Every change in application order: updates, removals, additions
    pub fn changes(&self) -> impl Iterator<Item = &Change> {
        self.diff
            .updates
            .iter()
            .chain(self.diff.removals.iter())
            .chain(self.diff.additions.iter())
    }

    /// Whether there is nothing to do
    pub fn is_empty(&self) -> bool {
        self.diff.additions.is_empty() && self.diff.removals.is_empty() && self.diff.updates.is_empty()
    }

    /// Replay this changeset against its provider
    pub async fn apply(&self, policy: &RetryPolicy) -> Result<()> {
        apply_changeset(self, policy).await
    }
}
