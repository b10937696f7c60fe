// # Memory Provider
//
// In-memory implementation of the Provider trait.
//
// ## Purpose
//
// Serves zones from a HashMap instead of a vendor API. Useful for tests,
// embedding, and dry runs against a snapshot of a real provider.
//
// ## Behavior
//
// - Ids are assigned on insertion (`mem-1`, `mem-2`, ...)
// - `update` checks that the id exists and that the replacement keeps the
//   fqdn and type of the record it replaces
// - Record types outside the configured set are rejected on `add`
// - Every successful mutation is appended to an operation journal

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::record::{Record, RecordType};
use crate::traits::Provider;

const NAME: &str = "memory";

#[derive(Debug, Default)]
struct State {
    zones: HashMap<String, Vec<Record>>,
    journal: Vec<String>,
}

/// In-memory provider implementation
///
/// Cloning shares the underlying zones.
///
/// # Example
///
/// ```rust,no_run
/// use zonesync_core::provider::MemoryProvider;
/// use zonesync_core::record::{Record, RecordData};
/// use zonesync_core::Provider;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let provider = MemoryProvider::new();
///     let record = Record::new("www.example.com.", 60, RecordData::A {
///         address: "10.0.0.1".to_string(),
///     });
///
///     provider.add(&record, "example.com.").await?;
///
///     let records = provider.retrieve_current_records("example.com.").await?;
///     assert_eq!(records, vec![record]);
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct MemoryProvider {
    inner: Arc<RwLock<State>>,
    next_id: Arc<AtomicU64>,
    record_types: BTreeSet<RecordType>,
}

impl MemoryProvider {
    /// Create an empty provider supporting every type except ALIAS
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(State::default())),
            next_id: Arc::new(AtomicU64::new(1)),
            record_types: RecordType::ALL
                .into_iter()
                .filter(|t| *t != RecordType::Alias)
                .collect(),
        }
    }

    /// Restrict or extend the supported record types
    pub fn with_record_types(mut self, record_types: impl IntoIterator<Item = RecordType>) -> Self {
        self.record_types = record_types.into_iter().collect();
        self
    }

    /// Also serve ALIAS records
    pub fn with_alias_support(mut self) -> Self {
        self.record_types.insert(RecordType::Alias);
        self
    }

    fn assign_id(&self) -> String {
        format!("mem-{}", self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    /// Replace the contents of `zone`, assigning fresh ids
    pub async fn seed(&self, zone: &str, records: impl IntoIterator<Item = Record>) {
        let records = records
            .into_iter()
            .map(|record| record.with_id(self.assign_id()))
            .collect();
        let mut guard = self.inner.write().await;
        guard.zones.insert(zone.to_string(), records);
    }

    /// Records currently stored for `zone`
    pub async fn records(&self, zone: &str) -> Vec<Record> {
        let guard = self.inner.read().await;
        guard.zones.get(zone).cloned().unwrap_or_default()
    }

    /// Mutations applied so far, oldest first
    pub async fn journal(&self) -> Vec<String> {
        self.inner.read().await.journal.clone()
    }
}

impl Default for MemoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Provider for MemoryProvider {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn retrieve_current_records(&self, zone: &str) -> Result<Vec<Record>> {
        Ok(self.records(zone).await)
    }

    async fn add(&self, record: &Record, zone: &str) -> Result<()> {
        if !self.record_types.contains(&record.record_type()) {
            return Err(Error::unsupported(NAME, record.record_type().as_str()));
        }

        let stored = record.with_id(self.assign_id());
        let mut guard = self.inner.write().await;
        guard.journal.push(format!("add {}", stored));
        guard.zones.entry(zone.to_string()).or_default().push(stored);
        Ok(())
    }

    async fn remove(&self, record: &Record, zone: &str) -> Result<()> {
        let mut guard = self.inner.write().await;
        let records = guard.zones.entry(zone.to_string()).or_default();

        let position = match record.id() {
            Some(id) => records.iter().position(|r| r.id() == Some(id)),
            None => records.iter().position(|r| r == record),
        }
        .ok_or_else(|| Error::not_found(NAME, record.to_string()))?;

        let removed = records.remove(position);
        guard.journal.push(format!("remove {}", removed));
        Ok(())
    }

    async fn update(&self, id: &str, record: &Record, zone: &str) -> Result<()> {
        let mut guard = self.inner.write().await;
        let records = guard.zones.entry(zone.to_string()).or_default();

        let existing = records
            .iter_mut()
            .find(|r| r.id() == Some(id))
            .ok_or_else(|| Error::not_found(NAME, format!("no record with id {}", id)))?;

        if existing.fqdn() != record.fqdn() || existing.record_type() != record.record_type() {
            return Err(Error::mismatch(
                NAME,
                format!("{} cannot become {}", existing, record),
            ));
        }

        *existing = record.with_id(id);
        let line = format!("update {} {}", id, existing);
        guard.journal.push(line);
        Ok(())
    }

    async fn zones(&self) -> Result<Vec<String>> {
        let guard = self.inner.read().await;
        let mut zones: Vec<String> = guard.zones.keys().cloned().collect();
        zones.sort();
        Ok(zones)
    }

    fn record_types(&self) -> BTreeSet<RecordType> {
        self.record_types.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordData;

    const ZONE: &str = "example.com.";

    fn a(fqdn: &str, address: &str) -> Record {
        Record::new(
            fqdn,
            60,
            RecordData::A {
                address: address.to_string(),
            },
        )
    }

    #[tokio::test]
    async fn test_add_assigns_ids() {
        let provider = MemoryProvider::new();
        provider.add(&a("www.example.com.", "10.0.0.1"), ZONE).await.unwrap();
        provider.add(&a("www.example.com.", "10.0.0.2"), ZONE).await.unwrap();

        let records = provider.retrieve_current_records(ZONE).await.unwrap();
        let ids: Vec<_> = records.iter().map(|r| r.id().unwrap().to_string()).collect();
        assert_eq!(ids, vec!["mem-1", "mem-2"]);
        assert_eq!(provider.zones().await.unwrap(), vec![ZONE.to_string()]);
    }

    #[tokio::test]
    async fn test_update_checks_id_and_identity() {
        let provider = MemoryProvider::new();
        provider.seed(ZONE, [a("www.example.com.", "10.0.0.1")]).await;

        let missing = provider
            .update("mem-99", &a("www.example.com.", "10.0.0.2"), ZONE)
            .await;
        assert!(matches!(missing, Err(Error::RecordNotFound { .. })));

        let renamed = provider
            .update("mem-1", &a("api.example.com.", "10.0.0.2"), ZONE)
            .await;
        assert!(matches!(renamed, Err(Error::RecordMismatch { .. })));

        provider
            .update("mem-1", &a("www.example.com.", "10.0.0.2"), ZONE)
            .await
            .unwrap();
        let records = provider.records(ZONE).await;
        assert_eq!(records, vec![a("www.example.com.", "10.0.0.2")]);
        assert_eq!(records[0].id(), Some("mem-1"));
    }

    #[tokio::test]
    async fn test_remove_by_id() {
        let provider = MemoryProvider::new();
        provider
            .seed(ZONE, [a("www.example.com.", "10.0.0.1"), a("www.example.com.", "10.0.0.2")])
            .await;

        let current = provider.records(ZONE).await;
        provider.remove(&current[1], ZONE).await.unwrap();

        assert_eq!(provider.records(ZONE).await, vec![a("www.example.com.", "10.0.0.1")]);
        assert_eq!(provider.journal().await.len(), 1);
    }

    #[tokio::test]
    async fn test_unsupported_types_are_rejected() {
        let provider = MemoryProvider::new();
        let alias = Record::new(
            ZONE,
            60,
            RecordData::Alias {
                alias: "lb.example.net.".to_string(),
            },
        );

        let result = provider.add(&alias, ZONE).await;
        assert!(matches!(result, Err(Error::UnsupportedRecordType { .. })));
        assert!(!provider.supports_alias());
        assert!(provider.clone().with_alias_support().supports_alias());
    }
}
