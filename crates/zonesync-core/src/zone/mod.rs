//! Zone aggregate
//!
//! A [`Zone`] is a domain's desired records plus its [`ZoneConfig`]. It
//! owns the rules that span records (duplicates, CNAME exclusivity, TTL
//! consistency, provider capabilities) and produces one
//! [`Changeset`] per configured provider.
//!
//! ## Validation order
//!
//! [`Zone::validate()`] accumulates every violation, in this order:
//!
//! 1. zone name
//! 2. each record, and that it lives inside the zone
//! 3. config
//! 4. duplicate records
//! 5. A record TTL consistency per name
//! 6. CNAME exclusivity, no CNAME at the apex
//! 7. ALIAS only at the apex
//! 8. record types supported by every provider (skipped if 3 failed)

pub mod config;

pub use config::ZoneConfig;

use crate::changeset::Changeset;
use crate::error::Result;
use crate::ignore::filter_ignored;
use crate::record::validation::is_valid_fqdn;
use crate::record::{Record, RecordType, ValidationError, to_fqdn};
use crate::registry::ProviderRegistry;
use crate::retry::RetryPolicy;
use crate::traits::Provider;
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, OnceLock};
use tracing::debug;

/// Types allowed next to a CNAME at the same name (DNSSEC material)
pub const CNAME_COMPANION_TYPES: [&str; 7] = ["RRSIG", "NSEC", "NSEC3", "DNSKEY", "KEY", "SIG", "NXT"];

/// Serialized form of a zone: config plus raw record definitions
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ZoneDefinition {
    /// Zone configuration
    #[serde(default)]
    pub config: ZoneConfig,

    /// Record definitions, see [`Record::from_definition()`]
    #[serde(default)]
    pub records: Vec<Value>,
}

/// A DNS zone and its desired records
#[derive(Debug)]
pub struct Zone {
    name: String,
    config: ZoneConfig,
    records: Vec<Record>,
    filtered: OnceLock<Vec<Record>>,
}

impl Zone {
    /// Create a zone; `name` is dot-terminated and lowercased
    pub fn new(name: impl AsRef<str>, config: ZoneConfig, records: Vec<Record>) -> Self {
        let name = name.as_ref().trim();
        Self {
            name: if name.is_empty() {
                String::new()
            } else {
                to_fqdn(name)
            },
            config,
            records,
            filtered: OnceLock::new(),
        }
    }

    /// Build a zone from its serialized definition
    ///
    /// # Errors
    ///
    /// Fails on the first record definition that cannot be shaped into a
    /// record.
    pub fn from_definition(name: impl AsRef<str>, definition: ZoneDefinition) -> Result<Self> {
        let records = definition
            .records
            .iter()
            .map(Record::from_definition)
            .collect::<Result<Vec<_>>>()?;

        Ok(Self::new(name, definition.config, records))
    }

    /// Parse a `{ "<zone>": { "config": ..., "records": [...] } }` document
    ///
    /// Zones come back sorted by name.
    pub fn from_json(json: &str) -> Result<Vec<Self>> {
        let definitions: BTreeMap<String, ZoneDefinition> = serde_json::from_str(json)?;
        definitions
            .into_iter()
            .map(|(name, definition)| Self::from_definition(name, definition))
            .collect()
    }

    /// Dot-terminated zone name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Zone name without the trailing dot
    pub fn unrooted_name(&self) -> &str {
        self.name.strip_suffix('.').unwrap_or(&self.name)
    }

    /// Zone configuration
    pub fn config(&self) -> &ZoneConfig {
        &self.config
    }

    /// Replace the configuration, invalidating the filtered record view
    pub fn set_config(&mut self, config: ZoneConfig) {
        self.config = config;
        self.filtered = OnceLock::new();
    }

    /// Every declared record, ignore patterns not applied
    pub fn all_records(&self) -> &[Record] {
        &self.records
    }

    /// Declared records minus those matched by an ignore pattern
    pub fn records(&self) -> &[Record] {
        self.filtered
            .get_or_init(|| filter_ignored(&self.records, &self.config.ignore_patterns))
    }

    /// Diff the live records on `provider` against this zone
    ///
    /// The fetch goes through `policy`; fetched records are filtered with
    /// the zone's ignore patterns before diffing.
    pub async fn changeset(
        &self,
        provider: Arc<dyn Provider>,
        policy: &RetryPolicy,
    ) -> Result<Changeset> {
        let description = format!("fetch {} from {}", self.name, provider.name());
        let current = policy
            .run(&description, || provider.retrieve_current_records(&self.name))
            .await?;
        let current = filter_ignored(&current, &self.config.ignore_patterns);

        let changeset = Changeset::new(current, self.records().to_vec(), &self.name, provider);
        debug!(
            "{} on {}: {} updates, {} removals, {} additions",
            self.name,
            changeset.provider().name(),
            changeset.updates().len(),
            changeset.removals().len(),
            changeset.additions().len()
        );
        Ok(changeset)
    }

    /// One changeset per configured provider, in config order
    pub async fn changesets(
        &self,
        registry: &ProviderRegistry,
        policy: &RetryPolicy,
    ) -> Result<Vec<Changeset>> {
        let mut changesets = Vec::with_capacity(self.config.providers.len());
        for name in &self.config.providers {
            let provider = registry.get(name)?;
            changesets.push(self.changeset(provider, policy).await?);
        }
        Ok(changesets)
    }

    /// Whether every provider already serves exactly the desired records
    pub async fn unchanged(&self, registry: &ProviderRegistry, policy: &RetryPolicy) -> Result<bool> {
        Ok(self
            .changesets(registry, policy)
            .await?
            .iter()
            .all(Changeset::is_empty))
    }

    /// Whether [`validate()`](Self::validate) finds nothing
    pub fn is_valid(&self, registry: &ProviderRegistry) -> bool {
        self.validate(registry).is_empty()
    }

    /// Run every zone rule, accumulating violations
    pub fn validate(&self, registry: &ProviderRegistry) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        self.validate_name(&mut errors);
        self.validate_records(&mut errors);

        let config_valid = match self.config.validate(registry) {
            Ok(()) => true,
            Err(e) => {
                errors.push(ValidationError::new("config", e.to_string()));
                false
            }
        };

        self.validate_duplicates(&mut errors);
        self.validate_a_ttls(&mut errors);
        self.validate_cnames(&mut errors);
        self.validate_aliases(&mut errors);

        if config_valid {
            self.validate_record_types(registry, &mut errors);
        }

        errors
    }

    fn validate_name(&self, errors: &mut Vec<ValidationError>) {
        if self.name.is_empty() {
            errors.push(ValidationError::new("name", "can't be blank"));
        } else if !is_valid_fqdn(&self.name) {
            errors.push(ValidationError::new(
                "name",
                format!("{} is not a valid FQDN", self.name),
            ));
        }
    }

    fn contains(&self, fqdn: &str) -> bool {
        fqdn == self.name || fqdn.ends_with(&format!(".{}", self.name))
    }

    fn validate_records(&self, errors: &mut Vec<ValidationError>) {
        for record in &self.records {
            for error in record.validate() {
                errors.push(ValidationError::new("records", format!("{} {}", record, error)));
            }

            if !self.name.is_empty() && !self.contains(record.fqdn()) {
                errors.push(ValidationError::new(
                    "records",
                    format!("{} is not within {}", record, self.name),
                ));
            }
        }
    }

    fn validate_duplicates(&self, errors: &mut Vec<ValidationError>) {
        let mut counts: HashMap<&Record, usize> = HashMap::new();
        for record in &self.records {
            *counts.entry(record).or_default() += 1;
        }

        let mut reported = BTreeSet::new();
        for record in &self.records {
            if counts[record] > 1 && reported.insert(record.to_string()) {
                errors.push(ValidationError::new(
                    "records",
                    format!("Duplicate record {}", record),
                ));
            }
        }
    }

    fn validate_a_ttls(&self, errors: &mut Vec<ValidationError>) {
        let mut ttls: BTreeMap<&str, BTreeSet<i64>> = BTreeMap::new();
        for record in self.records.iter().filter(|r| r.record_type() == RecordType::A) {
            ttls.entry(record.fqdn()).or_default().insert(record.ttl());
        }

        for (fqdn, ttls) in ttls {
            if ttls.len() > 1 {
                errors.push(ValidationError::new(
                    "records",
                    format!("All A records for {} should have the same TTL", fqdn),
                ));
            }
        }
    }

    fn validate_cnames(&self, errors: &mut Vec<ValidationError>) {
        let mut by_name: BTreeMap<&str, Vec<&Record>> = BTreeMap::new();
        for record in &self.records {
            by_name.entry(record.fqdn()).or_default().push(record);
        }

        for (fqdn, records) in by_name {
            let cnames = records
                .iter()
                .filter(|r| r.record_type() == RecordType::Cname)
                .count();
            if cnames == 0 {
                continue;
            }

            if cnames > 1 {
                errors.push(ValidationError::new(
                    "records",
                    format!("Multiple CNAME records for {}", fqdn),
                ));
            }

            let others = records.iter().any(|r| {
                r.record_type() != RecordType::Cname
                    && !CNAME_COMPANION_TYPES.contains(&r.record_type().as_str())
            });
            if others {
                errors.push(ValidationError::new(
                    "records",
                    format!("{} has a CNAME record and other records", fqdn),
                ));
            }

            if fqdn == self.name {
                errors.push(ValidationError::new(
                    "records",
                    format!("CNAME records are not allowed at the zone apex {}", fqdn),
                ));
            }
        }
    }

    fn validate_aliases(&self, errors: &mut Vec<ValidationError>) {
        for record in &self.records {
            if record.record_type() == RecordType::Alias && record.fqdn() != self.name {
                errors.push(ValidationError::new(
                    "records",
                    format!("ALIAS records are only allowed at the zone apex, not {}", record.fqdn()),
                ));
            }
        }
    }

    fn validate_record_types(&self, registry: &ProviderRegistry, errors: &mut Vec<ValidationError>) {
        let used: BTreeSet<RecordType> = self.records.iter().map(Record::record_type).collect();
        let alias = self.config.supports_alias(registry);

        for name in &self.config.providers {
            let Ok(provider) = registry.get(name) else {
                continue;
            };

            let mut supported = provider.record_types();
            supported.remove(&RecordType::Alias);
            if alias {
                supported.insert(RecordType::Alias);
            }

            for record_type in used.difference(&supported) {
                errors.push(ValidationError::new(
                    "records",
                    format!("{} is not a supported record type in {}", record_type, name),
                ));
            }
        }
    }
}
