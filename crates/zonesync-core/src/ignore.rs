//! Ignore patterns
//!
//! Providers inject records nobody declared (apex NS sets, SOA-adjacent
//! records, verification TXT records...). An [`IgnorePattern`] removes such
//! records from both sides of the comparison.
//!
//! A pattern is a JSON object of record attributes. Every attribute must
//! match for the record to be ignored. With `"match": "regex"` the values
//! are regular expressions searched in the attribute's text; otherwise
//! (`"exact"`, the default) they are compared for equality.
//!
//! ```json
//! { "type": "NS", "fqdn": "example.com." }
//! { "type": "TXT", "txtdata": "^google-site-verification=", "match": "regex" }
//! ```

use crate::error::{Error, Result};
use crate::record::Record;
use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// How pattern values are compared against record attributes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchMode {
    /// String equality
    #[default]
    Exact,
    /// Regular expression search
    Regex,
}

#[derive(Debug, Clone)]
enum Matcher {
    Exact(String),
    Regex(Regex),
}

impl Matcher {
    fn matches(&self, value: &str) -> bool {
        match self {
            Matcher::Exact(expected) => expected == value,
            Matcher::Regex(regex) => regex.is_match(value),
        }
    }
}

/// Predicate over record attributes
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "Map<String, Value>")]
pub struct IgnorePattern {
    mode: MatchMode,
    fields: BTreeMap<String, Matcher>,
}

impl IgnorePattern {
    /// Build a pattern from attribute/value pairs
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when `match` is neither `exact` nor `regex`,
    /// a value is not a scalar, or a regex does not compile.
    pub fn new(pattern: Map<String, Value>) -> Result<Self> {
        let mode = match pattern.get("match") {
            None => MatchMode::Exact,
            Some(Value::String(mode)) if mode == "exact" => MatchMode::Exact,
            Some(Value::String(mode)) if mode == "regex" => MatchMode::Regex,
            Some(other) => {
                return Err(Error::config(format!(
                    "ignore pattern match mode must be \"exact\" or \"regex\", got {}",
                    other
                )));
            }
        };

        let mut fields = BTreeMap::new();
        for (key, value) in pattern.into_iter().filter(|(key, _)| key != "match") {
            let text = match value {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                other => {
                    return Err(Error::config(format!(
                        "ignore pattern value for {} must be a scalar, got {}",
                        key, other
                    )));
                }
            };

            let matcher = match mode {
                MatchMode::Exact => Matcher::Exact(text),
                MatchMode::Regex => Matcher::Regex(Regex::new(&text).map_err(|e| {
                    Error::config(format!("invalid ignore pattern regex for {}: {}", key, e))
                })?),
            };
            fields.insert(key, matcher);
        }

        Ok(Self { mode, fields })
    }

    /// Comparison mode of this pattern
    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    /// Whether `record` matches every attribute of the pattern
    pub fn ignores(&self, record: &Record) -> bool {
        self.fields.iter().all(|(attribute, matcher)| {
            record
                .attribute(attribute)
                .is_some_and(|value| matcher.matches(&value))
        })
    }
}

impl TryFrom<Map<String, Value>> for IgnorePattern {
    type Error = Error;

    fn try_from(pattern: Map<String, Value>) -> Result<Self> {
        Self::new(pattern)
    }
}

/// Drop every record matched by any of `patterns`
pub fn filter_ignored(records: &[Record], patterns: &[IgnorePattern]) -> Vec<Record> {
    records
        .iter()
        .filter(|record| !patterns.iter().any(|pattern| pattern.ignores(record)))
        .cloned()
        .collect()
}
