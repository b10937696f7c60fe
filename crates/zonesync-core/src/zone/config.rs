//! Per-zone configuration

use crate::error::{Error, Result};
use crate::ignore::IgnorePattern;
use crate::registry::ProviderRegistry;
use serde::Deserialize;

/// Configuration attached to one zone
///
/// ```json
/// {
///   "providers": ["cloudflare"],
///   "ignore_patterns": [{ "type": "NS", "fqdn": "example.com." }],
///   "supports_alias": false,
///   "implicit_records_templates": ["mail"]
/// }
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ZoneConfig {
    /// Provider identifiers, in order; a zone may be served redundantly
    #[serde(default)]
    pub providers: Vec<String>,

    /// Records matching any of these are left alone
    #[serde(default)]
    pub ignore_patterns: Vec<IgnorePattern>,

    /// Explicit ALIAS support override
    #[serde(default)]
    pub supports_alias: Option<bool>,

    /// Names of implicit-record templates, expanded outside the core
    #[serde(default)]
    pub implicit_records_templates: Vec<String>,
}

impl ZoneConfig {
    /// Config served by `providers` with no ignore patterns
    pub fn new<I, S>(providers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            providers: providers.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Add an ignore pattern
    pub fn with_ignore_pattern(mut self, pattern: IgnorePattern) -> Self {
        self.ignore_patterns.push(pattern);
        self
    }

    /// Force ALIAS support on or off
    pub fn with_alias_override(mut self, supports_alias: bool) -> Self {
        self.supports_alias = Some(supports_alias);
        self
    }

    /// Check that the zone has providers and that all of them are registered
    pub fn validate(&self, registry: &ProviderRegistry) -> Result<()> {
        if self.providers.is_empty() {
            return Err(Error::config("at least one provider must be configured"));
        }

        for name in &self.providers {
            if !registry.has_provider(name) {
                return Err(Error::config(format!(
                    "provider {} is not registered (known: {})",
                    name,
                    registry.list_providers().join(", ")
                )));
            }
        }

        Ok(())
    }

    /// Whether ALIAS records may be used in this zone
    ///
    /// The explicit override wins. Otherwise every configured provider must
    /// serve ALIAS natively; an empty or unresolvable provider list yields
    /// `false`.
    pub fn supports_alias(&self, registry: &ProviderRegistry) -> bool {
        if let Some(supports_alias) = self.supports_alias {
            return supports_alias;
        }

        !self.providers.is_empty()
            && self.providers.iter().all(|name| {
                registry
                    .get(name)
                    .map(|provider| provider.supports_alias())
                    .unwrap_or(false)
            })
    }
}
