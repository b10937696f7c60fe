//! Provider registry
//!
//! Zone configurations name their providers by identifier. The registry is
//! the lookup table turning those identifiers into provider instances; it is
//! built once at startup and passed to everything that resolves providers.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use zonesync_core::registry::ProviderRegistry;
//!
//! let registry = ProviderRegistry::new();
//! registry.register("cloudflare", Arc::new(cloudflare_provider));
//!
//! let provider = registry.get("cloudflare")?;
//! ```
//!
//! ## Registration
//!
//! Provider crates expose a `register()` helper:
//!
//! ```rust,ignore
//! // In zonesync-provider-cloudflare
//! pub fn register(registry: &ProviderRegistry, provider: CloudflareProvider) {
//!     registry.register("cloudflare", Arc::new(provider));
//! }
//! ```

use crate::error::{Error, Result};
use crate::traits::Provider;
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Lookup table from provider identifier to provider instance
///
/// ## Thread Safety
///
/// The registry uses interior mutability with RwLock, allowing concurrent
/// reads and exclusive writes.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: RwLock<BTreeMap<String, Arc<dyn Provider>>>,
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.list_providers())
            .finish()
    }
}

impl ProviderRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider under `name`, replacing any previous one
    ///
    /// # Parameters
    ///
    /// - `name`: Identifier zone configs use (e.g., "cloudflare")
    /// - `provider`: Provider instance
    pub fn register(&self, name: impl Into<String>, provider: Arc<dyn Provider>) {
        let mut providers = self
            .providers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        providers.insert(name.into(), provider);
    }

    /// Resolve a provider identifier
    ///
    /// # Returns
    ///
    /// - `Ok(Arc<dyn Provider>)`: The registered provider
    /// - `Err(Error::UnknownProvider)`: If nothing is registered under `name`
    pub fn get(&self, name: &str) -> Result<Arc<dyn Provider>> {
        let providers = self
            .providers
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        providers
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownProvider(name.to_string()))
    }

    /// Check if a provider identifier is registered
    pub fn has_provider(&self, name: &str) -> bool {
        let providers = self
            .providers
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        providers.contains_key(name)
    }

    /// List all registered provider identifiers, sorted
    pub fn list_providers(&self) -> Vec<String> {
        let providers = self
            .providers
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        providers.keys().cloned().collect()
    }
}
