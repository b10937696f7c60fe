//! Minimal embedding example for zonesync-core
//!
//! This example demonstrates using zonesync-core as a library in a custom
//! application. The application owns the registry, the zones and the retry
//! policy; nothing is read from the environment.

use std::sync::Arc;
use zonesync_core::{
    MemoryProvider, ProviderRegistry, Result, RetryConfig, RetryPolicy, Zone, changed_zones,
};

const ZONES: &str = r#"{
    "example.com": {
        "config": { "providers": ["memory"], "ignore_patterns": [{ "fqdn": "_acme-challenge.example.com." }] },
        "records": [
            { "type": "A", "fqdn": "example.com", "ttl": 300, "address": "192.0.2.10" },
            { "type": "A", "fqdn": "www.example.com", "ttl": 300, "address": "192.0.2.10" },
            { "type": "MX", "fqdn": "example.com", "ttl": 3600, "preference": 10, "exchange": "mail.example.com" },
            { "type": "TXT", "fqdn": "example.com", "ttl": 3600, "txtdata": "v=spf1 mx -all" }
        ]
    },
    "example.org": {
        "config": { "providers": ["memory"] },
        "records": [
            { "type": "CNAME", "fqdn": "www.example.org", "ttl": 300, "cname": "example.com" }
        ]
    }
}"#;

const LIVE: &str = r#"[
    { "type": "A", "fqdn": "example.com", "ttl": 300, "address": "192.0.2.10" },
    { "type": "A", "fqdn": "www.example.com", "ttl": 300, "address": "192.0.2.99" },
    { "type": "TXT", "fqdn": "_acme-challenge.example.com", "ttl": 60, "txtdata": "token" },
    { "type": "CNAME", "fqdn": "old.example.com", "ttl": 300, "cname": "example.com" }
]"#;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_target(false).init();

    let provider = Arc::new(MemoryProvider::new());
    let live: Vec<serde_json::Value> = serde_json::from_str(LIVE)?;
    let live = live
        .iter()
        .map(zonesync_core::Record::from_definition)
        .collect::<Result<Vec<_>>>()?;
    provider.seed("example.com.", live).await;

    let registry = Arc::new(ProviderRegistry::new());
    registry.register("memory", provider.clone());

    let zones = Zone::from_json(ZONES)?;
    for zone in &zones {
        for error in zone.validate(&registry) {
            tracing::error!(zone = zone.name(), "{}", error);
        }
    }
    let zones: Vec<_> = zones
        .into_iter()
        .filter(|zone| zone.is_valid(&registry))
        .map(Arc::new)
        .collect();

    let policy = RetryPolicy::new(&RetryConfig::default());
    let diffs = changed_zones(zones, registry.clone(), policy.clone()).await?;
    tracing::info!("{} zone(s) out of sync", diffs.len());

    for diff in &diffs {
        for changeset in diff.pending() {
            for change in changeset.changes() {
                tracing::info!(zone = changeset.zone(), "{}", change);
            }
            changeset.apply(&policy).await?;
        }
    }

    for line in provider.journal().await {
        println!("{}", line);
    }

    let example_com = provider.records("example.com.").await;
    tracing::info!("example.com. now holds {} record(s)", example_com.len());

    Ok(())
}
