//! Cloudflare provider validation
//!
//! Exercises the Cloudflare provider against a real account.
//!
//! Environment:
//! - `CLOUDFLARE_API_TOKEN` (required)
//! - `CLOUDFLARE_ACCOUNT_ID` (optional, limits zone listing)
//! - `ZONESYNC_ZONE` (required, e.g. `example.com`)
//! - `ZONESYNC_MODE` (`dry-run` by default, `live` adds then removes a TXT record)

use std::env;
use std::process::ExitCode;
use std::sync::Arc;
use zonesync_core::record::{Record, RecordData};
use zonesync_core::traits::Provider;
use zonesync_core::{Changeset, RetryConfig, RetryPolicy};
use zonesync_provider_cloudflare::CloudflareProvider;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt().with_target(false).init();

    let (Ok(api_token), Ok(zone)) = (env::var("CLOUDFLARE_API_TOKEN"), env::var("ZONESYNC_ZONE"))
    else {
        tracing::error!("CLOUDFLARE_API_TOKEN and ZONESYNC_ZONE must be set");
        return ExitCode::FAILURE;
    };
    let zone = zonesync_core::record::to_fqdn(&zone);
    let account_id = env::var("CLOUDFLARE_ACCOUNT_ID").ok();
    let live = env::var("ZONESYNC_MODE").is_ok_and(|mode| mode.eq_ignore_ascii_case("live"));

    if live {
        tracing::warn!("Running in LIVE mode, a TXT record will be created and removed");
    } else {
        tracing::warn!("Running in DRY-RUN mode, no changes will be made");
    }

    match validate(api_token, account_id, &zone, live).await {
        Ok(()) => {
            tracing::info!("validation complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("validation failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn validate(
    api_token: String,
    account_id: Option<String>,
    zone: &str,
    live: bool,
) -> zonesync_core::Result<()> {
    let provider: Arc<dyn Provider> = Arc::new(CloudflareProvider::new(api_token, account_id)?);
    let policy = RetryPolicy::new(&RetryConfig::default());

    tracing::info!("--- Step 1: listing zones ---");
    let zones = policy.run("list zones", || provider.zones()).await?;
    for name in &zones {
        tracing::info!("  {}", name);
    }
    if !zones.iter().any(|name| name == zone) {
        return Err(zonesync_core::Error::not_found(
            provider.name(),
            format!("zone {} is not visible to this token", zone),
        ));
    }

    tracing::info!("--- Step 2: retrieving {} ---", zone);
    let current = policy
        .run("retrieve records", || provider.retrieve_current_records(zone))
        .await?;
    for record in &current {
        tracing::info!("  {}", record);
    }

    tracing::info!("--- Step 3: diffing against itself ---");
    let noop = Changeset::new(current.clone(), current.clone(), zone, provider.clone());
    if !noop.is_empty() {
        tracing::warn!("live records do not diff cleanly against themselves");
    }

    if !live {
        return Ok(());
    }

    tracing::info!("--- Step 4: add and remove a probe record ---");
    let probe = Record::new(
        format!("_zonesync-probe.{}", zone),
        120,
        RecordData::Txt {
            txtdata: "zonesync validation".to_string(),
        },
    );
    let mut desired = current.clone();
    desired.push(probe);
    Changeset::new(current.clone(), desired.clone(), zone, provider.clone())
        .apply(&policy)
        .await?;

    let with_probe = policy
        .run("retrieve records", || provider.retrieve_current_records(zone))
        .await?;
    Changeset::new(with_probe, current, zone, provider.clone())
        .apply(&policy)
        .await?;

    Ok(())
}
