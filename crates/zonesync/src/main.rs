// # zonesync - declarative DNS zone reconciliation
//
// This binary is a THIN integration layer: it reads configuration from the
// environment, registers providers, loads zone definitions and hands them
// to zonesync-core. Diffing, validation and retry logic all live in the
// core.
//
// A run:
// 1. Loads the zone-definition file
// 2. Validates every zone (all problems are reported, then the run stops)
// 3. Scans all zones concurrently for pending changes
// 4. Logs the plan
// 5. In apply mode, refuses changesets over the removal limit, then
//    applies the rest one zone at a time
//
// ## Configuration
//
// - `ZONESYNC_ZONES_PATH`: Path to the JSON zone-definition file (required)
// - `ZONESYNC_MODE`: `plan` (default) or `apply`
// - `ZONESYNC_MAX_REMOVALS`: Largest number of removals one changeset may
//   apply (default 20)
// - `ZONESYNC_LOG_LEVEL`: trace, debug, info (default), warn, error
// - `CLOUDFLARE_API_TOKEN`: Enables the `cloudflare` provider
// - `CLOUDFLARE_ACCOUNT_ID`: Restricts Cloudflare zone listing (optional)
//
// ## Example
//
// ```bash
// export ZONESYNC_ZONES_PATH=/etc/zonesync/zones.json
// export ZONESYNC_MODE=apply
// export CLOUDFLARE_API_TOKEN=your_token
//
// zonesync
// ```

use anyhow::{Context, Result};
use std::env;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;
use zonesync_core::{ProviderRegistry, RetryPolicy, SyncConfig, Zone, ZoneDiff, changed_zones};

/// Exit codes for different termination scenarios
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ZonesyncExitCode {
    /// Run completed
    Success = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Provider or I/O failure during the run
    RuntimeError = 2,
    /// Zone definitions failed validation, or a changeset hit the removal limit
    Rejected = 3,
}

impl From<ZonesyncExitCode> for ExitCode {
    fn from(code: ZonesyncExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// What to do with pending changes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Only report pending changes
    Plan,
    /// Report and apply pending changes
    Apply,
}

impl FromStr for Mode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "plan" => Ok(Mode::Plan),
            "apply" => Ok(Mode::Apply),
            other => anyhow::bail!(
                "ZONESYNC_MODE '{}' is not valid. Valid modes: plan, apply",
                other
            ),
        }
    }
}

/// Application configuration
///
/// No Debug impl: it carries the API token.
struct Config {
    zones_path: PathBuf,
    mode: Mode,
    sync: SyncConfig,
    log_level: String,
    cloudflare_api_token: Option<String>,
    cloudflare_account_id: Option<String>,
}

/// Errors that reject a run without anything having failed
#[derive(Debug)]
struct Rejected(String);

impl std::fmt::Display for Rejected {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for Rejected {}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key/value source
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let zones_path = lookup("ZONESYNC_ZONES_PATH")
            .filter(|s| !s.trim().is_empty())
            .context(
                "ZONESYNC_ZONES_PATH is required. \
                Set it via: export ZONESYNC_ZONES_PATH=/etc/zonesync/zones.json",
            )?;

        let mode = match lookup("ZONESYNC_MODE") {
            Some(mode) => mode.parse()?,
            None => Mode::Plan,
        };

        let mut sync = SyncConfig::new();
        if let Some(max_removals) = lookup("ZONESYNC_MAX_REMOVALS") {
            sync.max_removals = max_removals.trim().parse().with_context(|| {
                format!(
                    "ZONESYNC_MAX_REMOVALS must be a non-negative integer. Got: {}",
                    max_removals
                )
            })?;
        }

        Ok(Self {
            zones_path: PathBuf::from(zones_path),
            mode,
            sync,
            log_level: lookup("ZONESYNC_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            cloudflare_api_token: lookup("CLOUDFLARE_API_TOKEN").filter(|t| !t.is_empty()),
            cloudflare_account_id: lookup("CLOUDFLARE_ACCOUNT_ID").filter(|a| !a.is_empty()),
        })
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        if !self.zones_path.is_file() {
            anyhow::bail!(
                "ZONESYNC_ZONES_PATH does not point to a file: {}",
                self.zones_path.display()
            );
        }

        self.sync.validate()?;
        self.level()?;
        Ok(())
    }

    fn level(&self) -> Result<Level> {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Ok(Level::TRACE),
            "debug" => Ok(Level::DEBUG),
            "info" => Ok(Level::INFO),
            "warn" => Ok(Level::WARN),
            "error" => Ok(Level::ERROR),
            _ => anyhow::bail!(
                "ZONESYNC_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }
    }
}

/// Read and parse the zone-definition file
fn load_zones(path: &Path) -> Result<Vec<Zone>> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let zones = Zone::from_json(&json)
        .with_context(|| format!("Failed to load zone definitions from {}", path.display()))?;
    Ok(zones)
}

/// Validate every zone, logging each problem
fn validate_zones(zones: &[Zone], registry: &ProviderRegistry) -> Result<()> {
    let mut invalid = 0;

    for zone in zones {
        let errors = zone.validate(registry);
        if errors.is_empty() {
            continue;
        }

        invalid += 1;
        for e in errors {
            error!("{}: {}", zone.name(), e);
        }
    }

    if invalid > 0 {
        return Err(Rejected(format!("{} of {} zones are invalid", invalid, zones.len())).into());
    }
    Ok(())
}

/// Refuse the run if any changeset removes more records than allowed
fn check_removal_limit(diffs: &[ZoneDiff], max_removals: usize) -> Result<()> {
    let mut over = Vec::new();

    for diff in diffs {
        for changeset in diff.pending() {
            let removals = changeset.removals().len();
            if removals > max_removals {
                over.push(format!(
                    "{} on {} ({} removals)",
                    changeset.zone(),
                    changeset.provider().name(),
                    removals
                ));
            }
        }
    }

    if !over.is_empty() {
        return Err(Rejected(format!(
            "Refusing to remove more than {} records per changeset: {}",
            max_removals,
            over.join(", ")
        ))
        .into());
    }
    Ok(())
}

fn log_plan(diffs: &[ZoneDiff]) {
    if diffs.is_empty() {
        info!("All zones are up to date");
        return;
    }

    for diff in diffs {
        for changeset in diff.pending() {
            info!(
                "{} on {}: {} updates, {} removals, {} additions",
                changeset.zone(),
                changeset.provider().name(),
                changeset.updates().len(),
                changeset.removals().len(),
                changeset.additions().len()
            );
            for change in changeset.changes() {
                info!("  {}", change);
            }
        }
    }
}

fn register_providers(config: &Config, registry: &ProviderRegistry) -> Result<()> {
    #[cfg(feature = "cloudflare")]
    {
        match &config.cloudflare_api_token {
            Some(token) => {
                info!("Registering Cloudflare provider");
                let provider = zonesync_provider_cloudflare::CloudflareProvider::new(
                    token.clone(),
                    config.cloudflare_account_id.clone(),
                )?;
                zonesync_provider_cloudflare::register(registry, provider);
            }
            None => warn!("CLOUDFLARE_API_TOKEN is not set, cloudflare provider disabled"),
        }
    }

    #[cfg(not(feature = "cloudflare"))]
    let _ = (config, registry);

    Ok(())
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return ZonesyncExitCode::ConfigError.into();
        }
    };

    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return ZonesyncExitCode::ConfigError.into();
    }

    // Initialize tracing
    let log_level = config.level().unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return ZonesyncExitCode::ConfigError.into();
    }

    info!("Starting zonesync ({:?} mode)", config.mode);

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return ZonesyncExitCode::RuntimeError.into();
        }
    };

    let code = match rt.block_on(run(config)) {
        Ok(()) => ZonesyncExitCode::Success,
        Err(e) if e.downcast_ref::<Rejected>().is_some() => {
            error!("{:#}", e);
            ZonesyncExitCode::Rejected
        }
        Err(e) => {
            error!("Run failed: {:#}", e);
            ZonesyncExitCode::RuntimeError
        }
    };

    code.into()
}

/// Run one reconciliation pass
async fn run(config: Config) -> Result<()> {
    let registry = Arc::new(ProviderRegistry::new());
    register_providers(&config, &registry)?;

    let zones = load_zones(&config.zones_path)?;
    info!("Loaded {} zones from {}", zones.len(), config.zones_path.display());

    validate_zones(&zones, &registry)?;

    let policy = RetryPolicy::new(&config.sync.retry);
    let zones: Vec<Arc<Zone>> = zones.into_iter().map(Arc::new).collect();
    let diffs = changed_zones(zones, registry, policy.clone()).await?;

    log_plan(&diffs);

    if config.mode == Mode::Plan || diffs.is_empty() {
        return Ok(());
    }

    check_removal_limit(&diffs, config.sync.max_removals)?;

    for diff in &diffs {
        for changeset in diff.pending() {
            changeset.apply(&policy).await?;
        }
    }

    info!("Applied changes to {} zones", diffs.len());
    Ok(())
}
