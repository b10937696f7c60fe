// # Cloudflare DNS Provider
//
// Cloudflare implementation of the zonesync `Provider` trait.
//
// ## Scope
//
// - Translates `Record` values to and from Cloudflare's JSON records
// - Record calls resolve the zone id first (GET `/zones?name=...`), so each
//   one is two requests (more when listing pages); the core retries the
//   whole call as one unit
// - Classifies failures so the core can retry the transient ones:
//   timeouts, connection failures, unparseable bodies and 429 responses
// - NO retry, backoff or sleeping (owned by `RetryPolicy` in the core)
// - NO diffing or ordering decisions (owned by `Changeset`)
//
// ## Security Requirements
//
// - API token NEVER appears in logs or Debug output
// - Provider construction fails if the token is empty
//
// ## API Reference
//
// - Cloudflare API v4: https://developers.cloudflare.com/api/
// - List Zones: GET `/zones?name=...`
// - List DNS Records: GET `/zones/:zone_id/dns_records?page=..&per_page=..`
// - Create DNS Record: POST `/zones/:zone_id/dns_records`
// - Update DNS Record: PUT `/zones/:zone_id/dns_records/:record_id`
// - Delete DNS Record: DELETE `/zones/:zone_id/dns_records/:record_id`

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use zonesync_core::record::{Record, RecordData, RecordType, to_fqdn};
use zonesync_core::registry::ProviderRegistry;
use zonesync_core::retry::RateLimit;
use zonesync_core::{Error, Provider, Result};

/// Provider identifier used in zone configs
pub const PROVIDER_NAME: &str = "cloudflare";

/// Cloudflare API base URL
const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Records fetched per page
const RECORDS_PER_PAGE: u32 = 100;

/// Zones fetched per page (API maximum)
const ZONES_PER_PAGE: u32 = 50;

/// Wait assumed when a 429 carries no usable rate-limit headers
const FALLBACK_RATE_LIMIT_WAIT: Duration = Duration::from_secs(60);

/// Record types Cloudflare stores
pub const SUPPORTED_TYPES: [RecordType; 10] = [
    RecordType::A,
    RecordType::Aaaa,
    RecordType::Caa,
    RecordType::Cname,
    RecordType::Mx,
    RecordType::Ns,
    RecordType::Ptr,
    RecordType::Srv,
    RecordType::Sshfp,
    RecordType::Txt,
];

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct ResultInfo {
    #[serde(default)]
    total_pages: u32,
}

/// Envelope around every Cloudflare API v4 response
#[derive(Debug, Deserialize)]
struct ApiResponse {
    success: bool,
    #[serde(default)]
    errors: Vec<ApiMessage>,
    #[serde(default)]
    result: Value,
    #[serde(default)]
    result_info: Option<ResultInfo>,
}

fn describe_errors(errors: &[ApiMessage]) -> String {
    if errors.is_empty() {
        return "no error details".to_string();
    }
    errors
        .iter()
        .map(|e| format!("{} (code {})", e.message, e.code))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Cloudflare DNS provider
///
/// Zone ids are looked up by name on every call; nothing is cached
/// between calls.
///
/// # Security
///
/// The Debug implementation intentionally does NOT expose the API token.
pub struct CloudflareProvider {
    /// Cloudflare API token
    /// ⚠️ NEVER log this value
    api_token: String,

    /// Restrict zone listing to one account
    account_id: Option<String>,

    /// API base URL
    base_url: String,

    /// HTTP client for API requests
    client: reqwest::Client,
}

// Custom Debug implementation that hides the API token
impl std::fmt::Debug for CloudflareProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareProvider")
            .field("api_token", &"<REDACTED>")
            .field("account_id", &self.account_id)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl CloudflareProvider {
    /// Create a new Cloudflare provider
    ///
    /// # Parameters
    ///
    /// - `api_token`: Cloudflare API token with Zone:DNS:Edit permissions
    /// - `account_id`: Optional account id restricting [`Provider::zones()`]
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the token is empty or the HTTP client
    /// cannot be built.
    pub fn new(api_token: impl Into<String>, account_id: Option<String>) -> Result<Self> {
        let api_token = api_token.into();
        if api_token.trim().is_empty() {
            return Err(Error::config("Cloudflare API token cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            api_token,
            account_id,
            base_url: CLOUDFLARE_API_BASE.to_string(),
            client,
        })
    }

    /// Point the provider at another API endpoint
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Send one API request and unwrap the response envelope
    async fn request(&self, method: Method, path: &str, body: Option<Value>) -> Result<ApiResponse> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!("{} {}", method, url);

        let mut request = self
            .client
            .request(method, &url)
            .bearer_auth(&self.api_token)
            .header("Content-Type", "application/json");
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        let headers = response.headers().clone();
        let text = response.text().await.map_err(transport_error)?;

        if !status.is_success() {
            return Err(status_error(status, &headers, &text));
        }

        let envelope: ApiResponse = serde_json::from_str(&text).map_err(|e| {
            Error::unparseable(PROVIDER_NAME, format!("{} returned invalid JSON: {}", url, e))
        })?;

        if !envelope.success {
            return Err(Error::provider(
                PROVIDER_NAME,
                format!("{} failed: {}", url, describe_errors(&envelope.errors)),
            ));
        }

        Ok(envelope)
    }

    /// Look up the zone id for a zone name
    ///
    /// # API Call
    ///
    /// ```http
    /// GET /zones?name=example.com
    /// Authorization: Bearer <token>
    /// ```
    async fn zone_id(&self, zone: &str) -> Result<String> {
        let name = api_name(zone);
        let response = self
            .request(Method::GET, &format!("/zones?name={}", name), None)
            .await?;

        let id = response
            .result
            .as_array()
            .and_then(|zones| zones.first())
            .and_then(|zone| zone["id"].as_str())
            .ok_or_else(|| Error::not_found(PROVIDER_NAME, format!("Zone not found: {}", name)))?;

        tracing::debug!("Found zone ID for {}", name);
        Ok(id.to_string())
    }
}

/// Map a transport-level failure to the matching transient class
fn transport_error(error: reqwest::Error) -> Error {
    if error.is_timeout() {
        Error::timeout(PROVIDER_NAME, error.to_string())
    } else if error.is_decode() {
        Error::unparseable(PROVIDER_NAME, error.to_string())
    } else if error.is_connect() || error.is_request() || error.is_body() {
        Error::connection_reset(PROVIDER_NAME, error.to_string())
    } else {
        Error::provider(PROVIDER_NAME, format!("HTTP request failed: {}", error))
    }
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Map a non-2xx response to an error
fn status_error(status: StatusCode, headers: &HeaderMap, body: &str) -> Error {
    let details = serde_json::from_str::<ApiResponse>(body)
        .map(|r| describe_errors(&r.errors))
        .unwrap_or_else(|_| body.chars().take(200).collect());

    match status.as_u16() {
        401 | 403 => Error::auth(
            PROVIDER_NAME,
            format!(
                "Invalid API token or insufficient permissions. Status: {}",
                status
            ),
        ),
        404 => Error::not_found(PROVIDER_NAME, details),
        429 => {
            let limit = RateLimit::from_headers(
                header(headers, "x-ratelimit-remaining"),
                header(headers, "x-ratelimit-reset"),
                header(headers, "retry-after"),
                Utc::now(),
            )
            .unwrap_or_else(|| RateLimit::new(0, FALLBACK_RATE_LIMIT_WAIT));
            Error::rate_limited(PROVIDER_NAME, limit)
        }
        // Cloudflare's edge answers 5xx with HTML error pages
        500..=599 => Error::unparseable(
            PROVIDER_NAME,
            format!("Cloudflare server error {}: {}", status, details),
        ),
        _ => Error::provider(PROVIDER_NAME, format!("{}: {}", status, details)),
    }
}

/// Cloudflare names carry no trailing dot
fn api_name(fqdn: &str) -> &str {
    fqdn.strip_suffix('.').unwrap_or(fqdn)
}

fn malformed(value: &Value, what: &str) -> Error {
    Error::provider(
        PROVIDER_NAME,
        format!("malformed DNS record ({}): {}", what, value),
    )
}

fn str_field<'a>(value: &'a Value, key: &str) -> Result<&'a str> {
    value[key].as_str().ok_or_else(|| malformed(value, key))
}

fn int_field(value: &Value, key: &str) -> Result<i64> {
    value[key].as_i64().ok_or_else(|| malformed(value, key))
}

/// Translate a Cloudflare DNS record into a [`Record`]
///
/// Returns `Ok(None)` for record types zonesync does not manage.
pub fn record_from_api(value: &Value) -> Result<Option<Record>> {
    let record_type = str_field(value, "type")?;
    let Ok(record_type) = record_type.parse::<RecordType>() else {
        tracing::debug!("Skipping unmanaged record type {}", record_type);
        return Ok(None);
    };
    if !SUPPORTED_TYPES.contains(&record_type) {
        return Ok(None);
    }

    let name = str_field(value, "name")?;
    let ttl = int_field(value, "ttl")?;
    let content = || str_field(value, "content").map(str::to_string);
    let data = &value["data"];

    let rdata = match record_type {
        RecordType::A => RecordData::A { address: content()? },
        RecordType::Aaaa => RecordData::Aaaa { address: content()? },
        RecordType::Cname => RecordData::Cname { cname: content()? },
        RecordType::Ns => RecordData::Ns { nsdname: content()? },
        RecordType::Ptr => RecordData::Ptr { ptrdname: content()? },
        RecordType::Txt => RecordData::Txt { txtdata: content()? },
        RecordType::Mx => RecordData::Mx {
            preference: int_field(value, "priority")?,
            exchange: content()?,
        },
        RecordType::Srv => RecordData::Srv {
            priority: int_field(data, "priority")?,
            weight: int_field(data, "weight")?,
            port: int_field(data, "port")?,
            target: str_field(data, "target")?.to_string(),
        },
        RecordType::Caa => RecordData::Caa {
            flags: int_field(data, "flags")?,
            tag: str_field(data, "tag")?.to_string(),
            value: str_field(data, "value")?.to_string(),
        },
        RecordType::Sshfp => RecordData::Sshfp {
            algorithm: int_field(data, "algorithm")?,
            fptype: int_field(data, "type")?,
            fingerprint: str_field(data, "fingerprint")?.to_string(),
        },
        RecordType::Alias | RecordType::Spf => return Ok(None),
    };

    let record = Record::new(to_fqdn(name), ttl, rdata);
    Ok(Some(match value["id"].as_str() {
        Some(id) => record.with_id(id),
        None => record,
    }))
}

/// Translate a [`Record`] into a Cloudflare create/update payload
pub fn record_to_api(record: &Record) -> Result<Value> {
    let mut payload = json!({
        "type": record.record_type().as_str(),
        "name": api_name(record.fqdn()),
        "ttl": record.ttl(),
    });

    let fields = match record.data() {
        RecordData::A { address } | RecordData::Aaaa { address } => json!({ "content": address }),
        RecordData::Cname { cname } => json!({ "content": api_name(cname) }),
        RecordData::Ns { nsdname } => json!({ "content": api_name(nsdname) }),
        RecordData::Ptr { ptrdname } => json!({ "content": api_name(ptrdname) }),
        RecordData::Txt { txtdata } => json!({ "content": txtdata }),
        RecordData::Mx {
            preference,
            exchange,
        } => json!({ "content": api_name(exchange), "priority": preference }),
        RecordData::Srv {
            priority,
            weight,
            port,
            target,
        } => json!({
            "data": {
                "priority": priority,
                "weight": weight,
                "port": port,
                "target": api_name(target),
            }
        }),
        RecordData::Caa { flags, tag, value } => json!({
            "data": { "flags": flags, "tag": tag, "value": value }
        }),
        RecordData::Sshfp {
            algorithm,
            fptype,
            fingerprint,
        } => json!({
            "data": { "algorithm": algorithm, "type": fptype, "fingerprint": fingerprint }
        }),
        RecordData::Alias { .. } | RecordData::Spf { .. } => {
            return Err(Error::unsupported(
                PROVIDER_NAME,
                record.record_type().as_str(),
            ));
        }
    };

    if let (Some(payload), Value::Object(fields)) = (payload.as_object_mut(), fields) {
        payload.extend(fields);
    }
    Ok(payload)
}

#[async_trait]
impl Provider for CloudflareProvider {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    async fn retrieve_current_records(&self, zone: &str) -> Result<Vec<Record>> {
        let zone_id = self.zone_id(zone).await?;
        let mut records = Vec::new();
        let mut page = 1;

        loop {
            let response = self
                .request(
                    Method::GET,
                    &format!(
                        "/zones/{}/dns_records?page={}&per_page={}",
                        zone_id, page, RECORDS_PER_PAGE
                    ),
                    None,
                )
                .await?;

            let batch = response
                .result
                .as_array()
                .ok_or_else(|| Error::unparseable(PROVIDER_NAME, "result is not an array"))?;
            for value in batch {
                if let Some(record) = record_from_api(value)? {
                    records.push(record);
                }
            }

            let total_pages = response.result_info.map(|i| i.total_pages).unwrap_or(1);
            if page >= total_pages {
                break;
            }
            page += 1;
        }

        tracing::debug!("Fetched {} records for {}", records.len(), zone);
        Ok(records)
    }

    async fn add(&self, record: &Record, zone: &str) -> Result<()> {
        let payload = record_to_api(record)?;
        let zone_id = self.zone_id(zone).await?;

        self.request(
            Method::POST,
            &format!("/zones/{}/dns_records", zone_id),
            Some(payload),
        )
        .await?;

        tracing::info!("Created {}", record);
        Ok(())
    }

    async fn remove(&self, record: &Record, zone: &str) -> Result<()> {
        let id = record
            .id()
            .ok_or_else(|| Error::MissingRecordId(record.to_string()))?;
        let zone_id = self.zone_id(zone).await?;

        self.request(
            Method::DELETE,
            &format!("/zones/{}/dns_records/{}", zone_id, id),
            None,
        )
        .await?;

        tracing::info!("Deleted {}", record);
        Ok(())
    }

    async fn update(&self, id: &str, record: &Record, zone: &str) -> Result<()> {
        let payload = record_to_api(record)?;
        let zone_id = self.zone_id(zone).await?;

        self.request(
            Method::PUT,
            &format!("/zones/{}/dns_records/{}", zone_id, id),
            Some(payload),
        )
        .await?;

        tracing::info!("Updated {} to {}", id, record);
        Ok(())
    }

    async fn zones(&self) -> Result<Vec<String>> {
        let mut zones = Vec::new();
        let mut page = 1;

        loop {
            let mut path = format!("/zones?page={}&per_page={}", page, ZONES_PER_PAGE);
            if let Some(account_id) = &self.account_id {
                path.push_str(&format!("&account.id={}", account_id));
            }

            let response = self.request(Method::GET, &path, None).await?;
            let batch = response
                .result
                .as_array()
                .ok_or_else(|| Error::unparseable(PROVIDER_NAME, "result is not an array"))?;
            for zone in batch {
                zones.push(to_fqdn(str_field(zone, "name")?));
            }

            let total_pages = response.result_info.map(|i| i.total_pages).unwrap_or(1);
            if page >= total_pages {
                break;
            }
            page += 1;
        }

        zones.sort();
        Ok(zones)
    }

    fn record_types(&self) -> BTreeSet<RecordType> {
        SUPPORTED_TYPES.into_iter().collect()
    }
}

/// Register a Cloudflare provider with a registry
///
/// # Example
///
/// ```rust,no_run
/// use zonesync_core::ProviderRegistry;
/// use zonesync_provider_cloudflare::CloudflareProvider;
///
/// let registry = ProviderRegistry::new();
/// let provider = CloudflareProvider::new("token", None).unwrap();
/// zonesync_provider_cloudflare::register(&registry, provider);
/// assert!(registry.has_provider("cloudflare"));
/// ```
pub fn register(registry: &ProviderRegistry, provider: CloudflareProvider) {
    registry.register(PROVIDER_NAME, Arc::new(provider));
}
