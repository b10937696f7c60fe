//! Typed DNS record model
//!
//! A [`Record`] is one resource record: an owner name, a TTL, an optional
//! provider-assigned id and type-specific data ([`RecordData`]).
//!
//! ## Construction vs. validation
//!
//! Building a record only fails when the input cannot be shaped into a
//! record at all (missing field, unknown type, wrong JSON type). Anything
//! that parses but is semantically wrong (a malformed IPv4 literal, an
//! over-long label) is accepted and reported later by
//! [`Record::validate()`]. Callers must check validity before treating a
//! record as applyable.
//!
//! ## Normalization
//!
//! Construction dot-terminates and lowercases every FQDN-bearing field and
//! canonicalizes IP addresses through `std::net`. Unparsable addresses are
//! kept verbatim so validation can flag them.
//!
//! ## Equality
//!
//! Two records are equal when their type, fqdn, ttl and rdata match. The
//! provider id is a handle, not part of the record's identity.

pub mod validation;

pub use validation::ValidationError;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

/// DNS record type
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecordType {
    /// IPv4 address
    A,
    /// IPv6 address
    Aaaa,
    /// Apex alias (provider-side CNAME flattening)
    Alias,
    /// Certification Authority Authorization
    Caa,
    /// Canonical name
    Cname,
    /// Mail exchange
    Mx,
    /// Name server
    Ns,
    /// Reverse pointer
    Ptr,
    /// Sender Policy Framework
    Spf,
    /// Service locator
    Srv,
    /// SSH key fingerprint
    Sshfp,
    /// Text
    Txt,
}

impl RecordType {
    /// Every record type the model knows about
    pub const ALL: [RecordType; 12] = [
        RecordType::A,
        RecordType::Aaaa,
        RecordType::Alias,
        RecordType::Caa,
        RecordType::Cname,
        RecordType::Mx,
        RecordType::Ns,
        RecordType::Ptr,
        RecordType::Spf,
        RecordType::Srv,
        RecordType::Sshfp,
        RecordType::Txt,
    ];

    /// Zonefile mnemonic of the type
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
            RecordType::Alias => "ALIAS",
            RecordType::Caa => "CAA",
            RecordType::Cname => "CNAME",
            RecordType::Mx => "MX",
            RecordType::Ns => "NS",
            RecordType::Ptr => "PTR",
            RecordType::Spf => "SPF",
            RecordType::Srv => "SRV",
            RecordType::Sshfp => "SSHFP",
            RecordType::Txt => "TXT",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        RecordType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::invalid_record(format!("unknown record type: {}", s)))
    }
}

/// Type-specific record data
///
/// Numeric fields are kept as `i64` so that out-of-range values survive
/// construction and are reported by validation instead.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum RecordData {
    /// A record
    A {
        /// IPv4 address
        address: String,
    },
    /// AAAA record
    Aaaa {
        /// IPv6 address
        address: String,
    },
    /// ALIAS record
    Alias {
        /// Target hostname
        alias: String,
    },
    /// CAA record
    Caa {
        /// Issuer critical flags (0..=255)
        flags: i64,
        /// Property tag: issue, issuewild or iodef
        tag: String,
        /// CA domain or reporting URI
        value: String,
    },
    /// CNAME record
    Cname {
        /// Canonical name
        cname: String,
    },
    /// MX record
    Mx {
        /// Preference (lower is preferred)
        preference: i64,
        /// Mail server hostname
        exchange: String,
    },
    /// NS record
    Ns {
        /// Name server hostname
        nsdname: String,
    },
    /// PTR record
    Ptr {
        /// Pointed-to hostname
        ptrdname: String,
    },
    /// SPF record
    Spf {
        /// Policy text
        txtdata: String,
    },
    /// SRV record
    Srv {
        /// Priority (lower is preferred)
        priority: i64,
        /// Relative weight among same-priority targets
        weight: i64,
        /// Service port
        port: i64,
        /// Target hostname
        target: String,
    },
    /// SSHFP record
    Sshfp {
        /// Key algorithm (1 RSA, 2 DSA, 3 ECDSA, 4 Ed25519)
        algorithm: i64,
        /// Fingerprint type (1 SHA-1, 2 SHA-256)
        fptype: i64,
        /// Hex-encoded fingerprint
        fingerprint: String,
    },
    /// TXT record
    Txt {
        /// Text content
        txtdata: String,
    },
}

impl RecordData {
    /// Type discriminant of this data
    pub fn record_type(&self) -> RecordType {
        match self {
            RecordData::A { .. } => RecordType::A,
            RecordData::Aaaa { .. } => RecordType::Aaaa,
            RecordData::Alias { .. } => RecordType::Alias,
            RecordData::Caa { .. } => RecordType::Caa,
            RecordData::Cname { .. } => RecordType::Cname,
            RecordData::Mx { .. } => RecordType::Mx,
            RecordData::Ns { .. } => RecordType::Ns,
            RecordData::Ptr { .. } => RecordType::Ptr,
            RecordData::Spf { .. } => RecordType::Spf,
            RecordData::Srv { .. } => RecordType::Srv,
            RecordData::Sshfp { .. } => RecordType::Sshfp,
            RecordData::Txt { .. } => RecordType::Txt,
        }
    }

    fn normalized(self) -> Self {
        match self {
            RecordData::A { address } => RecordData::A {
                address: canonical_ip::<Ipv4Addr>(address),
            },
            RecordData::Aaaa { address } => RecordData::Aaaa {
                address: canonical_ip::<Ipv6Addr>(address),
            },
            RecordData::Alias { alias } => RecordData::Alias {
                alias: to_fqdn(&alias),
            },
            RecordData::Cname { cname } => RecordData::Cname {
                cname: to_fqdn(&cname),
            },
            RecordData::Mx { preference, exchange } => RecordData::Mx {
                preference,
                exchange: to_fqdn(&exchange),
            },
            RecordData::Ns { nsdname } => RecordData::Ns {
                nsdname: to_fqdn(&nsdname),
            },
            RecordData::Ptr { ptrdname } => RecordData::Ptr {
                ptrdname: to_fqdn(&ptrdname),
            },
            RecordData::Srv {
                priority,
                weight,
                port,
                target,
            } => RecordData::Srv {
                priority,
                weight,
                port,
                target: to_fqdn(&target),
            },
            other => other,
        }
    }
}

/// Dot-terminate and lowercase a domain name
pub fn to_fqdn(name: &str) -> String {
    let name = name.trim().to_ascii_lowercase();
    if name.ends_with('.') {
        name
    } else {
        format!("{}.", name)
    }
}

fn canonical_ip<T>(raw: String) -> String
where
    T: FromStr + fmt::Display,
{
    match raw.trim().parse::<T>() {
        Ok(ip) => ip.to_string(),
        Err(_) => raw,
    }
}

/// Raw shape of a file-sourced record definition
#[derive(Deserialize)]
struct RecordDefinition {
    fqdn: String,
    ttl: i64,
    #[serde(default, alias = "record_id")]
    id: Option<String>,
    #[serde(flatten)]
    data: RecordData,
}

/// A DNS resource record
///
/// Records are immutable once built; provider adapters that need a changed
/// copy use [`Record::with_id()`] or build a new record.
#[derive(Debug, Clone, Serialize)]
pub struct Record {
    fqdn: String,
    ttl: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(flatten)]
    data: RecordData,
}

impl Record {
    /// Build a record, normalizing names and addresses
    pub fn new(fqdn: impl AsRef<str>, ttl: i64, data: RecordData) -> Self {
        Self {
            fqdn: to_fqdn(fqdn.as_ref()),
            ttl,
            id: None,
            data: data.normalized(),
        }
    }

    /// Build a record from a structured definition
    ///
    /// The definition carries `type`, `fqdn`, `ttl`, an optional `id` and
    /// the type-specific fields.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRecord`] when a required field is missing,
    /// the type is unknown, or a field has the wrong JSON type.
    pub fn from_definition(definition: &Value) -> Result<Self> {
        let raw = RecordDefinition::deserialize(definition)
            .map_err(|e| Error::invalid_record(format!("{} in {}", e, definition)))?;

        let record = Record::new(raw.fqdn, raw.ttl, raw.data);
        Ok(match raw.id {
            Some(id) => record.with_id(id),
            None => record,
        })
    }

    /// Copy of this record carrying a provider id
    pub fn with_id(&self, id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..self.clone()
        }
    }

    /// Copy of this record with a different TTL
    pub fn with_ttl(&self, ttl: i64) -> Self {
        Self { ttl, ..self.clone() }
    }

    /// Fully-qualified, dot-terminated owner name
    pub fn fqdn(&self) -> &str {
        &self.fqdn
    }

    /// Time-to-live in seconds
    pub fn ttl(&self) -> i64 {
        self.ttl
    }

    /// Provider-assigned identifier, if the record came from a provider
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Type-specific data
    pub fn data(&self) -> &RecordData {
        &self.data
    }

    /// Record type
    pub fn record_type(&self) -> RecordType {
        self.data.record_type()
    }

    /// Grouping key used by the changeset: `"{type},{fqdn}"`
    pub fn key(&self) -> String {
        format!("{},{}", self.record_type(), self.fqdn)
    }

    /// Type-specific fields as a JSON object (without `type`)
    pub fn rdata(&self) -> Map<String, Value> {
        match serde_json::to_value(&self.data) {
            Ok(Value::Object(mut map)) => {
                map.remove("type");
                map
            }
            _ => Map::new(),
        }
    }

    /// Zonefile rendering of the type-specific fields
    pub fn rdata_txt(&self) -> String {
        match &self.data {
            RecordData::A { address } | RecordData::Aaaa { address } => address.clone(),
            RecordData::Alias { alias } => alias.clone(),
            RecordData::Caa { flags, tag, value } => format!("{} {} \"{}\"", flags, tag, value),
            RecordData::Cname { cname } => cname.clone(),
            RecordData::Mx {
                preference,
                exchange,
            } => format!("{} {}", preference, exchange),
            RecordData::Ns { nsdname } => nsdname.clone(),
            RecordData::Ptr { ptrdname } => ptrdname.clone(),
            RecordData::Spf { txtdata } | RecordData::Txt { txtdata } => txtdata.clone(),
            RecordData::Srv {
                priority,
                weight,
                port,
                target,
            } => format!("{} {} {} {}", priority, weight, port, target),
            RecordData::Sshfp {
                algorithm,
                fptype,
                fingerprint,
            } => format!("{} {} {}", algorithm, fptype, fingerprint),
        }
    }

    /// Textual value of a named attribute
    ///
    /// Knows `type`, `fqdn`, `ttl`, `id` and every rdata field of this
    /// record's type. Returns `None` for anything else.
    pub fn attribute(&self, name: &str) -> Option<String> {
        match name {
            "type" => Some(self.record_type().to_string()),
            "fqdn" => Some(self.fqdn.clone()),
            "ttl" => Some(self.ttl.to_string()),
            "id" | "record_id" => self.id.clone(),
            field => self.rdata().get(field).map(|value| match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            }),
        }
    }

    /// Run every record-level validation rule
    pub fn validate(&self) -> Vec<ValidationError> {
        validation::validate_record(self)
    }

    /// Whether [`validate()`](Self::validate) finds nothing
    pub fn is_valid(&self) -> bool {
        self.validate().is_empty()
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data && self.fqdn == other.fqdn && self.ttl == other.ttl
    }
}

impl Eq for Record {}

impl Hash for Record {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.data.hash(state);
        self.fqdn.hash(state);
        self.ttl.hash(state);
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}Record] {} {} IN {} {}",
            self.record_type(),
            self.fqdn,
            self.ttl,
            self.record_type(),
            self.rdata_txt()
        )
    }
}
