//! Record validation rules
//!
//! Validation never fails an operation: every rule appends a
//! [`ValidationError`] and the caller decides what to do with the list.

use super::{Record, RecordData};
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::LazyLock;

/// Maximum length of a fully-qualified name, trailing dot included
pub const MAX_FQDN_LENGTH: usize = 254;

/// Maximum length of a single label
pub const MAX_LABEL_LENGTH: usize = 63;

/// Maximum TTL (2^31 - 1, RFC 2181)
pub const MAX_TTL: i64 = 2_147_483_647;

/// Maximum length of TXT/SPF data
pub const MAX_TXT_LENGTH: usize = 4096;

/// CAA property tags we accept
pub const CAA_TAGS: [&str; 3] = ["issue", "issuewild", "iodef"];

static FQDN_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(\*\.)?([a-z0-9_]+(-+[a-z0-9_]+)*\.)+[a-z]{2,}\.$")
        .expect("FQDN pattern is valid")
});

static SRV_FQDN_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^_[a-z0-9-]+\._(tcp|udp|tls|sctp)\.").expect("SRV pattern is valid")
});

/// One failed validation rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    /// Field (or aggregate attribute) the rule is about
    pub field: String,
    /// Human-readable message
    pub message: String,
}

impl ValidationError {
    /// Create a validation error
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Whether `name` is a syntactically valid, dot-terminated FQDN
///
/// Checks the label grammar, the total length and every label's length.
pub fn is_valid_fqdn(name: &str) -> bool {
    fqdn_problems(name).is_empty()
}

fn fqdn_problems(name: &str) -> Vec<String> {
    let mut problems = Vec::new();

    if !FQDN_REGEX.is_match(name) {
        problems.push("is not a fully qualified domain name".to_string());
    }

    if name.len() > MAX_FQDN_LENGTH {
        problems.push(format!(
            "is too long ({} characters, maximum is {})",
            name.len(),
            MAX_FQDN_LENGTH
        ));
    }

    if let Some(label) = name
        .trim_end_matches('.')
        .split('.')
        .find(|label| label.len() > MAX_LABEL_LENGTH)
    {
        problems.push(format!(
            "has a label longer than {} characters: {}",
            MAX_LABEL_LENGTH, label
        ));
    }

    problems
}

fn check_fqdn(errors: &mut Vec<ValidationError>, field: &str, value: &str) {
    for problem in fqdn_problems(value) {
        errors.push(ValidationError::new(field, problem));
    }
}

fn check_range(errors: &mut Vec<ValidationError>, field: &str, value: i64, max: i64) {
    if !(0..=max).contains(&value) {
        errors.push(ValidationError::new(
            field,
            format!("must be between 0 and {}", max),
        ));
    }
}

fn check_presence(errors: &mut Vec<ValidationError>, field: &str, value: &str) {
    if value.trim().is_empty() {
        errors.push(ValidationError::new(field, "can't be blank"));
    }
}

/// Whether every `;` in `text` is escaped as `\;`
fn semicolons_escaped(text: &str) -> bool {
    let mut previous = None;
    for c in text.chars() {
        if c == ';' && previous != Some('\\') {
            return false;
        }
        previous = Some(c);
    }
    true
}

fn check_txtdata(errors: &mut Vec<ValidationError>, txtdata: &str) {
    check_presence(errors, "txtdata", txtdata);

    if txtdata.chars().count() > MAX_TXT_LENGTH {
        errors.push(ValidationError::new(
            "txtdata",
            format!("is too long (maximum is {} characters)", MAX_TXT_LENGTH),
        ));
    }

    if !semicolons_escaped(txtdata) {
        errors.push(ValidationError::new(
            "txtdata",
            "has unescaped semicolons (see RFC 1035)",
        ));
    }
}

/// Run every rule that applies to `record`
pub fn validate_record(record: &Record) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    check_fqdn(&mut errors, "fqdn", record.fqdn());

    if !(0..=MAX_TTL).contains(&record.ttl()) {
        errors.push(ValidationError::new(
            "ttl",
            format!("must be between 0 and {}", MAX_TTL),
        ));
    }

    match record.data() {
        RecordData::A { address } => {
            if address.parse::<Ipv4Addr>().is_err() {
                errors.push(ValidationError::new("address", "is not a valid IPv4 address"));
            }
        }
        RecordData::Aaaa { address } => {
            if address.parse::<Ipv6Addr>().is_err() {
                errors.push(ValidationError::new("address", "is not a valid IPv6 address"));
            }
        }
        RecordData::Alias { alias } => check_fqdn(&mut errors, "alias", alias),
        RecordData::Caa { flags, tag, value } => {
            check_range(&mut errors, "flags", *flags, 255);
            if !CAA_TAGS.contains(&tag.as_str()) {
                errors.push(ValidationError::new(
                    "tag",
                    format!("must be one of {}", CAA_TAGS.join(", ")),
                ));
            }
            check_presence(&mut errors, "value", value);
            if tag == "iodef"
                && !["mailto:", "http://", "https://"]
                    .iter()
                    .any(|scheme| value.starts_with(scheme))
            {
                errors.push(ValidationError::new(
                    "value",
                    "must be a mailto:, http: or https: URI for iodef",
                ));
            }
        }
        RecordData::Cname { cname } => {
            check_fqdn(&mut errors, "cname", cname);
            if cname == record.fqdn() {
                errors.push(ValidationError::new("cname", "cannot point to itself"));
            }
        }
        RecordData::Mx {
            preference,
            exchange,
        } => {
            check_range(&mut errors, "preference", *preference, 65535);
            check_fqdn(&mut errors, "exchange", exchange);
        }
        RecordData::Ns { nsdname } => check_fqdn(&mut errors, "nsdname", nsdname),
        RecordData::Ptr { ptrdname } => {
            check_fqdn(&mut errors, "ptrdname", ptrdname);
            if !record.fqdn().ends_with(".in-addr.arpa.") && !record.fqdn().ends_with(".ip6.arpa.") {
                errors.push(ValidationError::new(
                    "fqdn",
                    "must be a reverse lookup name under in-addr.arpa. or ip6.arpa.",
                ));
            }
        }
        RecordData::Spf { txtdata } | RecordData::Txt { txtdata } => {
            check_txtdata(&mut errors, txtdata)
        }
        RecordData::Srv {
            priority,
            weight,
            port,
            target,
        } => {
            check_range(&mut errors, "priority", *priority, 65535);
            check_range(&mut errors, "weight", *weight, 65535);
            check_range(&mut errors, "port", *port, 65535);
            check_fqdn(&mut errors, "target", target);
            if !SRV_FQDN_REGEX.is_match(record.fqdn()) {
                errors.push(ValidationError::new(
                    "fqdn",
                    "must be of the form _service._proto.name.",
                ));
            }
        }
        RecordData::Sshfp {
            algorithm,
            fptype,
            fingerprint,
        } => {
            if !(1..=4).contains(algorithm) {
                errors.push(ValidationError::new(
                    "algorithm",
                    "must be 1 (RSA), 2 (DSA), 3 (ECDSA) or 4 (Ed25519)",
                ));
            }
            if !(1..=2).contains(fptype) {
                errors.push(ValidationError::new("fptype", "must be 1 (SHA-1) or 2 (SHA-256)"));
            }
            if fingerprint.is_empty() || !fingerprint.chars().all(|c| c.is_ascii_hexdigit()) {
                errors.push(ValidationError::new("fingerprint", "must be hexadecimal"));
            }
        }
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordData;

    fn fields(errors: &[ValidationError]) -> Vec<&str> {
        errors.iter().map(|e| e.field.as_str()).collect()
    }

    #[test]
    fn test_fqdn_grammar() {
        assert!(is_valid_fqdn("example.com."));
        assert!(is_valid_fqdn("*.example.com."));
        assert!(is_valid_fqdn("_acme-challenge.example.com."));
        assert!(is_valid_fqdn("xn--bcher-kva.example."));

        assert!(!is_valid_fqdn("example.com"));
        assert!(!is_valid_fqdn("-bad.example.com."));
        assert!(!is_valid_fqdn("bad-.example.com."));
        assert!(!is_valid_fqdn("example..com."));
        assert!(!is_valid_fqdn("."));
    }

    #[test]
    fn test_label_and_total_length() {
        let long_label = format!("{}.example.com.", "a".repeat(64));
        let errors = fqdn_problems(&long_label);
        assert!(errors.iter().any(|e| e.contains("label longer than 63")));

        let ok_label = format!("{}.example.com.", "a".repeat(63));
        assert!(is_valid_fqdn(&ok_label));

        let long_name = format!("{}com.", "abcdefghi.".repeat(26));
        assert!(long_name.len() > MAX_FQDN_LENGTH);
        assert!(!is_valid_fqdn(&long_name));
    }

    #[test]
    fn test_total_length_limit_is_inclusive() {
        let name = |last: usize| format!("{0}.{0}.{0}.{1}.", "a".repeat(63), "b".repeat(last));

        let longest = name(61);
        assert_eq!(longest.len(), MAX_FQDN_LENGTH);
        assert!(is_valid_fqdn(&longest));

        let too_long = name(62);
        assert_eq!(too_long.len(), MAX_FQDN_LENGTH + 1);
        let problems = fqdn_problems(&too_long);
        assert_eq!(problems, vec!["is too long (255 characters, maximum is 254)"]);
    }

    #[test]
    fn test_ttl_bounds() {
        let data = RecordData::A {
            address: "10.0.0.1".to_string(),
        };
        assert!(Record::new("a.example.com.", 0, data.clone()).is_valid());
        assert!(Record::new("a.example.com.", MAX_TTL, data.clone()).is_valid());
        assert_eq!(
            fields(&Record::new("a.example.com.", -1, data.clone()).validate()),
            vec!["ttl"]
        );
        assert_eq!(
            fields(&Record::new("a.example.com.", MAX_TTL + 1, data).validate()),
            vec!["ttl"]
        );
    }

    #[test]
    fn test_address_families() {
        let v4_in_aaaa = Record::new(
            "a.example.com.",
            60,
            RecordData::Aaaa {
                address: "10.0.0.1".to_string(),
            },
        );
        assert_eq!(fields(&v4_in_aaaa.validate()), vec!["address"]);

        let v6_in_a = Record::new(
            "a.example.com.",
            60,
            RecordData::A {
                address: "::1".to_string(),
            },
        );
        assert_eq!(fields(&v6_in_a.validate()), vec!["address"]);
    }

    #[test]
    fn test_cname_cannot_point_to_itself() {
        let record = Record::new(
            "www.example.com.",
            60,
            RecordData::Cname {
                cname: "WWW.example.com".to_string(),
            },
        );
        let errors = record.validate();
        assert_eq!(errors, vec![ValidationError::new("cname", "cannot point to itself")]);
    }

    #[test]
    fn test_txt_semicolons() {
        let escaped = Record::new(
            "example.com.",
            60,
            RecordData::Txt {
                txtdata: r"v=DKIM1\; k=rsa\; p=abc".to_string(),
            },
        );
        assert!(escaped.is_valid());

        let raw = Record::new(
            "example.com.",
            60,
            RecordData::Spf {
                txtdata: "v=spf1; -all".to_string(),
            },
        );
        assert_eq!(fields(&raw.validate()), vec!["txtdata"]);

        let long = Record::new(
            "example.com.",
            60,
            RecordData::Txt {
                txtdata: "x".repeat(MAX_TXT_LENGTH + 1),
            },
        );
        assert_eq!(fields(&long.validate()), vec!["txtdata"]);

        let longest = Record::new(
            "example.com.",
            60,
            RecordData::Txt {
                txtdata: "x".repeat(MAX_TXT_LENGTH),
            },
        );
        assert!(longest.is_valid());
    }

    #[test]
    fn test_caa_rules() {
        let bad_tag = Record::new(
            "example.com.",
            60,
            RecordData::Caa {
                flags: 0,
                tag: "issuer".to_string(),
                value: "letsencrypt.org".to_string(),
            },
        );
        assert_eq!(fields(&bad_tag.validate()), vec!["tag"]);

        let bad_iodef = Record::new(
            "example.com.",
            60,
            RecordData::Caa {
                flags: 256,
                tag: "iodef".to_string(),
                value: "security@example.com".to_string(),
            },
        );
        assert_eq!(fields(&bad_iodef.validate()), vec!["flags", "value"]);

        let good = Record::new(
            "example.com.",
            60,
            RecordData::Caa {
                flags: 128,
                tag: "iodef".to_string(),
                value: "mailto:security@example.com".to_string(),
            },
        );
        assert!(good.is_valid());
    }

    #[test]
    fn test_srv_owner_name() {
        let data = RecordData::Srv {
            priority: 10,
            weight: 5,
            port: 443,
            target: "host.example.com.".to_string(),
        };
        assert!(Record::new("_https._tcp.example.com.", 60, data.clone()).is_valid());
        assert_eq!(
            fields(&Record::new("https.example.com.", 60, data).validate()),
            vec!["fqdn"]
        );
    }

    #[test]
    fn test_ptr_owner_name() {
        let data = RecordData::Ptr {
            ptrdname: "host.example.com.".to_string(),
        };
        assert!(Record::new("1.0.0.10.in-addr.arpa.", 60, data.clone()).is_valid());
        assert_eq!(
            fields(&Record::new("host.example.com.", 60, data).validate()),
            vec!["fqdn"]
        );
    }

    #[test]
    fn test_sshfp_rules() {
        let record = Record::new(
            "host.example.com.",
            60,
            RecordData::Sshfp {
                algorithm: 5,
                fptype: 3,
                fingerprint: "not-hex".to_string(),
            },
        );
        assert_eq!(
            fields(&record.validate()),
            vec!["algorithm", "fptype", "fingerprint"]
        );
    }

    #[test]
    fn test_mx_exchange_must_be_fqdn() {
        let record = Record::new(
            "example.com.",
            60,
            RecordData::Mx {
                preference: 70000,
                exchange: "-mail.example.com".to_string(),
            },
        );
        assert_eq!(fields(&record.validate()), vec!["preference", "exchange"]);
    }
}
