//! Operator input validation.
//!
//! Every validator here is pure and side-effect free. The pipeline runs all
//! of them before any process is spawned or request sent, so a rejected
//! input never leaves partial artifacts on disk.

use log::warn;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::RawRequest;
use crate::error::ValidationError;
use crate::iso3166;

/// Validity periods the Origin CA accepts, in days.
const ALLOWED_VALIDITY: &[u32] = &[7, 30, 90, 365, 730, 1095, 5475];

/// Lifetimes above this are no longer trusted by default by major browsers.
const BROWSER_TRUST_LIMIT_DAYS: u32 = 398;

static HOSTNAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\*\.)?([\w-]+\.?)*\.\w+$").expect("hostname pattern"));
static COMMON_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([\w-]+\.?)*\.\w+$").expect("common name pattern"));
// Deliberately permissive: any non-empty value containing a word or space
// character passes, matching what operators have always been able to supply.
static FREE_TEXT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\w ]").expect("free text pattern"));

/// Certificate flavours known to the Origin CA API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    OriginEcc,
    /// Historical option; rejected by validation but still part of the API
    /// vocabulary (request_type strings, root certificate table).
    #[allow(dead_code)]
    OriginRsa,
}

impl KeyType {
    pub fn as_str(self) -> &'static str {
        match self {
            KeyType::OriginEcc => "origin-ecc",
            KeyType::OriginRsa => "origin-rsa",
        }
    }
}

/// Validated subject distinguished-name fields.
#[derive(Debug, Clone)]
pub struct Subject {
    pub country:      String,
    pub state:        String,
    pub locality:     String,
    pub organization: String,
    pub common_name:  String,
}

/// A fully validated issuance request.
///
/// Guaranteed structurally postable to the CA API; nothing downstream
/// re-checks it.
#[derive(Debug, Clone)]
pub struct CertificateRequest {
    pub hostnames:     Vec<String>,
    pub validity_days: u32,
    pub key_type:      KeyType,
    pub subject:       Subject,
}

/// Validate the raw environment snapshot into a typed request.
///
/// Runs every validator eagerly; the first failure aborts with zero side
/// effects.
pub fn validate_request(raw: &RawRequest) -> Result<CertificateRequest, ValidationError> {
    let hostnames = validate_hostnames(&raw.hostnames)?;
    let validity_days = validate_validity(&raw.validity)?;
    let key_type = validate_key_type(&raw.key_type)?;
    let subject = Subject {
        country:      validate_country(&raw.country)?,
        state:        validate_state(&raw.state)?,
        locality:     validate_locality(&raw.locality)?,
        organization: validate_organization(&raw.organization)?,
        common_name:  validate_common_name(&raw.common_name)?,
    };
    Ok(CertificateRequest { hostnames, validity_days, key_type, subject })
}

/// Parse and check the hostname list.
///
/// Accepts a JSON array of FQDN-or-single-level-wildcard strings; order is
/// preserved. The error for a bad entry names the offending element.
pub fn validate_hostnames(raw: &str) -> Result<Vec<String>, ValidationError> {
    let hostnames: Vec<String> = serde_json::from_str(raw)
        .map_err(|_| ValidationError::new("hostnames", "not a JSON array of strings"))?;
    if hostnames.is_empty() {
        return Err(ValidationError::new("hostnames", "empty array"));
    }
    for host in &hostnames {
        if !HOSTNAME_RE.is_match(host) {
            return Err(ValidationError::new("hostnames", format!("invalid entry {host:?}")));
        }
    }
    Ok(hostnames)
}

/// Check the validity period against the CA's enumerated set.
///
/// Periods beyond the default browser trust limit are accepted with a logged
/// advisory.
pub fn validate_validity(raw: &str) -> Result<u32, ValidationError> {
    let days: u32 = raw
        .trim()
        .parse()
        .map_err(|_| ValidationError::new("validity", format!("not an integer: {raw:?}")))?;
    if !ALLOWED_VALIDITY.contains(&days) {
        return Err(ValidationError::new(
            "validity",
            format!("{days} days is not an allowed period"),
        ));
    }
    if days > BROWSER_TRUST_LIMIT_DAYS {
        warn!(
            "{days}-day certificates outlive the {BROWSER_TRUST_LIMIT_DAYS}-day lifetime \
             major browsers trust by default"
        );
    }
    Ok(days)
}

pub fn validate_key_type(raw: &str) -> Result<KeyType, ValidationError> {
    match raw {
        "origin-ecc" => Ok(KeyType::OriginEcc),
        _ => Err(ValidationError::new(
            "key type",
            format!("{raw:?} is not allowed (expected origin-ecc)"),
        )),
    }
}

/// Normalize the country to ISO 3166-1 alpha-2.
///
/// Three alphabetic characters are treated as alpha-3, three digits as a
/// numeric code; anything else passes through and must already be an
/// assigned alpha-2 code.
pub fn validate_country(raw: &str) -> Result<String, ValidationError> {
    let input = raw.trim().to_ascii_uppercase();
    let code = if input.len() == 3 && input.chars().all(|c| c.is_ascii_alphabetic()) {
        iso3166::alpha3_to_alpha2(&input)
            .ok_or_else(|| {
                ValidationError::new("country", format!("unrecognized alpha-3 code {raw:?}"))
            })?
            .to_string()
    } else if input.len() == 3 && input.chars().all(|c| c.is_ascii_digit()) {
        input
            .parse::<u16>()
            .ok()
            .and_then(iso3166::numeric_to_alpha2)
            .ok_or_else(|| {
                ValidationError::new("country", format!("unrecognized numeric code {raw:?}"))
            })?
            .to_string()
    } else {
        input
    };
    if !iso3166::is_alpha2(&code) {
        return Err(ValidationError::new("country", format!("unrecognized country {raw:?}")));
    }
    Ok(code)
}

pub fn validate_state(raw: &str) -> Result<String, ValidationError> {
    validate_free_text("state", raw)
}

pub fn validate_locality(raw: &str) -> Result<String, ValidationError> {
    validate_free_text("locality", raw)
}

pub fn validate_organization(raw: &str) -> Result<String, ValidationError> {
    validate_free_text("organization", raw)
}

fn validate_free_text(field: &'static str, raw: &str) -> Result<String, ValidationError> {
    if raw.is_empty() || !FREE_TEXT_RE.is_match(raw) {
        return Err(ValidationError::new(field, "must contain word or space characters"));
    }
    Ok(raw.to_string())
}

pub fn validate_common_name(raw: &str) -> Result<String, ValidationError> {
    if !COMMON_NAME_RE.is_match(raw) {
        return Err(ValidationError::new(
            "common name",
            format!("{raw:?} is not a fully-qualified name"),
        ));
    }
    Ok(raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hostnames_accept_fqdn_and_wildcard() {
        let raw = r#"["example.com", "*.example.com", "api.sub.example.com"]"#;
        let parsed = validate_hostnames(raw).unwrap();
        assert_eq!(parsed, vec!["example.com", "*.example.com", "api.sub.example.com"]);
    }

    #[test]
    fn hostnames_name_the_bad_entry() {
        let err = validate_hostnames(r#"["example.com", "not a hostname"]"#).unwrap_err();
        assert_eq!(err.field, "hostnames");
        assert!(err.reason.contains("not a hostname"), "reason: {}", err.reason);
    }

    #[test]
    fn hostnames_reject_non_array_input() {
        assert!(validate_hostnames("example.com").is_err());
        assert!(validate_hostnames("{}").is_err());
        assert!(validate_hostnames("").is_err());
        assert!(validate_hostnames("[]").is_err());
    }

    #[test]
    fn validity_accepts_exactly_the_enumerated_periods() {
        for days in [7u32, 30, 90, 365, 730, 1095, 5475] {
            assert_eq!(validate_validity(&days.to_string()).unwrap(), days);
        }
        assert!(validate_validity("14").is_err());
        assert!(validate_validity("398").is_err());
        assert!(validate_validity("xyz").is_err());
        assert!(validate_validity("").is_err());
    }

    #[test]
    fn key_type_accepts_only_ecc() {
        assert_eq!(validate_key_type("origin-ecc").unwrap(), KeyType::OriginEcc);
        assert!(validate_key_type("origin-rsa").is_err());
        assert!(validate_key_type("").is_err());
    }

    #[test]
    fn country_normalizes_alpha3_and_numeric() {
        assert_eq!(validate_country("USA").unwrap(), "US");
        assert_eq!(validate_country("840").unwrap(), "US");
        assert_eq!(validate_country("nld").unwrap(), "NL");
        assert_eq!(validate_country("DE").unwrap(), "DE");
    }

    #[test]
    fn country_rejects_unknown_codes() {
        assert!(validate_country("XX").is_err());
        assert!(validate_country("ZZZ").is_err());
        assert!(validate_country("999").is_err());
        assert!(validate_country("").is_err());
    }

    #[test]
    fn free_text_fields_stay_permissive() {
        assert_eq!(validate_organization("ACME Corp").unwrap(), "ACME Corp");
        assert_eq!(validate_organization("ACME & Sons, Ltd.").unwrap(), "ACME & Sons, Ltd.");
        assert_eq!(validate_state("Noord-Holland").unwrap(), "Noord-Holland");
        assert!(validate_organization("").is_err());
        assert!(validate_locality("&&&").is_err());
    }

    #[test]
    fn common_name_requires_fqdn_shape() {
        assert!(validate_common_name("example.com").is_ok());
        assert!(validate_common_name("www.example.com").is_ok());
        assert!(validate_common_name("localhost").is_err());
        assert!(validate_common_name("").is_err());
    }

    #[test]
    fn full_request_validates() {
        let raw = RawRequest {
            hostnames:    r#"["*.example.com", "example.com"]"#.to_string(),
            validity:     "365".to_string(),
            key_type:     "origin-ecc".to_string(),
            country:      "USA".to_string(),
            state:        "California".to_string(),
            locality:     "San Francisco".to_string(),
            organization: "Example Inc".to_string(),
            common_name:  "example.com".to_string(),
        };
        let request = validate_request(&raw).unwrap();
        assert_eq!(request.hostnames.len(), 2);
        assert_eq!(request.validity_days, 365);
        assert_eq!(request.key_type, KeyType::OriginEcc);
        assert_eq!(request.subject.country, "US");
    }
}
