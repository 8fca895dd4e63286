//! Process-wide configuration snapshot.
//!
//! Issuance parameters arrive as `CLOUDFLARE_*` environment keys (placed
//! there by the operator's shell or a service wrapper); this module only
//! snapshots them, once, at startup. Operational settings carry compiled-in
//! defaults and are overridable from the command line.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ValidationError;

// Default artifact locations, ownership and API endpoint
const KEY_DIR:  &str = "/etc/ssl/private";
const CSR_DIR:  &str = "/tmp";
const CERT_DIR: &str = "/etc/ssl/certs";
const OWNER:    &str = "root";
const GROUP:    &str = "ssl-cert";
const API_BASE: &str = "https://api.cloudflare.com/client/v4";
const HTTP_TIMEOUT_SECS: u64 = 60;

/// Raw issuance parameters exactly as the environment supplied them.
///
/// Absent keys snapshot as empty strings; their field validators reject them
/// with the normal rules.
#[derive(Debug, Clone, Default)]
pub struct RawRequest {
    pub hostnames:    String,
    pub validity:     String,
    pub key_type:     String,
    pub country:      String,
    pub state:        String,
    pub locality:     String,
    pub organization: String,
    pub common_name:  String,
}

/// Snapshot the `CLOUDFLARE_*` issuance parameters.
pub fn snapshot_request() -> RawRequest {
    RawRequest {
        hostnames:    env_or_empty("CLOUDFLARE_HOSTNAMES"),
        validity:     env_or_empty("CLOUDFLARE_VALIDITY"),
        key_type:     env_or_empty("CLOUDFLARE_CERT_TYPE"),
        country:      env_or_empty("CLOUDFLARE_CERT_C"),
        state:        env_or_empty("CLOUDFLARE_CERT_ST"),
        locality:     env_or_empty("CLOUDFLARE_CERT_L"),
        organization: env_or_empty("CLOUDFLARE_CERT_O"),
        common_name:  env_or_empty("CLOUDFLARE_CERT_CN"),
    }
}

/// Read the CA service key from the environment.
pub fn service_key_from_env() -> String {
    env_or_empty("CLOUDFLARE_ORIGIN_CA_KEY")
}

fn env_or_empty(key: &str) -> String {
    env::var(key).unwrap_or_default()
}

/// File ownership applied to every artifact.
#[derive(Debug, Clone)]
pub struct Ownership {
    pub user:  String,
    pub group: String,
}

/// Operational settings for one pipeline run.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Directory receiving the private key.
    pub key_dir: PathBuf,
    /// Directory receiving the transient CSR.
    pub csr_dir: PathBuf,
    /// Directory receiving the certificate and bundle.
    pub cert_dir: PathBuf,
    /// Ownership applied to artifacts; `None` skips chown (unprivileged runs).
    pub ownership: Option<Ownership>,
    /// Origin CA API base URL.
    pub api_base: String,
    /// Request timeout for CA calls.
    pub http_timeout: Duration,
    /// Service key authenticating issuance requests.
    pub service_key: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            key_dir:      PathBuf::from(KEY_DIR),
            csr_dir:      PathBuf::from(CSR_DIR),
            cert_dir:     PathBuf::from(CERT_DIR),
            ownership:    Some(Ownership { user: OWNER.into(), group: GROUP.into() }),
            api_base:     API_BASE.to_string(),
            http_timeout: Duration::from_secs(HTTP_TIMEOUT_SECS),
            service_key:  String::new(),
        }
    }
}

/// Parse `user:group` ownership notation.
pub fn parse_ownership(raw: &str) -> Result<Ownership, ValidationError> {
    match raw.split_once(':') {
        Some((user, group)) if !user.is_empty() && !group.is_empty() => Ok(Ownership {
            user:  user.to_string(),
            group: group.to_string(),
        }),
        _ => Err(ValidationError::new("owner", format!("expected user:group, got {raw:?}"))),
    }
}

/// Validate that required operational fields are populated.
pub fn validate_settings(settings: &Settings) -> Result<(), ValidationError> {
    if settings.service_key.is_empty() {
        return Err(ValidationError::new(
            "service key",
            "CLOUDFLARE_ORIGIN_CA_KEY is not set",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ownership_parses_user_group() {
        let owner = parse_ownership("root:ssl-cert").unwrap();
        assert_eq!(owner.user, "root");
        assert_eq!(owner.group, "ssl-cert");
        assert!(parse_ownership("root").is_err());
        assert!(parse_ownership(":ssl-cert").is_err());
    }

    #[test]
    fn settings_require_service_key() {
        let mut settings = Settings::default();
        assert!(validate_settings(&settings).is_err());
        settings.service_key = "v1.0-abc".to_string();
        assert!(validate_settings(&settings).is_ok());
    }
}
