//! Origin CA HTTP API client.
//!
//! Two endpoints: certificate issuance (POST, authenticated with the
//! operator's service key) and the static per-key-type root certificate PEM.

use std::fmt;
use std::time::Duration;

use log::debug;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::validate::{CertificateRequest, KeyType};

/// Authentication header for the issuance endpoint.
const SERVICE_KEY_HEADER: &str = "X-Auth-User-Service-Key";

// Root certificate PEM locations, one per key type.
const ECC_ROOT_URL: &str = "https://developers.cloudflare.com/ssl/static/origin_ca_ecc_root.pem";
const RSA_ROOT_URL: &str = "https://developers.cloudflare.com/ssl/static/origin_ca_rsa_root.pem";

/// Request body for the issuance endpoint.
#[derive(Debug, Serialize)]
struct IssueRequest<'a> {
    hostnames:          &'a [String],
    requested_validity: u32,
    request_type:       &'a str,
    csr:                &'a str,
}

/// Envelope shared by v4 API responses.
#[derive(Debug, Deserialize)]
struct ApiEnvelope {
    success: bool,
    #[serde(default)]
    result:  Option<IssuedCertificate>,
    #[serde(default)]
    errors:  Vec<CaMessage>,
}

/// One structured error object reported by the CA.
#[derive(Debug, Clone, Deserialize)]
pub struct CaMessage {
    pub code:    i64,
    pub message: String,
}

impl fmt::Display for CaMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "code {}: {}", self.code, self.message)
    }
}

/// A successfully issued certificate as returned by the CA.
#[derive(Debug, Clone, Deserialize)]
pub struct IssuedCertificate {
    pub certificate:  String,
    pub request_type: String,
    #[serde(default)]
    pub hostnames:    Vec<String>,
    pub expires_on:   String,
}

/// Client for the Origin CA endpoints.
pub struct CaClient {
    http:        Client,
    api_base:    String,
    service_key: String,
}

impl CaClient {
    /// Build a client with an explicit request timeout.
    pub fn new(api_base: &str, service_key: &str, timeout: Duration) -> Result<Self, ApiError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            api_base:    api_base.trim_end_matches('/').to_string(),
            service_key: service_key.to_string(),
        })
    }

    /// Submit a CSR for signing.
    ///
    /// A well-formed rejection carries every CA-reported error object, not
    /// just the first.
    pub async fn submit(
        &self,
        csr:     &str,
        request: &CertificateRequest,
    ) -> Result<IssuedCertificate, ApiError> {
        let url = format!("{}/certificates", self.api_base);
        let body = IssueRequest {
            hostnames:          &request.hostnames,
            requested_validity: request.validity_days,
            request_type:       request.key_type.as_str(),
            csr,
        };
        debug!("POST {url} ({} hostnames)", request.hostnames.len());

        let envelope: ApiEnvelope = self
            .http
            .post(&url)
            .header(SERVICE_KEY_HEADER, &self.service_key)
            .json(&body)
            .send()
            .await?
            .json()
            .await?;

        if !envelope.success {
            return Err(ApiError::Rejected { errors: envelope.errors });
        }
        envelope
            .result
            .ok_or(ApiError::Malformed("success without a result payload"))
    }

    /// Fetch the CA root certificate PEM for `key_type`.
    pub async fn fetch_root_certificate(&self, key_type: KeyType) -> Result<String, ApiError> {
        let url = match key_type {
            KeyType::OriginEcc => ECC_ROOT_URL,
            KeyType::OriginRsa => RSA_ROOT_URL,
        };
        debug!("GET {url}");
        let pem = self
            .http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(pem)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_issued_certificate() {
        let body = r#"{
            "success": true,
            "errors": [],
            "messages": [],
            "result": {
                "id": "328578533926817665310988110497502960716862347475",
                "certificate": "-----BEGIN CERTIFICATE-----\nMIIB\n-----END CERTIFICATE-----\n",
                "request_type": "origin-ecc",
                "hostnames": ["example.com", "*.example.com"],
                "expires_on": "2027-08-05T00:00:00Z",
                "requested_validity": 365
            }
        }"#;
        let envelope: ApiEnvelope = serde_json::from_str(body).unwrap();
        assert!(envelope.success);
        let cert = envelope.result.unwrap();
        assert_eq!(cert.request_type, "origin-ecc");
        assert_eq!(cert.hostnames.len(), 2);
        assert!(cert.certificate.starts_with("-----BEGIN CERTIFICATE-----"));
    }

    #[test]
    fn rejection_surfaces_every_error() {
        let body = r#"{
            "success": false,
            "errors": [
                {"code": 1006, "message": "hostname not eligible for origin certificate"},
                {"code": 1100, "message": "failed to validate requested hostnames"}
            ]
        }"#;
        let envelope: ApiEnvelope = serde_json::from_str(body).unwrap();
        assert!(!envelope.success);
        assert_eq!(envelope.errors.len(), 2);

        let rendered = ApiError::Rejected { errors: envelope.errors }.to_string();
        assert!(rendered.contains("1006"), "missing first error: {rendered}");
        assert!(rendered.contains("1100"), "missing second error: {rendered}");
    }

    #[test]
    fn issue_request_serializes_the_wire_names() {
        let hostnames = vec!["example.com".to_string()];
        let body = IssueRequest {
            hostnames:          &hostnames,
            requested_validity: 365,
            request_type:       "origin-ecc",
            csr:                "-----BEGIN CERTIFICATE REQUEST-----",
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["requested_validity"], 365);
        assert_eq!(json["request_type"], "origin-ecc");
        assert_eq!(json["hostnames"][0], "example.com");
        assert!(json["csr"].as_str().unwrap().contains("CERTIFICATE REQUEST"));
    }
}
