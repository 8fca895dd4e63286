//! The certificate issuance pipeline.
//!
//! Strictly linear:
//!   validate → generate key → generate CSR → submit to CA →
//!   persist certificate → assemble bundle
//!
//! Each stage awaits its external process or network call to completion
//! before the next starts; the first failure terminates the run. There is no
//! retry and no cleanup of artifacts already on disk — only validation
//! failures are guaranteed side-effect free, because validation runs before
//! anything is spawned or sent.

use std::path::PathBuf;

use chrono::DateTime;
use log::{error, info, warn};

use crate::api::CaClient;
use crate::config::{RawRequest, Settings};
use crate::error::{ApiError, FilesystemError, IssueError, Stage, StageFailure};
use crate::naming;
use crate::openssl;
use crate::store;
use crate::validate;

/// Artifacts and metadata of a completed run.
#[derive(Debug)]
pub struct IssueReport {
    pub key_path:    PathBuf,
    pub cert_path:   PathBuf,
    pub bundle_path: PathBuf,
    pub hostnames:   Vec<String>,
    pub expires_on:  String,
}

fn at<E: Into<IssueError>>(stage: Stage) -> impl FnOnce(E) -> StageFailure {
    move |error| StageFailure { stage, error: error.into() }
}

/// Run one issuance from a raw parameter snapshot to persisted artifacts.
pub async fn run(raw: &RawRequest, settings: &Settings) -> Result<IssueReport, StageFailure> {
    info!("validating request parameters");
    let request = validate::validate_request(raw).map_err(at(Stage::Validating))?;

    // Computed once, passed explicitly to every later stage.
    let base_name = naming::derive_base_name(&request.hostnames);
    info!("artifact base name: {base_name}");

    let ownership = settings.ownership.as_ref();

    let key_path = openssl::generate_key(&settings.key_dir, &base_name)
        .await
        .map_err(at(Stage::KeyGenerating))?;
    store::apply_access(&key_path, store::MODE_PRIVATE, ownership)
        .await
        .map_err(at(Stage::KeyGenerating))?;

    let csr_path = openssl::generate_csr(&key_path, &settings.csr_dir, &base_name, &request.subject)
        .await
        .map_err(at(Stage::CsrGenerating))?;
    store::apply_access(&csr_path, store::MODE_PRIVATE, ownership)
        .await
        .map_err(at(Stage::CsrGenerating))?;

    info!("submitting CSR to the CA");
    let csr_pem = tokio::fs::read_to_string(&csr_path).await.map_err(|e| StageFailure {
        stage: Stage::Submitting,
        error: FilesystemError { op: "read", path: csr_path.clone(), source: e }.into(),
    })?;
    let ca = CaClient::new(&settings.api_base, &settings.service_key, settings.http_timeout)
        .map_err(at(Stage::Submitting))?;
    let issued = match ca.submit(&csr_pem, &request).await {
        Ok(issued) => issued,
        Err(e) => {
            if let ApiError::Rejected { errors } = &e {
                for ca_error in errors {
                    error!("CA reported {ca_error}");
                }
            }
            return Err(at(Stage::Submitting)(e));
        }
    };
    info!(
        "certificate issued ({}, expires {})",
        issued.request_type, issued.expires_on
    );

    // The CSR has served its purpose; a failed delete is worth a warning but
    // never reverses a completed issuance.
    if let Err(e) = store::discard_csr(&csr_path).await {
        warn!("{e}");
    }

    let cert_path =
        store::persist_certificate(&settings.cert_dir, &base_name, &issued.certificate, ownership)
            .await
            .map_err(at(Stage::CertificatePersisting))?;

    info!("fetching root certificate for the trust bundle");
    let root_pem = ca
        .fetch_root_certificate(request.key_type)
        .await
        .map_err(at(Stage::BundleAssembling))?;
    let bundle_path = store::persist_bundle(
        &settings.cert_dir,
        &base_name,
        &issued.certificate,
        &root_pem,
        ownership,
    )
    .await
    .map_err(at(Stage::BundleAssembling))?;

    Ok(IssueReport {
        key_path,
        cert_path,
        bundle_path,
        hostnames:  issued.hostnames,
        expires_on: format_expiry(&issued.expires_on),
    })
}

/// Render the CA expiry timestamp for the final report; unparseable values
/// pass through as received.
fn format_expiry(raw: &str) -> String {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(ts) => ts.format("%Y-%m-%d %H:%M:%S %z").to_string(),
        Err(_) => raw.to_string(),
    }
}
