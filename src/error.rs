//! Error types for the certificate issuance pipeline.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

use crate::api::CaMessage;

/// Operator input rejected by a validator.
///
/// Carries the field name and the violated rule. Validation runs before any
/// process is spawned or request sent, so this error never coexists with
/// partial artifacts on disk.
#[derive(Debug, Error)]
#[error("{field}: {reason}")]
pub struct ValidationError {
    pub field:  &'static str,
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self { field, reason: reason.into() }
    }
}

/// Which openssl invocation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolkitStage {
    KeyGen,
    Csr,
}

impl fmt::Display for ToolkitStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolkitStage::KeyGen => write!(f, "keygen"),
            ToolkitStage::Csr    => write!(f, "csr"),
        }
    }
}

/// External crypto toolkit failure.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("{stage}: failed to spawn openssl: {source}")]
    Spawn { stage: ToolkitStage, source: io::Error },

    #[error("{stage}: openssl {status}")]
    Exit { stage: ToolkitStage, status: ExitStatus },
}

/// Origin CA API failure.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Network or protocol failure before a structured CA response arrived.
    #[error("transport: {0}")]
    Transport(#[from] reqwest::Error),

    /// The CA answered with `success: false`. Every reported error object is
    /// kept and rendered, not just the first.
    #[error("rejected by the CA: {}", format_ca_errors(.errors))]
    Rejected { errors: Vec<CaMessage> },

    /// Structurally valid JSON that violates the response contract.
    #[error("malformed CA response: {0}")]
    Malformed(&'static str),
}

fn format_ca_errors(errors: &[CaMessage]) -> String {
    if errors.is_empty() {
        return "no error detail supplied".to_string();
    }
    errors.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; ")
}

/// Write, permission, ownership or delete failure on an artifact.
#[derive(Debug, Error)]
#[error("{op} {}: {source}", .path.display())]
pub struct FilesystemError {
    pub op:     &'static str,
    pub path:   PathBuf,
    pub source: io::Error,
}

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Validating,
    KeyGenerating,
    CsrGenerating,
    Submitting,
    CertificatePersisting,
    BundleAssembling,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Stage::Validating            => "validation",
            Stage::KeyGenerating         => "key generation",
            Stage::CsrGenerating         => "CSR generation",
            Stage::Submitting            => "CA submission",
            Stage::CertificatePersisting => "certificate persistence",
            Stage::BundleAssembling      => "bundle assembly",
        };
        f.write_str(label)
    }
}

/// Any failure the pipeline can terminate on.
#[derive(Debug, Error)]
pub enum IssueError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Filesystem(#[from] FilesystemError),
}

/// Terminal state of a failed pipeline run: the stage it died in plus the
/// underlying cause.
#[derive(Debug, Error)]
#[error("{stage} failed: {error}")]
pub struct StageFailure {
    pub stage: Stage,
    pub error: IssueError,
}
