//! External crypto toolkit invocations.
//!
//! Key and CSR generation both shell out to `openssl`; the pipeline suspends
//! until the child exits. Captured stdout/stderr is forwarded to the
//! operator's log; spawn failures and nonzero exits map to [`ProcessError`].

use std::path::{Path, PathBuf};

use log::{debug, info};
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::process::Command;

use crate::error::{ProcessError, ToolkitStage};
use crate::validate::Subject;

/// Curve used for origin-ecc keys.
const CURVE: &str = "secp384r1";

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace pattern"));

/// Generate a secp384r1 private key at `<key_dir>/<base_name>.key`.
pub async fn generate_key(key_dir: &Path, base_name: &str) -> Result<PathBuf, ProcessError> {
    let key_path = key_dir.join(format!("{base_name}.key"));
    info!("generating {CURVE} key: {}", key_path.display());

    let mut cmd = Command::new("openssl");
    cmd.args(["ecparam", "-name", CURVE, "-genkey", "-noout", "-out"])
        .arg(&key_path);
    run_toolkit(ToolkitStage::KeyGen, cmd).await?;
    Ok(key_path)
}

/// Generate a CSR at `<csr_dir>/<base_name>.csr` from an existing key.
///
/// The subject is pre-validated; DN assembly cannot fail.
pub async fn generate_csr(
    key_path:  &Path,
    csr_dir:   &Path,
    base_name: &str,
    subject:   &Subject,
) -> Result<PathBuf, ProcessError> {
    let csr_path = csr_dir.join(format!("{base_name}.csr"));
    let subj = subject_dn(subject);
    info!("generating CSR: {}", csr_path.display());
    debug!("CSR subject: {subj}");

    let mut cmd = Command::new("openssl");
    cmd.args(["req", "-new", "-sha512", "-key"])
        .arg(key_path)
        .arg("-out")
        .arg(&csr_path)
        .arg("-subj")
        .arg(&subj);
    run_toolkit(ToolkitStage::Csr, cmd).await?;
    Ok(csr_path)
}

/// Compose the `-subj` distinguished-name argument.
///
/// Whitespace runs in locality and organization are backslash-escaped; the
/// DN has always been sent to the toolkit in this form.
fn subject_dn(subject: &Subject) -> String {
    format!(
        "/C={}/ST={}/L={}/O={}/CN={}",
        subject.country,
        subject.state,
        escape_whitespace(&subject.locality),
        escape_whitespace(&subject.organization),
        subject.common_name,
    )
}

fn escape_whitespace(value: &str) -> String {
    WHITESPACE_RE.replace_all(value, r"\$0").into_owned()
}

/// Spawn an openssl invocation and wait for it to exit, forwarding captured
/// output to the log.
async fn run_toolkit(stage: ToolkitStage, mut cmd: Command) -> Result<(), ProcessError> {
    let output = cmd
        .output()
        .await
        .map_err(|source| ProcessError::Spawn { stage, source })?;

    forward_output(stage, "stdout", &output.stdout);
    forward_output(stage, "stderr", &output.stderr);

    if !output.status.success() {
        return Err(ProcessError::Exit { stage, status: output.status });
    }
    Ok(())
}

fn forward_output(stage: ToolkitStage, stream: &str, bytes: &[u8]) {
    let text = String::from_utf8_lossy(bytes);
    for line in text.lines().filter(|l| !l.trim().is_empty()) {
        info!("openssl[{stage}] {stream}: {line}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_subject() -> Subject {
        Subject {
            country:      "US".to_string(),
            state:        "California".to_string(),
            locality:     "San Francisco".to_string(),
            organization: "Example Inc".to_string(),
            common_name:  "example.com".to_string(),
        }
    }

    fn openssl_available() -> bool {
        std::process::Command::new("openssl")
            .arg("version")
            .output()
            .is_ok()
    }

    #[test]
    fn dn_escapes_whitespace_runs() {
        let mut subject = test_subject();
        subject.organization = "ACME  Corp".to_string();
        assert_eq!(
            subject_dn(&subject),
            "/C=US/ST=California/L=San\\ Francisco/O=ACME\\  Corp/CN=example.com"
        );
    }

    #[test]
    fn dn_without_whitespace_is_untouched() {
        let mut subject = test_subject();
        subject.locality = "Amsterdam".to_string();
        subject.organization = "Example".to_string();
        assert_eq!(
            subject_dn(&subject),
            "/C=US/ST=California/L=Amsterdam/O=Example/CN=example.com"
        );
    }

    #[tokio::test]
    async fn generates_key_and_csr() {
        if !openssl_available() {
            return; // toolkit not installed on this host
        }
        let dir = tempfile::tempdir().unwrap();

        let key_path = generate_key(dir.path(), "cloudflare-test").await.unwrap();
        let key_pem = std::fs::read_to_string(&key_path).unwrap();
        assert!(key_pem.contains("PRIVATE KEY"), "unexpected key output: {key_pem}");

        let csr_path = generate_csr(&key_path, dir.path(), "cloudflare-test", &test_subject())
            .await
            .unwrap();
        let csr_pem = std::fs::read_to_string(&csr_path).unwrap();
        assert!(csr_pem.contains("BEGIN CERTIFICATE REQUEST"));
    }

    #[tokio::test]
    async fn nonzero_exit_is_reported_with_stage() {
        if !openssl_available() {
            return;
        }
        let err = generate_key(Path::new("/nonexistent/definitely/missing"), "x")
            .await
            .unwrap_err();
        match err {
            ProcessError::Exit { stage, .. } => assert_eq!(stage, ToolkitStage::KeyGen),
            other => panic!("expected exit error, got {other:?}"),
        }
    }
}
