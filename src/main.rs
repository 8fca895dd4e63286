//! Origin CA certificate issuance client.
//!
//! One-shot pipeline: validate the CLOUDFLARE_* parameters, generate an EC
//! private key and CSR via openssl, submit the CSR to the Cloudflare Origin
//! CA, then persist the certificate and the root trust bundle with
//! restrictive permissions and ownership.
//!
//! Usage:
//!   origin-ca-client                 # log to stderr
//!   origin-ca-client --syslog        # log to syslog
//!   origin-ca-client --no-chown --key-dir ./out --cert-dir ./out

mod api;
mod config;
mod error;
mod iso3166;
mod naming;
mod openssl;
mod pipeline;
mod store;
mod validate;

use std::path::PathBuf;
use std::process;
use std::time::Duration;

use clap::Parser;
use log::{error, info};

// ── CLI ───────────────────────────────────────────────────────────────────────

#[derive(Debug, Parser)]
#[command(name = "origin-ca-client", about = "Cloudflare Origin CA certificate issuance client")]
struct Cli {
    /// Directory receiving the private key.
    #[arg(long)]
    key_dir: Option<PathBuf>,

    /// Directory receiving the transient CSR.
    #[arg(long)]
    csr_dir: Option<PathBuf>,

    /// Directory receiving the certificate and bundle.
    #[arg(long)]
    cert_dir: Option<PathBuf>,

    /// Artifact ownership as user:group (default root:ssl-cert).
    #[arg(long)]
    owner: Option<String>,

    /// Skip chown entirely (for unprivileged runs).
    #[arg(long)]
    no_chown: bool,

    /// Origin CA API base URL.
    #[arg(long)]
    api_base: Option<String>,

    /// Request timeout for CA calls, in seconds.
    #[arg(long)]
    http_timeout: Option<u64>,

    /// Log to syslog instead of stderr.
    #[arg(long)]
    syslog: bool,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    setup_logging(cli.syslog).expect("failed to set up logging");

    let mut settings = config::Settings::default();
    settings.service_key = config::service_key_from_env();
    if let Some(dir) = cli.key_dir {
        settings.key_dir = dir;
    }
    if let Some(dir) = cli.csr_dir {
        settings.csr_dir = dir;
    }
    if let Some(dir) = cli.cert_dir {
        settings.cert_dir = dir;
    }
    if let Some(raw) = &cli.owner {
        match config::parse_ownership(raw) {
            Ok(ownership) => settings.ownership = Some(ownership),
            Err(e) => {
                eprintln!("origin-ca-client: {e}");
                process::exit(1);
            }
        }
    }
    if cli.no_chown {
        settings.ownership = None;
    }
    if let Some(base) = cli.api_base {
        settings.api_base = base;
    }
    if let Some(secs) = cli.http_timeout {
        settings.http_timeout = Duration::from_secs(secs);
    }

    if let Err(e) = config::validate_settings(&settings) {
        eprintln!("origin-ca-client: config validation: {e}");
        process::exit(1);
    }

    let raw = config::snapshot_request();

    match pipeline::run(&raw, &settings).await {
        Ok(report) => {
            info!("issuance complete");
            info!("  key:         {}", report.key_path.display());
            info!("  certificate: {}", report.cert_path.display());
            info!("  bundle:      {}", report.bundle_path.display());
            info!("  hostnames:   {}", report.hostnames.join(", "));
            info!("  expires:     {}", report.expires_on);
        }
        Err(failure) => {
            error!("{failure}");
            process::exit(1);
        }
    }
}

// ── Logging setup ─────────────────────────────────────────────────────────────

fn setup_logging(use_syslog: bool) -> anyhow::Result<()> {
    if use_syslog {
        let formatter = syslog::Formatter3164 {
            facility: syslog::Facility::LOG_USER,
            hostname: None,
            process:  "origin-ca-client".into(),
            pid:      process::id(),
        };
        let logger = syslog::unix(formatter)
            .map_err(|e| anyhow::anyhow!("syslog connect failed: {e}"))?;
        log::set_boxed_logger(Box::new(syslog::BasicLogger::new(logger)))
            .map(|()| log::set_max_level(log::LevelFilter::Info))
            .map_err(|e| anyhow::anyhow!("set_logger: {e}"))?;
    } else {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Info)
            .init();
    }
    Ok(())
}
