//! Artifact persistence: writes, permission modes, ownership.
//!
//! Every artifact is written first, then chmodded, then (when configured)
//! chowned; dependent stages only read an artifact after that sequence
//! completes.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use log::info;
use nix::unistd::{chown, Gid, Group, Uid, User};

use crate::config::Ownership;
use crate::error::FilesystemError;

/// Mode for key and CSR files: owner read/write, group read.
pub const MODE_PRIVATE: u32 = 0o640;
/// Mode for certificate and bundle files: world-readable.
pub const MODE_PUBLIC: u32 = 0o644;

fn fs_err(op: &'static str, path: &Path, source: std::io::Error) -> FilesystemError {
    FilesystemError { op, path: path.to_path_buf(), source }
}

/// Set mode and (when configured) ownership on an existing artifact.
pub async fn apply_access(
    path:      &Path,
    mode:      u32,
    ownership: Option<&Ownership>,
) -> Result<(), FilesystemError> {
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
        .await
        .map_err(|e| fs_err("chmod", path, e))?;

    if let Some(owner) = ownership {
        let (uid, gid) = resolve_owner(owner).map_err(|e| fs_err("chown", path, e))?;
        chown(path, Some(uid), Some(gid))
            .map_err(|errno| fs_err("chown", path, errno.into()))?;
    }
    Ok(())
}

fn resolve_owner(owner: &Ownership) -> std::io::Result<(Uid, Gid)> {
    let user = User::from_name(&owner.user)
        .map_err(std::io::Error::from)?
        .ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no such user: {}", owner.user),
            )
        })?;
    let group = Group::from_name(&owner.group)
        .map_err(std::io::Error::from)?
        .ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no such group: {}", owner.group),
            )
        })?;
    Ok((user.uid, group.gid))
}

/// Write `bytes` to `path`, then apply mode and ownership.
pub async fn write_artifact(
    path:      &Path,
    bytes:     &[u8],
    mode:      u32,
    ownership: Option<&Ownership>,
) -> Result<(), FilesystemError> {
    tokio::fs::write(path, bytes)
        .await
        .map_err(|e| fs_err("write", path, e))?;
    apply_access(path, mode, ownership).await
}

/// Persist the issued leaf certificate.
pub async fn persist_certificate(
    cert_dir:  &Path,
    base_name: &str,
    pem:       &str,
    ownership: Option<&Ownership>,
) -> Result<PathBuf, FilesystemError> {
    let path = cert_dir.join(format!("{base_name}.crt"));
    write_artifact(&path, pem.as_bytes(), MODE_PUBLIC, ownership).await?;
    info!("certificate saved: {}", path.display());
    Ok(path)
}

/// Persist the leaf+root trust bundle: the leaf PEM followed by the root
/// PEM, raw concatenation.
pub async fn persist_bundle(
    cert_dir:  &Path,
    base_name: &str,
    leaf_pem:  &str,
    root_pem:  &str,
    ownership: Option<&Ownership>,
) -> Result<PathBuf, FilesystemError> {
    let path = cert_dir.join(format!("{base_name}-bundle.crt"));
    let bundle = format!("{leaf_pem}{root_pem}");
    write_artifact(&path, bundle.as_bytes(), MODE_PUBLIC, ownership).await?;
    info!("bundle saved: {}", path.display());
    Ok(path)
}

/// Delete the transient CSR after successful submission.
pub async fn discard_csr(path: &Path) -> Result<(), FilesystemError> {
    tokio::fs::remove_file(path)
        .await
        .map_err(|e| fs_err("remove", path, e))?;
    info!("CSR discarded: {}", path.display());
    Ok(())
}
