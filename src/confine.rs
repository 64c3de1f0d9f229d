//! Filesystem confinement.
//!
//! A [`ServedRoot`] is the closed namespace every lookup happens in. It must be
//! established before the listener binds; nothing downstream touches the
//! filesystem except through it.
//!
//! Two enforcement modes exist and the operator picks one explicitly:
//!
//! - [`Confinement::Chroot`] changes the process root. Requires `CAP_SYS_CHROOT`
//!   (or root); failure aborts start-up.
//! - [`Confinement::Resolve`] needs no privilege. Every candidate path is
//!   canonicalized, following `..` and symlinks, and must land under the
//!   canonical root.
//!
//! Known limitation of `Resolve`: the check and the open are separate calls.
//! The final component is opened with `O_NOFOLLOW`, but a directory that is
//! swapped for a symlink in between can still redirect the open.

use std::io;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use serde::Deserialize;
use thiserror::Error;
use tokio::fs::{File, OpenOptions};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confinement {
    /// OS-level root change
    #[default]
    Chroot,
    /// Canonicalize and prefix-check every lookup
    Resolve,
}

#[derive(Debug, Error)]
pub enum ConfineError {
    #[error("root directory {} does not exist", .0.display())]
    Missing(PathBuf),

    #[error("{} is not a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error("cannot inspect {}", path.display())]
    Stat {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot canonicalize {}", path.display())]
    Canonicalize {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(
        "cannot chroot into {} (needs root or CAP_SYS_CHROOT; see --confinement resolve)",
        path.display()
    )]
    Chroot {
        path: PathBuf,
        #[source]
        source: nix::Error,
    },
}

#[derive(Debug, Clone)]
pub struct ServedRoot {
    base: PathBuf,
    mode: Confinement,
}

impl ServedRoot {
    /// Confines the process to `root_dir` using `mode`.
    ///
    /// With [`Confinement::Chroot`] this is irreversible for the process.
    pub fn establish(root_dir: &Path, mode: Confinement) -> Result<Self, ConfineError> {
        let meta = std::fs::metadata(root_dir).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => ConfineError::Missing(root_dir.to_path_buf()),
            _ => ConfineError::Stat {
                path: root_dir.to_path_buf(),
                source,
            },
        })?;

        if !meta.is_dir() {
            return Err(ConfineError::NotADirectory(root_dir.to_path_buf()));
        }

        match mode {
            Confinement::Chroot => {
                let chroot_err = |source| ConfineError::Chroot {
                    path: root_dir.to_path_buf(),
                    source,
                };
                // chroot(".") after chdir keeps relative root paths correct
                nix::unistd::chdir(root_dir).map_err(chroot_err)?;
                nix::unistd::chroot(".").map_err(chroot_err)?;
                nix::unistd::chdir("/").map_err(chroot_err)?;

                tracing::info!(root = %root_dir.display(), "chrooted into served root");
                Ok(Self {
                    base: PathBuf::from("/"),
                    mode,
                })
            }
            Confinement::Resolve => {
                let base = root_dir.canonicalize().map_err(|source| ConfineError::Canonicalize {
                    path: root_dir.to_path_buf(),
                    source,
                })?;

                tracing::info!(root = %base.display(), "confining lookups by path resolution");
                Ok(Self { base, mode })
            }
        }
    }

    /// Canonical path of the root inside the confined namespace.
    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn mode(&self) -> Confinement {
        self.mode
    }

    /// Resolves `relative` under the root.
    ///
    /// Returns the canonical path, or `None` when it does not exist or escapes
    /// the root.
    pub async fn locate(&self, relative: &Path) -> Option<PathBuf> {
        let candidate = self.base.join(relative);
        let canonical = tokio::fs::canonicalize(&candidate).await.ok()?;

        if canonical.starts_with(&self.base) {
            Some(canonical)
        } else {
            tracing::warn!(path = %candidate.display(), "lookup escapes served root");
            None
        }
    }

    /// Opens a file for reading, re-checking confinement at open time.
    pub async fn open(&self, path: &Path) -> io::Result<File> {
        let canonical = tokio::fs::canonicalize(path).await?;

        if !canonical.starts_with(&self.base) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "path escapes served root",
            ));
        }

        open_no_follow(&canonical).await
    }
}

/// Opens read-only, failing with `ELOOP` if the last component is a symlink.
async fn open_no_follow(path: &Path) -> io::Result<File> {
    OpenOptions::new()
        .read(true)
        .custom_flags(nix::libc::O_NOFOLLOW)
        .open(path)
        .await
}
