//! # Workspace
//!
//! Private scratch directory for a single fetch.
//!
//! Every reconciliation gets its own uniquely named directory, so concurrent
//! reconciliations (of different workloads, or overlapping retries of the same one)
//! never share a checkout. The directory is removed recursively when the
//! [`Workspace`] is dropped, which covers success, every error return, and
//! cancellation of the owning future.

use crate::constants::WORKSPACE_PREFIX;
use crate::controller::reconciler::types::ReconcilerError;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};

/// Name of the checkout directory inside a workspace
const CHECKOUT_DIR: &str = "repo";

#[derive(Debug)]
pub struct Workspace {
    dir: Option<TempDir>,
}

impl Workspace {
    /// Create a fresh, uniquely named workspace under `base_dir`
    pub fn create(base_dir: &Path) -> Result<Self, ReconcilerError> {
        std::fs::create_dir_all(base_dir).map_err(|e| {
            ReconcilerError::Transient(format!(
                "failed to prepare workspace base directory {}: {e}",
                base_dir.display()
            ))
        })?;

        let dir = tempfile::Builder::new()
            .prefix(WORKSPACE_PREFIX)
            .tempdir_in(base_dir)
            .map_err(|e| {
                ReconcilerError::Transient(format!(
                    "failed to create workspace under {}: {e}",
                    base_dir.display()
                ))
            })?;

        debug!(workspace.path = %dir.path().display(), "Workspace created");
        Ok(Self { dir: Some(dir) })
    }

    /// Root of the workspace
    #[must_use]
    pub fn path(&self) -> &Path {
        // Only `Drop` takes the directory out
        self.dir.as_ref().map_or_else(|| Path::new(""), TempDir::path)
    }

    /// Directory the repository is checked out into
    #[must_use]
    pub fn checkout_dir(&self) -> PathBuf {
        self.path().join(CHECKOUT_DIR)
    }

    /// Resolve a repository-relative path inside the checkout
    #[must_use]
    pub fn resolve(&self, relative: &str) -> PathBuf {
        self.checkout_dir().join(relative)
    }

    /// Resolve a repository-relative path with symlinks followed
    ///
    /// The target must stay inside the checkout; a link pointing anywhere else is a
    /// permanent error. A path that does not exist is returned unresolved so the
    /// reader reports it.
    pub async fn resolve_contained(&self, relative: &str) -> Result<PathBuf, ReconcilerError> {
        let candidate = self.resolve(relative);
        let resolved = match tokio::fs::canonicalize(&candidate).await {
            Ok(resolved) => resolved,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(candidate),
            Err(e) => {
                return Err(ReconcilerError::Permanent(format!(
                    "env file '{relative}' cannot be resolved: {e}"
                )))
            }
        };

        let root = tokio::fs::canonicalize(self.checkout_dir())
            .await
            .map_err(|e| {
                ReconcilerError::Transient(format!("failed to resolve checkout directory: {e}"))
            })?;

        if !resolved.starts_with(&root) {
            warn!(file.path = relative, "Env file links outside the repository");
            return Err(ReconcilerError::Permanent(format!(
                "env file '{relative}' resolves outside the repository"
            )));
        }
        Ok(resolved)
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            let path = dir.path().to_path_buf();
            match dir.close() {
                Ok(()) => debug!(workspace.path = %path.display(), "Workspace removed"),
                Err(e) => warn!(
                    workspace.path = %path.display(),
                    error = %e,
                    "Failed to remove workspace"
                ),
            }
        }
    }
}
