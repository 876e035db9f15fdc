//! # Secure Fetch
//!
//! Shallow, single-branch checkout of the source repository into a fresh
//! [`Workspace`], authenticated with a bearer token embedded in the clone URL
//! (`https://oauth2:<token>@host/...`).
//!
//! The token never leaves this module in readable form: it is not logged, and any
//! git output surfaced in an error is redacted first.

use crate::constants::{CREDENTIAL_ENV_VAR, CREDENTIAL_USERNAME};
use crate::controller::reconciler::types::ReconcilerError;
use crate::controller::reconciler::workspace::Workspace;
use crate::observability::metrics;
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tracing::{debug, info, info_span, warn, Instrument};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Repository access token
///
/// Wiped from memory on drop; `Debug` never prints the value.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Credential(String);

impl Credential {
    /// Wrap a token; blank tokens are treated as absent
    #[must_use]
    pub fn new(token: impl Into<String>) -> Option<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            None
        } else {
            Some(Self(token.trim().to_string()))
        }
    }

    /// Read the credential from the process environment
    ///
    /// Called at the start of every reconciliation so a rotated token is picked up
    /// without a restart.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        std::env::var(CREDENTIAL_ENV_VAR).ok().and_then(Self::new)
    }

    fn expose(&self) -> &str {
        &self.0
    }

    /// Replace every occurrence of the token in `message`
    #[must_use]
    pub fn redact(&self, message: &str) -> String {
        message.replace(self.expose(), "***")
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// What to fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub repo_url: String,
    pub git_ref: String,
}

/// Split an https repository URL into host and path, dropping any userinfo
///
/// The authority is everything before the first `/`; userinfo ends at its last `@`.
/// A URL that is not https or has an empty host is permanently invalid.
pub fn https_host_and_path(repo_url: &str) -> Result<(&str, &str), ReconcilerError> {
    let Some(rest) = repo_url.strip_prefix("https://") else {
        return Err(ReconcilerError::Permanent(
            "repository URL must use https".to_string(),
        ));
    };

    let (authority, path) = rest.split_at(rest.find('/').unwrap_or(rest.len()));
    let host = authority.rsplit_once('@').map_or(authority, |(_, host)| host);
    if host.is_empty() {
        return Err(ReconcilerError::Permanent(
            "repository URL has no host".to_string(),
        ));
    }
    Ok((host, path))
}

/// Embed the credential into an https URL using basic-auth-in-URL
///
/// Any userinfo already present in the URL is replaced.
pub fn authenticated_url(repo_url: &str, credential: &Credential) -> Result<String, ReconcilerError> {
    let (host, path) = https_host_and_path(repo_url)?;
    Ok(format!(
        "https://{CREDENTIAL_USERNAME}:{}@{host}{path}",
        credential.expose()
    ))
}

/// Checkout abstraction so orchestration can be tested without git or network
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RepositoryFetcher: Send + Sync {
    /// Check out `request.git_ref` of `request.repo_url` into a new workspace
    ///
    /// On success the caller owns a live workspace; on failure no workspace survives.
    async fn fetch(
        &self,
        request: &FetchRequest,
        credential: &Credential,
    ) -> Result<Workspace, ReconcilerError>;
}

/// Fetcher that shells out to the `git` executable
#[derive(Debug, Clone)]
pub struct GitFetcher {
    git_binary: PathBuf,
    workspace_base_dir: PathBuf,
    timeout: Duration,
}

impl GitFetcher {
    #[must_use]
    pub fn new(git_binary: PathBuf, workspace_base_dir: PathBuf, timeout: Duration) -> Self {
        Self {
            git_binary,
            workspace_base_dir,
            timeout,
        }
    }
}

#[async_trait]
impl RepositoryFetcher for GitFetcher {
    async fn fetch(
        &self,
        request: &FetchRequest,
        credential: &Credential,
    ) -> Result<Workspace, ReconcilerError> {
        let url = authenticated_url(&request.repo_url, credential)?;
        let workspace = Workspace::create(&self.workspace_base_dir)?;
        let checkout_dir = workspace.checkout_dir();

        let span = info_span!(
            "git.clone",
            repository.url = request.repo_url.as_str(),
            revision = request.git_ref.as_str(),
            clone.path = %checkout_dir.display()
        );

        let start = Instant::now();
        metrics::increment_git_clone_total();

        // kill_on_drop terminates the child when this future is dropped (timeout or
        // cancellation); the workspace is then dropped with it.
        let mut clone_cmd = tokio::process::Command::new(&self.git_binary);
        clone_cmd
            .arg("clone")
            .arg("--depth")
            .arg("1")
            .arg("--single-branch")
            .arg("--branch")
            .arg(&request.git_ref)
            .arg(&url)
            .arg(&checkout_dir)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let result = async {
            info!(
                "Cloning {} (revision: {})",
                request.repo_url, request.git_ref
            );
            tokio::time::timeout(self.timeout, clone_cmd.output()).await
        }
        .instrument(span)
        .await;

        metrics::observe_git_clone_duration(start.elapsed().as_secs_f64());

        let output = match result {
            Err(_elapsed) => {
                metrics::increment_git_clone_errors_total();
                warn!(
                    "Clone of {} timed out after {}s",
                    request.repo_url,
                    self.timeout.as_secs()
                );
                return Err(ReconcilerError::Transient(format!(
                    "clone of {} timed out after {}s",
                    request.repo_url,
                    self.timeout.as_secs()
                )));
            }
            Ok(Err(e)) => {
                metrics::increment_git_clone_errors_total();
                return Err(ReconcilerError::Transient(format!(
                    "failed to run {}: {}",
                    self.git_binary.display(),
                    credential.redact(&e.to_string())
                )));
            }
            Ok(Ok(output)) => output,
        };

        if !output.status.success() {
            metrics::increment_git_clone_errors_total();
            let stderr = credential.redact(String::from_utf8_lossy(&output.stderr).trim());
            return Err(classify_clone_failure(request, &stderr));
        }

        debug!(
            "Cloned {} (revision: {}) in {:.2}s",
            request.repo_url,
            request.git_ref,
            start.elapsed().as_secs_f64()
        );
        Ok(workspace)
    }
}

/// Classify a failed clone from its (already redacted) stderr
///
/// A ref that does not exist will not appear on retry, so it is permanent.
/// Everything else (network, TLS, authentication) is transient.
#[must_use]
pub fn classify_clone_failure(request: &FetchRequest, stderr: &str) -> ReconcilerError {
    let lower = stderr.to_lowercase();
    let ref_missing = (lower.contains("remote branch") && lower.contains("not found"))
        || lower.contains("couldn't find remote ref");

    if ref_missing {
        ReconcilerError::Permanent(format!(
            "ref '{}' not found in {}: {}",
            request.git_ref, request.repo_url, stderr
        ))
    } else {
        ReconcilerError::Transient(format!(
            "clone of {} (ref '{}') failed: {}",
            request.repo_url, request.git_ref, stderr
        ))
    }
}
