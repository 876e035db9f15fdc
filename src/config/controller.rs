//! # Controller Configuration
//!
//! Controller-level settings loaded from environment variables.

use std::path::PathBuf;
use std::time::Duration;

/// Controller-level configuration
///
/// All settings have sensible defaults and can be overridden via environment variables.
/// The repository credential is deliberately not part of this struct: it is read
/// at the start of every reconciliation so a rotated token takes effect without restart.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Path to the git executable used for checkouts
    pub git_binary: PathBuf,
    /// Parent directory for per-reconciliation workspaces
    pub workspace_base_dir: PathBuf,
    /// Upper bound on a single checkout (seconds)
    pub fetch_timeout_secs: u64,
    /// Upper bound on a single cluster API call (seconds)
    pub api_timeout_secs: u64,
    /// HTTP server port for metrics and probes
    pub metrics_port: u16,
    /// Requeue interval used when backoff state is unavailable (seconds)
    pub reconciliation_error_requeue_secs: u64,
    /// Fibonacci backoff floor for transient failures (minutes)
    pub backoff_min_minutes: u64,
    /// Fibonacci backoff ceiling for transient failures (minutes)
    pub backoff_max_minutes: u64,
    /// Watch ReplicaSets (apps/v1)
    pub watch_replicasets: bool,
    /// Watch Rollouts (argoproj.io/v1alpha1)
    pub watch_rollouts: bool,
    /// Restrict watches to a single namespace; `None` watches all namespaces
    pub watch_namespace: Option<String>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        use crate::constants::*;
        Self {
            git_binary: PathBuf::from("git"),
            workspace_base_dir: std::env::temp_dir(),
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
            api_timeout_secs: DEFAULT_API_TIMEOUT_SECS,
            metrics_port: DEFAULT_METRICS_PORT,
            reconciliation_error_requeue_secs: DEFAULT_RECONCILIATION_ERROR_REQUEUE_SECS,
            backoff_min_minutes: DEFAULT_BACKOFF_MIN_MINUTES,
            backoff_max_minutes: DEFAULT_BACKOFF_MAX_MINUTES,
            watch_replicasets: true,
            watch_rollouts: true,
            watch_namespace: None,
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        use crate::constants::*;
        Self {
            git_binary: std::env::var("GIT_BINARY")
                .map(PathBuf::from)
                .ok()
                .or_else(|| which::which("git").ok())
                .unwrap_or_else(|| PathBuf::from("git")),
            workspace_base_dir: std::env::var("WORKSPACE_BASE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| std::env::temp_dir()),
            fetch_timeout_secs: env_var_or_default(
                "FETCH_TIMEOUT_SECS",
                DEFAULT_FETCH_TIMEOUT_SECS,
            ),
            api_timeout_secs: env_var_or_default("API_TIMEOUT_SECS", DEFAULT_API_TIMEOUT_SECS),
            metrics_port: env_var_or_default("METRICS_PORT", DEFAULT_METRICS_PORT),
            reconciliation_error_requeue_secs: env_var_or_default(
                "RECONCILIATION_ERROR_REQUEUE_SECS",
                DEFAULT_RECONCILIATION_ERROR_REQUEUE_SECS,
            ),
            backoff_min_minutes: env_var_or_default(
                "BACKOFF_MIN_MINUTES",
                DEFAULT_BACKOFF_MIN_MINUTES,
            ),
            backoff_max_minutes: env_var_or_default(
                "BACKOFF_MAX_MINUTES",
                DEFAULT_BACKOFF_MAX_MINUTES,
            ),
            watch_replicasets: env_var_or_default_bool("WATCH_REPLICASETS", true),
            watch_rollouts: env_var_or_default_bool("WATCH_ROLLOUTS", true),
            watch_namespace: std::env::var("WATCH_NAMESPACE")
                .ok()
                .filter(|ns| !ns.trim().is_empty()),
        }
    }

    /// Get checkout timeout duration
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// Get cluster API call timeout duration
    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api_timeout_secs)
    }
}

/// Read environment variable or return default value
fn env_var_or_default<T: std::str::FromStr>(key: &str, default: T) -> T
where
    <T as std::str::FromStr>::Err: std::fmt::Debug,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Read environment variable as boolean or return default
fn env_var_or_default_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|v| {
            let v_lower = v.to_lowercase();
            v_lower == "true" || v_lower == "1" || v_lower == "yes" || v_lower == "on"
        })
        .unwrap_or(default)
}
