//! # Initialization
//!
//! Controller initialization logic including rustls setup, tracing, metrics,
//! server startup, and Kubernetes client setup.

use crate::config::ControllerConfig;
use crate::controller::reconciler::{Credential, GitFetcher, KubeWorkloadApi, Reconciler};
use crate::controller::server::{start_server, ServerState};
use crate::observability;
use anyhow::{Context, Result};
use kube::Client;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Initialization result containing all necessary components for the controller
pub struct InitializationResult {
    /// Kubernetes client
    pub client: Client,
    /// Reconciler context
    pub reconciler: Arc<Reconciler>,
    /// Server state for health checks
    pub server_state: Arc<ServerState>,
}

impl std::fmt::Debug for InitializationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitializationResult")
            .field("reconciler", &self.reconciler)
            .field("server_ready", &self.server_state.ready())
            .finish_non_exhaustive()
    }
}

/// Initialize the controller runtime
///
/// This function handles:
/// - rustls crypto provider setup
/// - Tracing subscriber setup
/// - Metrics registration
/// - HTTP server startup
/// - Kubernetes client creation
/// - Reconciler setup
#[allow(
    clippy::missing_errors_doc,
    reason = "Error documentation is provided in doc comments"
)]
pub async fn initialize() -> Result<InitializationResult> {
    // Must happen before any TLS connection is made
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        return Err(anyhow::anyhow!("Failed to install rustls crypto provider"));
    }

    observability::init_logging()?;

    info!("Starting env-inject controller v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Build info: timestamp={}, datetime={}, git_hash={}",
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_DATETIME"),
        env!("BUILD_GIT_HASH")
    );

    let config = ControllerConfig::from_env();
    info!(
        "Configuration: git={}, workspaces={}, fetch_timeout={}s, api_timeout={}s, backoff={}-{}m",
        config.git_binary.display(),
        config.workspace_base_dir.display(),
        config.fetch_timeout_secs,
        config.api_timeout_secs,
        config.backoff_min_minutes,
        config.backoff_max_minutes
    );

    // Only presence is checked here; each reconciliation re-reads the value
    if Credential::from_env().is_none() {
        warn!(
            "{} is not set; opted-in workloads will fail until it is provided",
            crate::constants::CREDENTIAL_ENV_VAR
        );
    }

    observability::register_metrics()?;

    let server_state = Arc::new(ServerState::default());
    let server_state_clone = server_state.clone();
    let server_port = config.metrics_port;
    tokio::spawn(async move {
        if let Err(e) = start_server(server_port, server_state_clone).await {
            error!("HTTP server error: {}", e);
        }
    });

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;

    let fetcher = Arc::new(GitFetcher::new(
        config.git_binary.clone(),
        config.workspace_base_dir.clone(),
        config.fetch_timeout(),
    ));
    let workloads = Arc::new(KubeWorkloadApi::new(client.clone(), config.api_timeout()));
    let reconciler = Arc::new(Reconciler::new(config, fetcher, workloads));

    Ok(InitializationResult {
        client,
        reconciler,
        server_state,
    })
}
