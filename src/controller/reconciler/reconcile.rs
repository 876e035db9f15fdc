//! # Reconciliation Logic
//!
//! One pass of the injection pipeline for a single workload:
//!
//! 1. gate on annotations (skip unless opted in)
//! 2. require the credential
//! 3. check out the repository into a private workspace
//! 4. read and parse the env file, then release the workspace
//! 5. merge into the first container's environment (insert-if-absent)
//! 6. patch the workload when the merge added anything
//!
//! The pass is stateless and idempotent: re-running it against an already
//! injected workload merges nothing and issues no patch.

use crate::constants::CREDENTIAL_ENV_VAR;
use crate::controller::parser::read_env_file;
use crate::controller::reconciler::fetch::{Credential, FetchRequest};
use crate::controller::reconciler::gate::{self, GateDecision};
use crate::controller::reconciler::merge::merge_env;
use crate::controller::reconciler::target::{PatchBody, Target};
use crate::controller::reconciler::types::{Reconciler, ReconcilerError};
use crate::observability::metrics;
use crate::workload::WorkloadEvent;
use std::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument};

/// What a successful reconciliation did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The workload has not opted in
    Skipped,
    /// Every key in the env file was already present
    Unchanged,
    /// The workload was patched with `injected` new variables
    Patched { injected: usize },
}

impl ReconcileOutcome {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconcileOutcome::Skipped => "skipped",
            ReconcileOutcome::Unchanged => "unchanged",
            ReconcileOutcome::Patched { .. } => "patched",
        }
    }
}

/// Reconcile one workload event
///
/// The credential is read by the caller at the start of each invocation and
/// passed in explicitly; `None` means it is not configured.
pub async fn reconcile_workload(
    ctx: &Reconciler,
    event: &WorkloadEvent,
    credential: Option<Credential>,
) -> Result<ReconcileOutcome, ReconcilerError> {
    let start = Instant::now();
    let kind = event.resource.kind.as_str();
    metrics::increment_reconciliations_total(kind);

    let span = info_span!(
        "reconcile",
        resource.kind = kind,
        resource.namespace = event.resource.namespace.as_str(),
        resource.name = event.resource.name.as_str()
    );
    let result = reconcile_internal(ctx, event, credential)
        .instrument(span)
        .await;

    metrics::observe_reconciliation_duration(start.elapsed().as_secs_f64());
    let outcome = match &result {
        Ok(outcome) => outcome.as_str(),
        Err(e) => e.kind(),
    };
    metrics::increment_reconciliation_outcomes_total(kind, outcome);

    result
}

async fn reconcile_internal(
    ctx: &Reconciler,
    event: &WorkloadEvent,
    credential: Option<Credential>,
) -> Result<ReconcileOutcome, ReconcilerError> {
    let config = match gate::evaluate(&event.annotations)? {
        GateDecision::Skip => {
            debug!("{} has not opted in, skipping", event.resource);
            return Ok(ReconcileOutcome::Skipped);
        }
        GateDecision::Inject(config) => config,
    };

    let Some(credential) = credential else {
        warn!("{CREDENTIAL_ENV_VAR} is not set, cannot fetch env file for {}", event.resource);
        return Err(ReconcilerError::Permanent(format!(
            "credential environment variable {CREDENTIAL_ENV_VAR} is not set"
        )));
    };

    info!(
        "🔄 Reconciling {} (repo: {}, ref: {}, path: {})",
        event.resource, config.repo_url, config.git_ref, config.file_path
    );

    let request = FetchRequest {
        repo_url: config.repo_url.clone(),
        git_ref: config.git_ref.clone(),
    };

    // The workspace only lives for the read
    let env = {
        let workspace = ctx.fetcher.fetch(&request, &credential).await?;
        let path = workspace.resolve_contained(&config.file_path).await?;
        read_env_file(&path, &config.file_path).await?
    };
    drop(credential);

    let target = Target::for_kind(event.resource.kind);
    let mut containers = target
        .current_containers(ctx.workloads.as_ref(), event)
        .await?;

    let Some(first) = containers.first_mut() else {
        return Err(ReconcilerError::Permanent(format!(
            "{} has no containers in its pod template",
            event.resource
        )));
    };

    let existing = first.env.as_deref().unwrap_or_default();
    let merged = merge_env(existing, &env);
    let injected = merged.len() - existing.len();

    if injected == 0 {
        info!(
            "✅ {} already has all {} variable(s) from {}",
            event.resource,
            env.len(),
            config.file_path
        );
        return Ok(ReconcileOutcome::Unchanged);
    }

    first.env = Some(merged);
    let patch = PatchBody::for_containers(&containers)?;
    target
        .apply(ctx.workloads.as_ref(), &event.resource, &patch)
        .await?;

    metrics::increment_env_vars_injected_total(injected as u64);
    info!(
        "✅ Injected {} variable(s) into container '{}' of {}",
        injected, containers[0].name, event.resource
    );
    Ok(ReconcileOutcome::Patched { injected })
}
