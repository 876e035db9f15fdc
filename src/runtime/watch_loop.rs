//! # Watch Loop
//!
//! Runs one `kube_runtime::Controller` per enabled workload kind and feeds every
//! create/update event into the injection pipeline.
//!
//! - ReplicaSets are watched through the typed `apps/v1` API.
//! - Rollouts are watched as `DynamicObject`s, so the Argo Rollouts CRD types
//!   are not compiled in.
//!
//! Events whose revision (generation plus gate annotations) already reached a
//! final outcome (status-only updates, resyncs) are acknowledged without fetching
//! anything. A periodic sweep against each controller's cache forgets the state
//! of deleted workloads.

use crate::constants::STATE_PRUNE_INTERVAL_SECS;
use crate::controller::reconciler::{
    reconcile_workload, Credential, HandledRevision, Reconciler, ReconcilerError,
};
use crate::controller::server::ServerState;
use crate::runtime::error_policy::handle_reconciliation_error;
use crate::workload::{rollout_api_resource, ResourceRef, WorkloadEvent, WorkloadKind};
use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt};
use k8s_openapi::api::apps::v1::ReplicaSet;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::Api;
use kube::core::DynamicObject;
use kube::{Client, Resource};
use kube_runtime::controller::{self, Action};
use kube_runtime::reflector::Store;
use kube_runtime::{watcher, Controller};
use std::collections::HashSet;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Run the controller watch loops until a shutdown signal is received
#[allow(
    clippy::missing_errors_doc,
    reason = "Error documentation is provided in doc comments"
)]
pub async fn run_watch_loop(
    client: Client,
    reconciler: Arc<Reconciler>,
    server_state: Arc<ServerState>,
) -> Result<(), anyhow::Error> {
    let config = &reconciler.config;
    let scope = config.watch_namespace.as_deref().unwrap_or("all namespaces");

    let mut watches: Vec<BoxFuture<'static, ()>> = Vec::new();
    if config.watch_replicasets {
        info!("Watching ReplicaSets in {}", scope);
        watches.push(run_replica_set_controller(client.clone(), reconciler.clone()).boxed());
    }
    if config.watch_rollouts {
        info!("Watching Rollouts in {}", scope);
        watches.push(run_rollout_controller(client, reconciler.clone()).boxed());
    }
    if watches.is_empty() {
        return Err(anyhow::anyhow!(
            "No workload kinds enabled: set WATCH_REPLICASETS and/or WATCH_ROLLOUTS"
        ));
    }

    server_state.set_ready(true);
    info!("Controller initialized, watch loops running");

    futures::future::join_all(watches).await;

    server_state.set_ready(false);
    info!("Controller stopped gracefully");
    Ok(())
}

async fn run_replica_set_controller(client: Client, reconciler: Arc<Reconciler>) {
    let api: Api<ReplicaSet> = match &reconciler.config.watch_namespace {
        Some(namespace) => Api::namespaced(client, namespace),
        None => Api::all(client),
    };

    let controller = Controller::new(api, watcher::Config::default());
    let store = controller.store();
    let watch = controller
        .shutdown_on_signal()
        .run(reconcile_replica_set, replica_set_error_policy, reconciler.clone())
        .for_each(|result| {
            log_controller_result(WorkloadKind::ReplicaSet, result);
            futures::future::ready(())
        });

    tokio::select! {
        () = watch => {}
        () = prune_deleted_workloads(WorkloadKind::ReplicaSet, store, reconciler) => {}
    }
}

async fn run_rollout_controller(client: Client, reconciler: Arc<Reconciler>) {
    let resource = rollout_api_resource();
    let api: Api<DynamicObject> = match &reconciler.config.watch_namespace {
        Some(namespace) => Api::namespaced_with(client, namespace, &resource),
        None => Api::all_with(client, &resource),
    };

    let controller = Controller::new_with(api, watcher::Config::default(), resource);
    let store = controller.store();
    let watch = controller
        .shutdown_on_signal()
        .run(reconcile_rollout, rollout_error_policy, reconciler.clone())
        .for_each(|result| {
            log_controller_result(WorkloadKind::Rollout, result);
            futures::future::ready(())
        });

    tokio::select! {
        () = watch => {}
        () = prune_deleted_workloads(WorkloadKind::Rollout, store, reconciler) => {}
    }
}

/// Periodically forget bookkeeping for workloads no longer in the controller cache
///
/// Never returns; it stops when the watch it runs beside finishes.
async fn prune_deleted_workloads<K>(
    kind: WorkloadKind,
    store: Store<K>,
    reconciler: Arc<Reconciler>,
) where
    K: Resource + Clone + 'static,
    K::DynamicType: Eq + Hash + Clone,
{
    if store.wait_until_ready().await.is_err() {
        warn!("{} cache was dropped before it became ready, not pruning", kind);
        return std::future::pending::<()>().await;
    }

    let mut interval = tokio::time::interval(Duration::from_secs(STATE_PRUNE_INTERVAL_SECS));
    loop {
        interval.tick().await;
        let live: HashSet<String> = store
            .state()
            .iter()
            .map(|object| resource_ref(kind, object.meta()).key())
            .collect();
        let pruned = reconciler.prune_deleted(kind, &live);
        if pruned > 0 {
            debug!("Forgot state of {} deleted {}(s)", pruned, kind);
        }
    }
}

async fn reconcile_replica_set(
    rs: Arc<ReplicaSet>,
    ctx: Arc<Reconciler>,
) -> Result<Action, ReconcilerError> {
    let event = WorkloadEvent::from_replica_set(&rs)?;
    reconcile_event(&ctx, &event, rs.metadata.generation, Credential::from_env()).await
}

async fn reconcile_rollout(
    rollout: Arc<DynamicObject>,
    ctx: Arc<Reconciler>,
) -> Result<Action, ReconcilerError> {
    let event = WorkloadEvent::from_rollout(&rollout)?;
    reconcile_event(&ctx, &event, rollout.metadata.generation, Credential::from_env()).await
}

/// Run the pipeline for one event and record final outcomes by revision
///
/// Callers read the credential fresh for every invocation.
async fn reconcile_event(
    ctx: &Reconciler,
    event: &WorkloadEvent,
    generation: Option<i64>,
    credential: Option<Credential>,
) -> Result<Action, ReconcilerError> {
    let key = event.resource.key();
    let revision = generation.map(|generation| HandledRevision {
        generation,
        gate_inputs: event.gate_inputs(),
    });
    if let Some(revision) = &revision {
        if ctx.is_revision_handled(&key, revision) {
            debug!(
                "Generation {} of {} already handled, skipping",
                revision.generation, event.resource
            );
            return Ok(Action::await_change());
        }
    }

    let result = reconcile_workload(ctx, event, credential).await;

    let is_final = match &result {
        Ok(_) => true,
        Err(e) => !e.is_retryable(),
    };
    if is_final {
        if let Some(revision) = revision {
            ctx.mark_revision_handled(&key, revision);
        }
    }

    result?;
    ctx.clear_backoff(&key);
    Ok(Action::await_change())
}

fn replica_set_error_policy(
    rs: Arc<ReplicaSet>,
    error: &ReconcilerError,
    ctx: Arc<Reconciler>,
) -> Action {
    let resource = resource_ref(WorkloadKind::ReplicaSet, &rs.metadata);
    handle_reconciliation_error(&resource, error, &ctx)
}

fn rollout_error_policy(
    rollout: Arc<DynamicObject>,
    error: &ReconcilerError,
    ctx: Arc<Reconciler>,
) -> Action {
    let resource = resource_ref(WorkloadKind::Rollout, &rollout.metadata);
    handle_reconciliation_error(&resource, error, &ctx)
}

fn resource_ref(kind: WorkloadKind, metadata: &ObjectMeta) -> ResourceRef {
    ResourceRef::new(
        kind,
        metadata.namespace.as_deref().unwrap_or("default"),
        metadata.name.as_deref().unwrap_or("unknown"),
    )
}

fn log_controller_result<T: std::fmt::Debug>(
    kind: WorkloadKind,
    result: Result<T, controller::Error<ReconcilerError, watcher::Error>>,
) {
    match result {
        Ok(object) => debug!("{} reconciled: {:?}", kind, object),
        // Already reported by the error policy
        Err(controller::Error::ReconcilerFailed(error, object)) => {
            debug!("{} {} reconcile failed: {}", kind, object.name, error);
        }
        Err(e) => warn!("{} controller stream error: {}", kind, e),
    }
}
