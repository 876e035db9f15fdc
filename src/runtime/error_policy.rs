//! # Error Policy
//!
//! Maps reconciliation failures to scheduler actions.
//!
//! - `Permanent`: stop retrying until the object changes (`Action::await_change`)
//! - `Transient`: requeue with Fibonacci backoff tracked per resource

use crate::controller::reconciler::{Reconciler, ReconcilerError};
use crate::observability::metrics;
use crate::workload::ResourceRef;
use kube_runtime::controller::Action;
use std::time::Duration;
use tracing::{error, info, warn};

/// Decide what the scheduler does after a failed reconciliation
pub fn handle_reconciliation_error(
    resource: &ResourceRef,
    error: &ReconcilerError,
    ctx: &Reconciler,
) -> Action {
    let error_span = tracing::span!(
        tracing::Level::ERROR,
        "controller.watch.reconciliation_error",
        resource.kind = resource.kind.as_str(),
        resource.namespace = resource.namespace.as_str(),
        resource.name = resource.name.as_str(),
        error.kind = error.kind()
    );
    let _error_guard = error_span.enter();

    let key = resource.key();
    match error {
        ReconcilerError::Permanent(reason) => {
            error!(
                "❌ Reconciliation of {} failed permanently, waiting for the object to change: {}",
                resource, reason
            );
            ctx.clear_backoff(&key);
            Action::await_change()
        }
        ReconcilerError::Transient(reason) => {
            warn!("Reconciliation of {} failed: {}", resource, reason);

            let (backoff_seconds, error_count) = ctx.next_backoff(&key);
            let next_trigger_time = chrono::Utc::now()
                + chrono::Duration::seconds(i64::try_from(backoff_seconds).unwrap_or(i64::MAX));

            info!(
                "🔄 Retrying with Fibonacci backoff: {}s (error count: {})",
                backoff_seconds, error_count
            );
            info!(
                "📅 Next retry scheduled: {} (in {}s)",
                next_trigger_time.to_rfc3339(),
                backoff_seconds
            );

            metrics::increment_requeues_total("transient");
            Action::requeue(Duration::from_secs(backoff_seconds))
        }
    }
}
