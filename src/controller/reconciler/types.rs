//! # Types
//!
//! Core types for the reconciler.

use crate::config::ControllerConfig;
use crate::controller::backoff::FibonacciBackoff;
use crate::controller::reconciler::fetch::RepositoryFetcher;
use crate::controller::reconciler::target::WorkloadApi;
use crate::workload::WorkloadKind;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Reconciliation failure, classified by whether a retry can help
///
/// Messages never contain credential material.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReconcilerError {
    /// Configuration is invalid or incomplete; retrying cannot succeed
    #[error("permanent failure: {0}")]
    Permanent(String),
    /// Infrastructure hiccup; the same operation may succeed later
    #[error("transient failure: {0}")]
    Transient(String),
}

impl ReconcilerError {
    /// Whether the scheduler should retry this reconciliation
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, ReconcilerError::Transient(_))
    }

    /// Stable label for logs and metrics
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            ReconcilerError::Permanent(_) => "permanent",
            ReconcilerError::Transient(_) => "transient",
        }
    }
}

/// Backoff state for a specific resource
/// Tracks error count and backoff calculator for progressive retries
#[derive(Debug, Clone)]
pub struct BackoffState {
    pub backoff: FibonacciBackoff,
    pub error_count: u32,
}

impl BackoffState {
    pub fn new(min_minutes: u64, max_minutes: u64) -> Self {
        Self {
            backoff: FibonacciBackoff::new(min_minutes, max_minutes),
            error_count: 0,
        }
    }

    pub fn increment_error(&mut self) {
        self.error_count += 1;
    }

    pub fn reset(&mut self) {
        self.error_count = 0;
        self.backoff.reset();
    }
}

/// What a reconciliation saw: the object generation and the gate annotations
///
/// Annotation edits do not bump `metadata.generation`, so both are compared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandledRevision {
    pub generation: i64,
    pub gate_inputs: BTreeMap<String, String>,
}

/// Shared reconciliation context
///
/// Holds collaborators and configuration plus per-resource bookkeeping: backoff
/// state for the error policy and handled revisions for the watch loop. Both maps
/// are pruned of deleted workloads by the watch loop.
#[derive(Clone)]
pub struct Reconciler {
    pub config: ControllerConfig,
    pub fetcher: Arc<dyn RepositoryFetcher>,
    pub workloads: Arc<dyn WorkloadApi>,
    // Backoff state per resource (identified by kind/namespace/name)
    // Owned by the error policy layer so failures never block the watch path
    pub backoff_states: Arc<Mutex<HashMap<String, BackoffState>>>,
    // Last revision per resource that reached a final outcome
    // (success, skip, or permanent failure); status-only updates are ignored
    pub handled_revisions: Arc<Mutex<HashMap<String, HandledRevision>>>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    pub fn new(
        config: ControllerConfig,
        fetcher: Arc<dyn RepositoryFetcher>,
        workloads: Arc<dyn WorkloadApi>,
    ) -> Self {
        Self {
            config,
            fetcher,
            workloads,
            backoff_states: Arc::new(Mutex::new(HashMap::new())),
            handled_revisions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Forget the backoff history of a resource
    pub fn clear_backoff(&self, resource_key: &str) {
        if let Ok(mut states) = self.backoff_states.lock() {
            states.remove(resource_key);
        }
    }

    /// Next transient-failure delay for a resource, advancing its backoff
    ///
    /// Returns the delay in seconds and the consecutive error count. Falls back
    /// to the fixed requeue interval if the state lock is poisoned.
    pub fn next_backoff(&self, resource_key: &str) -> (u64, u32) {
        match self.backoff_states.lock() {
            Ok(mut states) => {
                let state = states.entry(resource_key.to_string()).or_insert_with(|| {
                    BackoffState::new(
                        self.config.backoff_min_minutes,
                        self.config.backoff_max_minutes,
                    )
                });
                state.increment_error();
                (state.backoff.next_backoff_seconds(), state.error_count)
            }
            Err(_poisoned) => (self.config.reconciliation_error_requeue_secs, 0),
        }
    }

    /// Whether this revision of a resource already reached a final outcome
    pub fn is_revision_handled(&self, resource_key: &str, revision: &HandledRevision) -> bool {
        self.handled_revisions
            .lock()
            .map(|handled| handled.get(resource_key) == Some(revision))
            .unwrap_or(false)
    }

    /// Record that this revision of a resource reached a final outcome
    pub fn mark_revision_handled(&self, resource_key: &str, revision: HandledRevision) {
        if let Ok(mut handled) = self.handled_revisions.lock() {
            handled.insert(resource_key.to_string(), revision);
        }
    }

    /// Forget every `kind` entry whose key is not in `live_keys`
    ///
    /// Returns how many resources were forgotten.
    pub fn prune_deleted(&self, kind: WorkloadKind, live_keys: &HashSet<String>) -> usize {
        let prefix = format!("{kind}/");
        let is_stale = |key: &String| key.starts_with(&prefix) && !live_keys.contains(key);

        let mut stale = HashSet::new();
        if let Ok(mut handled) = self.handled_revisions.lock() {
            stale.extend(handled.keys().filter(|&key| is_stale(key)).cloned());
            handled.retain(|key, _| !is_stale(key));
        }
        if let Ok(mut states) = self.backoff_states.lock() {
            stale.extend(states.keys().filter(|&key| is_stale(key)).cloned());
            states.retain(|key, _| !is_stale(key));
        }
        stale.len()
    }
}
