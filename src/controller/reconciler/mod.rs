//! # Reconciler
//!
//! Injects environment variables from a Git-hosted `.env` file into opted-in
//! ReplicaSets and Argo Rollouts.
//!
//! ## Reconciliation Flow
//!
//! 1. `gate`: read the opt-in annotations (skip when not opted in)
//! 2. `fetch`: shallow clone of the requested ref into a private `workspace`
//! 3. `parser`: parse the env file, then release the workspace
//! 4. `target`: read the current containers (live object for Rollouts)
//! 5. `merge`: insert-if-absent into the first container's env
//! 6. `target`: merge-patch the pod template when anything was added

pub mod fetch;
pub mod gate;
pub mod merge;
pub mod reconcile;
pub mod target;
pub mod types;
pub mod workspace;

// Re-export public API
pub use fetch::{Credential, FetchRequest, GitFetcher, RepositoryFetcher};
pub use gate::{GateDecision, InjectionConfig};
pub use merge::merge_env;
pub use reconcile::{reconcile_workload, ReconcileOutcome};
pub use target::{KubeWorkloadApi, PatchBody, Target, WorkloadApi};
pub use types::{BackoffState, HandledRevision, Reconciler, ReconcilerError};
pub use workspace::Workspace;
