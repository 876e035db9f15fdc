//! # Constants
//!
//! Shared constants used throughout the controller.
//!
//! These values represent reasonable defaults and can be overridden via
//! configuration or environment variables where applicable.

/// Prefix shared by every annotation this controller reads
pub const ANNOTATION_PREFIX: &str = "env-inject.gitlab.io/";

/// Annotation that must equal `"true"` for a workload to opt in
pub const ANNOTATION_ENABLED: &str = "env-inject.gitlab.io/enabled";

/// Annotation naming the source repository (https URL)
pub const ANNOTATION_REPO: &str = "env-inject.gitlab.io/repo";

/// Annotation naming the `.env` file path inside the repository
pub const ANNOTATION_PATH: &str = "env-inject.gitlab.io/path";

/// Annotation naming the branch or tag to fetch
pub const ANNOTATION_REF: &str = "env-inject.gitlab.io/ref";

/// Ref used when the ref annotation is absent
pub const DEFAULT_REF: &str = "main";

/// Environment variable holding the repository access token
pub const CREDENTIAL_ENV_VAR: &str = "GITLAB_TOKEN";

/// Username embedded in authenticated clone URLs
pub const CREDENTIAL_USERNAME: &str = "oauth2";

/// Prefix for per-reconciliation workspace directories
pub const WORKSPACE_PREFIX: &str = "env-inject-";

/// Default HTTP server port for metrics and health probes
pub const DEFAULT_METRICS_PORT: u16 = 5000;

/// Default bound on a single checkout (seconds)
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 60;

/// Default bound on a single cluster API call (seconds)
pub const DEFAULT_API_TIMEOUT_SECS: u64 = 30;

/// Default requeue interval for reconciliation errors (seconds)
pub const DEFAULT_RECONCILIATION_ERROR_REQUEUE_SECS: u64 = 60;

/// Default Fibonacci backoff floor (minutes)
pub const DEFAULT_BACKOFF_MIN_MINUTES: u64 = 1;

/// Default Fibonacci backoff ceiling (minutes)
pub const DEFAULT_BACKOFF_MAX_MINUTES: u64 = 10;

/// Argo Rollouts API group
pub const ROLLOUT_GROUP: &str = "argoproj.io";

/// Argo Rollouts API version
pub const ROLLOUT_VERSION: &str = "v1alpha1";

/// Argo Rollouts kind
pub const ROLLOUT_KIND: &str = "Rollout";

/// Interval between sweeps that forget state of deleted workloads (seconds)
pub const STATE_PRUNE_INTERVAL_SECS: u64 = 300;

/// Field manager recorded on patches issued by this controller
pub const FIELD_MANAGER: &str = "env-inject-controller";
