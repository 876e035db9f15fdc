//! # Metrics
//!
//! Prometheus metrics for monitoring the controller.
//!
//! ## Metrics Exposed
//!
//! - `env_inject_reconciliations_total{kind}` - Reconciliations started
//! - `env_inject_reconciliation_outcomes_total{kind,outcome}` - Results (skipped, unchanged, patched, permanent, transient)
//! - `env_inject_reconciliation_duration_seconds` - Duration of reconciliations
//! - `env_inject_git_clone_total` - Checkouts attempted
//! - `env_inject_git_clone_errors_total` - Checkouts that failed or timed out
//! - `env_inject_git_clone_duration_seconds` - Duration of checkouts
//! - `env_inject_env_vars_injected_total` - Environment variables added to workloads
//! - `env_inject_requeues_total{reason}` - Requeues scheduled by the error policy

use anyhow::Result;
use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry};
use std::sync::LazyLock;

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILIATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "env_inject_reconciliations_total",
            "Total number of reconciliations",
        ),
        &["kind"],
    )
    .expect("Failed to create RECONCILIATIONS_TOTAL metric - this should never happen")
});

static RECONCILIATION_OUTCOMES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "env_inject_reconciliation_outcomes_total",
            "Total number of reconciliation results by outcome",
        ),
        &["kind", "outcome"],
    )
    .expect("Failed to create RECONCILIATION_OUTCOMES_TOTAL metric - this should never happen")
});

static RECONCILIATION_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "env_inject_reconciliation_duration_seconds",
            "Duration of reconciliation in seconds",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]),
    )
    .expect("Failed to create RECONCILIATION_DURATION metric - this should never happen")
});

static GIT_CLONE_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "env_inject_git_clone_total",
        "Total number of git clone operations",
    )
    .expect("Failed to create GIT_CLONE_TOTAL metric - this should never happen")
});

static GIT_CLONE_ERRORS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "env_inject_git_clone_errors_total",
        "Total number of failed git clone operations",
    )
    .expect("Failed to create GIT_CLONE_ERRORS_TOTAL metric - this should never happen")
});

static GIT_CLONE_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "env_inject_git_clone_duration_seconds",
            "Duration of git clone operations in seconds",
        )
        .buckets(vec![0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]),
    )
    .expect("Failed to create GIT_CLONE_DURATION metric - this should never happen")
});

static ENV_VARS_INJECTED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "env_inject_env_vars_injected_total",
        "Total number of environment variables added to workloads",
    )
    .expect("Failed to create ENV_VARS_INJECTED_TOTAL metric - this should never happen")
});

static REQUEUES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "env_inject_requeues_total",
            "Total number of requeues scheduled by the error policy",
        ),
        &["reason"],
    )
    .expect("Failed to create REQUEUES_TOTAL metric - this should never happen")
});

/// Register every collector with the shared registry
///
/// Safe to call more than once; collectors that are already registered are skipped.
#[allow(
    clippy::missing_errors_doc,
    reason = "Error documentation is provided in doc comments"
)]
pub fn register_metrics() -> Result<()> {
    register(Box::new(RECONCILIATIONS_TOTAL.clone()))?;
    register(Box::new(RECONCILIATION_OUTCOMES_TOTAL.clone()))?;
    register(Box::new(RECONCILIATION_DURATION.clone()))?;
    register(Box::new(GIT_CLONE_TOTAL.clone()))?;
    register(Box::new(GIT_CLONE_ERRORS_TOTAL.clone()))?;
    register(Box::new(GIT_CLONE_DURATION.clone()))?;
    register(Box::new(ENV_VARS_INJECTED_TOTAL.clone()))?;
    register(Box::new(REQUEUES_TOTAL.clone()))?;

    Ok(())
}

fn register(collector: Box<dyn prometheus::core::Collector>) -> Result<()> {
    match REGISTRY.register(collector) {
        Ok(()) | Err(prometheus::Error::AlreadyReg) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Render the registry in the Prometheus text exposition format
#[allow(
    clippy::missing_errors_doc,
    reason = "Error documentation is provided in doc comments"
)]
pub fn render() -> Result<Vec<u8>> {
    use prometheus::{Encoder, TextEncoder};

    let mut buffer = Vec::new();
    TextEncoder::new().encode(&REGISTRY.gather(), &mut buffer)?;
    Ok(buffer)
}

pub fn increment_reconciliations_total(kind: &str) {
    RECONCILIATIONS_TOTAL.with_label_values(&[kind]).inc();
}

pub fn increment_reconciliation_outcomes_total(kind: &str, outcome: &str) {
    RECONCILIATION_OUTCOMES_TOTAL
        .with_label_values(&[kind, outcome])
        .inc();
}

pub fn observe_reconciliation_duration(duration: f64) {
    RECONCILIATION_DURATION.observe(duration);
}

pub fn increment_git_clone_total() {
    GIT_CLONE_TOTAL.inc();
}

pub fn observe_git_clone_duration(duration: f64) {
    GIT_CLONE_DURATION.observe(duration);
}

pub fn increment_git_clone_errors_total() {
    GIT_CLONE_ERRORS_TOTAL.inc();
}

pub fn increment_env_vars_injected_total(count: u64) {
    ENV_VARS_INJECTED_TOTAL.inc_by(count);
}

pub fn increment_requeues_total(reason: &str) {
    REQUEUES_TOTAL.with_label_values(&[reason]).inc();
}
