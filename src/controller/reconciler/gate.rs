//! # Annotation Gate
//!
//! Decides whether a workload has opted in to injection and extracts its
//! injection settings from annotations.
//!
//! | Annotation | Meaning | Required |
//! |---|---|---|
//! | `env-inject.gitlab.io/enabled` | must equal `"true"` | yes |
//! | `env-inject.gitlab.io/repo` | https URL of the source repository | yes |
//! | `env-inject.gitlab.io/path` | path of the env file inside the repository | yes |
//! | `env-inject.gitlab.io/ref` | branch or tag | no (`main`) |

use crate::constants::{
    ANNOTATION_ENABLED, ANNOTATION_PATH, ANNOTATION_REF, ANNOTATION_REPO, DEFAULT_REF,
};
use crate::controller::reconciler::fetch::https_host_and_path;
use crate::controller::reconciler::types::ReconcilerError;
use std::collections::BTreeMap;
use std::path::{Component, Path};

/// Injection settings derived from annotations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectionConfig {
    pub repo_url: String,
    pub file_path: String,
    pub git_ref: String,
}

/// Result of evaluating the gate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// The workload has not opted in; nothing to do
    Skip,
    /// Proceed with these settings
    Inject(InjectionConfig),
}

/// Evaluate the opt-in annotations
///
/// Only the literal `"true"` enables injection. Once enabled, missing or invalid
/// settings are permanent failures: no retry will change the annotations.
pub fn evaluate(annotations: &BTreeMap<String, String>) -> Result<GateDecision, ReconcilerError> {
    if annotations.get(ANNOTATION_ENABLED).map(String::as_str) != Some("true") {
        return Ok(GateDecision::Skip);
    }

    let repo_url = non_empty(annotations, ANNOTATION_REPO);
    let file_path = non_empty(annotations, ANNOTATION_PATH);
    let (Some(repo_url), Some(file_path)) = (repo_url, file_path) else {
        return Err(ReconcilerError::Permanent(format!(
            "annotations '{ANNOTATION_REPO}' and '{ANNOTATION_PATH}' are required when '{ANNOTATION_ENABLED}' is \"true\""
        )));
    };

    let git_ref = non_empty(annotations, ANNOTATION_REF).unwrap_or(DEFAULT_REF);

    validate_repo_url(repo_url)?;
    validate_file_path(file_path)?;

    Ok(GateDecision::Inject(InjectionConfig {
        repo_url: repo_url.to_string(),
        file_path: file_path.to_string(),
        git_ref: git_ref.to_string(),
    }))
}

fn non_empty<'a>(annotations: &'a BTreeMap<String, String>, key: &str) -> Option<&'a str> {
    annotations
        .get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

/// The credential is only ever embedded into https URLs with a host
fn validate_repo_url(repo_url: &str) -> Result<(), ReconcilerError> {
    match https_host_and_path(repo_url) {
        Ok(_) => Ok(()),
        Err(ReconcilerError::Permanent(reason) | ReconcilerError::Transient(reason)) => Err(
            ReconcilerError::Permanent(format!("annotation '{ANNOTATION_REPO}' is invalid: {reason}")),
        ),
    }
}

/// The env file must resolve inside the checked-out tree
fn validate_file_path(file_path: &str) -> Result<(), ReconcilerError> {
    let path = Path::new(file_path);
    let escapes = path
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes {
        return Err(ReconcilerError::Permanent(format!(
            "annotation '{ANNOTATION_PATH}' must be a relative path inside the repository, got '{file_path}'"
        )));
    }
    Ok(())
}
