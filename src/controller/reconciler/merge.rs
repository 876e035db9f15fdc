//! # Env Merge
//!
//! Insert-if-absent union of a container's environment with parsed `.env` values.

use crate::controller::parser::EnvMap;
use k8s_openapi::api::core::v1::EnvVar;
use std::collections::HashSet;

/// Merge `incoming` into `existing`
///
/// Existing entries are kept untouched and in order (including any duplicates they
/// already contain). Incoming keys whose name is not yet present are appended in
/// the map's iteration order. Merging the same map into the result again is a no-op.
#[must_use]
pub fn merge_env(existing: &[EnvVar], incoming: &EnvMap) -> Vec<EnvVar> {
    let present: HashSet<&str> = existing.iter().map(|e| e.name.as_str()).collect();

    let mut merged = existing.to_vec();
    merged.extend(
        incoming
            .iter()
            .filter(|(name, _)| !present.contains(name))
            .map(|(name, value)| EnvVar {
                name: name.to_string(),
                value: Some(value.to_string()),
                value_from: None,
            }),
    );
    merged
}
