//! # Workloads
//!
//! Identity and snapshot types for the resources this controller reconciles.
//!
//! Two kinds are supported:
//! - `ReplicaSet` (apps/v1), received as a typed object
//! - `Rollout` (argoproj.io/v1alpha1), received as a `DynamicObject`
//!
//! Both are reduced to a [`WorkloadEvent`]: the resource identity, the containers
//! of its pod template as carried by the event, and the annotations that gate injection.

use crate::constants::{
    ANNOTATION_ENABLED, ANNOTATION_PREFIX, ROLLOUT_GROUP, ROLLOUT_KIND, ROLLOUT_VERSION,
};
use crate::controller::reconciler::types::ReconcilerError;
use k8s_openapi::api::apps::v1::ReplicaSet;
use k8s_openapi::api::core::v1::Container;
use kube::api::ApiResource;
use kube::core::{DynamicObject, GroupVersionKind};
use std::collections::BTreeMap;
use std::fmt;

/// Supported workload kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkloadKind {
    ReplicaSet,
    Rollout,
}

impl WorkloadKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkloadKind::ReplicaSet => "ReplicaSet",
            WorkloadKind::Rollout => "Rollout",
        }
    }

    #[must_use]
    pub fn api_group(&self) -> &'static str {
        match self {
            WorkloadKind::ReplicaSet => "apps",
            WorkloadKind::Rollout => ROLLOUT_GROUP,
        }
    }

    #[must_use]
    pub fn api_version(&self) -> &'static str {
        match self {
            WorkloadKind::ReplicaSet => "v1",
            WorkloadKind::Rollout => ROLLOUT_VERSION,
        }
    }
}

impl fmt::Display for WorkloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `ApiResource` for Argo Rollouts, used with `Api<DynamicObject>`
#[must_use]
pub fn rollout_api_resource() -> ApiResource {
    ApiResource::from_gvk(&GroupVersionKind {
        group: ROLLOUT_GROUP.to_string(),
        version: ROLLOUT_VERSION.to_string(),
        kind: ROLLOUT_KIND.to_string(),
    })
}

/// Immutable identity of the object being reconciled
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceRef {
    pub kind: WorkloadKind,
    pub api_group: String,
    pub api_version: String,
    pub namespace: String,
    pub name: String,
}

impl ResourceRef {
    #[must_use]
    pub fn new(kind: WorkloadKind, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind,
            api_group: kind.api_group().to_string(),
            api_version: kind.api_version().to_string(),
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Key used for per-resource bookkeeping (backoff and handled revisions)
    #[must_use]
    pub fn key(&self) -> String {
        format!("{}/{}/{}", self.kind, self.namespace, self.name)
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}/{}", self.kind, self.namespace, self.name)
    }
}

/// Everything a reconciliation receives from the triggering event
#[derive(Debug, Clone)]
pub struct WorkloadEvent {
    pub resource: ResourceRef,
    /// Pod template containers as carried by the event payload
    pub containers: Vec<Container>,
    /// Annotations evaluated by the gate
    pub annotations: BTreeMap<String, String>,
}

impl WorkloadEvent {
    /// The controller's own annotations, i.e. everything the gate looks at
    #[must_use]
    pub fn gate_inputs(&self) -> BTreeMap<String, String> {
        self.annotations
            .iter()
            .filter(|(key, _)| key.starts_with(ANNOTATION_PREFIX))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    /// Build an event from a ReplicaSet
    ///
    /// Annotations come from the pod template metadata.
    pub fn from_replica_set(rs: &ReplicaSet) -> Result<Self, ReconcilerError> {
        let name = rs
            .metadata
            .name
            .clone()
            .ok_or_else(|| ReconcilerError::Permanent("ReplicaSet has no name".to_string()))?;
        let namespace = rs.metadata.namespace.clone().unwrap_or_else(|| "default".to_string());

        let template = rs.spec.as_ref().and_then(|spec| spec.template.as_ref());
        let annotations = template
            .and_then(|t| t.metadata.as_ref())
            .and_then(|m| m.annotations.clone())
            .unwrap_or_default();
        let containers = template
            .and_then(|t| t.spec.as_ref())
            .map(|s| s.containers.clone())
            .unwrap_or_default();

        Ok(Self {
            resource: ResourceRef::new(WorkloadKind::ReplicaSet, namespace, name),
            containers,
            annotations,
        })
    }

    /// Build an event from a Rollout
    ///
    /// Annotations come from the object metadata. When the object metadata does not
    /// carry the enable annotation, the pod template annotations are used instead.
    pub fn from_rollout(rollout: &DynamicObject) -> Result<Self, ReconcilerError> {
        let name = rollout
            .metadata
            .name
            .clone()
            .ok_or_else(|| ReconcilerError::Permanent("Rollout has no name".to_string()))?;
        let namespace = rollout
            .metadata
            .namespace
            .clone()
            .unwrap_or_else(|| "default".to_string());

        let object_annotations = rollout.metadata.annotations.clone().unwrap_or_default();
        let annotations = if object_annotations.contains_key(ANNOTATION_ENABLED) {
            object_annotations
        } else {
            template_annotations(&rollout.data).unwrap_or(object_annotations)
        };

        Ok(Self {
            resource: ResourceRef::new(WorkloadKind::Rollout, namespace, name),
            containers: containers_from_object_data(&rollout.data)?,
            annotations,
        })
    }
}

/// Extract `spec.template.spec.containers` from an untyped object body
///
/// A missing containers list yields an empty vector; a list that does not
/// deserialize into `Container`s is a permanent error.
pub fn containers_from_object_data(
    data: &serde_json::Value,
) -> Result<Vec<Container>, ReconcilerError> {
    match data.pointer("/spec/template/spec/containers") {
        None | Some(serde_json::Value::Null) => Ok(Vec::new()),
        Some(value) => serde_json::from_value(value.clone()).map_err(|e| {
            ReconcilerError::Permanent(format!("pod template containers are malformed: {e}"))
        }),
    }
}

fn template_annotations(data: &serde_json::Value) -> Option<BTreeMap<String, String>> {
    let value = data.pointer("/spec/template/metadata/annotations")?;
    serde_json::from_value(value.clone()).ok()
}
