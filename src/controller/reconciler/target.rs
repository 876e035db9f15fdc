//! # Targets
//!
//! Kind-specific reading and patching of workloads.
//!
//! - [`Target::Direct`] (ReplicaSet): the containers in the event payload are
//!   merged and patched as-is through the typed `apps/v1` API.
//! - [`Target::Refetch`] (Rollout): the live object is read through the dynamic
//!   API immediately before merging, because progressive-delivery controllers
//!   may have changed the pod template since the event was delivered.
//!
//! Both patch `spec.template.spec.containers` with a JSON merge patch. Merge
//! patches replace arrays wholesale, so the patch always carries the full
//! containers array.

use crate::constants::FIELD_MANAGER;
use crate::controller::reconciler::types::ReconcilerError;
use crate::workload::{
    containers_from_object_data, rollout_api_resource, ResourceRef, WorkloadEvent, WorkloadKind,
};
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::ReplicaSet;
use k8s_openapi::api::core::v1::Container;
use kube::api::{Api, Patch, PatchParams};
use kube::core::DynamicObject;
use kube::Client;
#[cfg(test)]
use mockall::automock;
use serde_json::json;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// JSON merge patch replacing the pod template's containers
#[derive(Debug, Clone, PartialEq)]
pub struct PatchBody(serde_json::Value);

impl PatchBody {
    /// Build `{"spec":{"template":{"spec":{"containers":[...]}}}}`
    pub fn for_containers(containers: &[Container]) -> Result<Self, ReconcilerError> {
        let containers = serde_json::to_value(containers).map_err(|e| {
            ReconcilerError::Permanent(format!("failed to serialize containers: {e}"))
        })?;
        Ok(Self(json!({
            "spec": {
                "template": {
                    "spec": {
                        "containers": containers
                    }
                }
            }
        })))
    }

    #[must_use]
    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }
}

/// Cluster operations needed by the targets
#[cfg_attr(test, automock)]
#[async_trait]
pub trait WorkloadApi: Send + Sync {
    /// Live read of a Rollout's pod template containers
    async fn get_rollout_containers(
        &self,
        resource: &ResourceRef,
    ) -> Result<Vec<Container>, ReconcilerError>;

    /// Merge-patch a ReplicaSet
    async fn patch_replica_set(
        &self,
        resource: &ResourceRef,
        patch: &PatchBody,
    ) -> Result<(), ReconcilerError>;

    /// Merge-patch a Rollout
    async fn patch_rollout(
        &self,
        resource: &ResourceRef,
        patch: &PatchBody,
    ) -> Result<(), ReconcilerError>;
}

/// Per-kind strategy for reading current containers and applying the patch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// Patch the spec already in hand (ReplicaSet)
    Direct,
    /// Re-read the live object before patching (Rollout)
    Refetch,
}

impl Target {
    #[must_use]
    pub fn for_kind(kind: WorkloadKind) -> Self {
        match kind {
            WorkloadKind::ReplicaSet => Target::Direct,
            WorkloadKind::Rollout => Target::Refetch,
        }
    }

    #[must_use]
    pub fn kind(&self) -> WorkloadKind {
        match self {
            Target::Direct => WorkloadKind::ReplicaSet,
            Target::Refetch => WorkloadKind::Rollout,
        }
    }

    /// Containers the merge should start from
    pub async fn current_containers(
        &self,
        api: &dyn WorkloadApi,
        event: &WorkloadEvent,
    ) -> Result<Vec<Container>, ReconcilerError> {
        match self {
            Target::Direct => Ok(event.containers.clone()),
            Target::Refetch => {
                debug!(resource = %event.resource, "Re-reading live object before patching");
                api.get_rollout_containers(&event.resource).await
            }
        }
    }

    /// Issue the patch
    pub async fn apply(
        &self,
        api: &dyn WorkloadApi,
        resource: &ResourceRef,
        patch: &PatchBody,
    ) -> Result<(), ReconcilerError> {
        match self {
            Target::Direct => api.patch_replica_set(resource, patch).await,
            Target::Refetch => api.patch_rollout(resource, patch).await,
        }
    }
}

/// `WorkloadApi` backed by the Kubernetes API server
#[derive(Clone)]
pub struct KubeWorkloadApi {
    client: Client,
    timeout: Duration,
}

impl std::fmt::Debug for KubeWorkloadApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeWorkloadApi")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl KubeWorkloadApi {
    #[must_use]
    pub fn new(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    fn patch_params() -> PatchParams {
        PatchParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..PatchParams::default()
        }
    }

    fn rollouts(&self, namespace: &str) -> Api<DynamicObject> {
        Api::namespaced_with(self.client.clone(), namespace, &rollout_api_resource())
    }
}

#[async_trait]
impl WorkloadApi for KubeWorkloadApi {
    async fn get_rollout_containers(
        &self,
        resource: &ResourceRef,
    ) -> Result<Vec<Container>, ReconcilerError> {
        let api = self.rollouts(&resource.namespace);
        let rollout = bounded(self.timeout, "get", resource, api.get(&resource.name)).await?;
        containers_from_object_data(&rollout.data)
    }

    async fn patch_replica_set(
        &self,
        resource: &ResourceRef,
        patch: &PatchBody,
    ) -> Result<(), ReconcilerError> {
        let api: Api<ReplicaSet> = Api::namespaced(self.client.clone(), &resource.namespace);
        let params = Self::patch_params();
        bounded(
            self.timeout,
            "patch",
            resource,
            api.patch(&resource.name, &params, &Patch::Merge(patch.as_value())),
        )
        .await?;
        Ok(())
    }

    async fn patch_rollout(
        &self,
        resource: &ResourceRef,
        patch: &PatchBody,
    ) -> Result<(), ReconcilerError> {
        let api = self.rollouts(&resource.namespace);
        let params = Self::patch_params();
        bounded(
            self.timeout,
            "patch",
            resource,
            api.patch(&resource.name, &params, &Patch::Merge(patch.as_value())),
        )
        .await?;
        Ok(())
    }
}

/// Run an API call under a deadline; every failure is left to the retry scheduler
async fn bounded<T>(
    timeout: Duration,
    verb: &str,
    resource: &ResourceRef,
    call: impl Future<Output = Result<T, kube::Error>>,
) -> Result<T, ReconcilerError> {
    match tokio::time::timeout(timeout, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(ReconcilerError::Transient(format!(
            "{verb} {resource} failed: {e}"
        ))),
        Err(_elapsed) => Err(ReconcilerError::Transient(format!(
            "{verb} {resource} timed out after {}s",
            timeout.as_secs()
        ))),
    }
}
