//! Common test utilities for integration tests
//!
//! Provides an in-memory `WorkloadApi`, a stand-in `git` executable, and
//! builders for annotated workloads.

#![allow(dead_code, reason = "Not every test file uses every helper")]

use async_trait::async_trait;
use env_inject_controller::config::ControllerConfig;
use env_inject_controller::constants::{ANNOTATION_ENABLED, ANNOTATION_PATH, ANNOTATION_REPO};
use env_inject_controller::controller::reconciler::{
    PatchBody, Reconciler, ReconcilerError, RepositoryFetcher, WorkloadApi,
};
use env_inject_controller::workload::ResourceRef;
use k8s_openapi::api::core::v1::{Container, EnvVar};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

pub const REPO_URL: &str = "https://gitlab.example.com/platform/env.git";
pub const TOKEN: &str = "glpat-integration-token";

/// Records patches and serves live Rollout containers from memory
#[derive(Debug, Default)]
pub struct InMemoryWorkloads {
    pub live_rollout_containers: Mutex<Vec<Container>>,
    pub patches: Mutex<Vec<(ResourceRef, serde_json::Value)>>,
    pub fail_patches_with: Mutex<Option<ReconcilerError>>,
}

impl InMemoryWorkloads {
    pub fn patches(&self) -> Vec<(ResourceRef, serde_json::Value)> {
        self.patches.lock().unwrap().clone()
    }

    fn record(&self, resource: &ResourceRef, patch: &PatchBody) -> Result<(), ReconcilerError> {
        if let Some(e) = self.fail_patches_with.lock().unwrap().clone() {
            return Err(e);
        }
        self.patches
            .lock()
            .unwrap()
            .push((resource.clone(), patch.as_value().clone()));
        Ok(())
    }
}

#[async_trait]
impl WorkloadApi for InMemoryWorkloads {
    async fn get_rollout_containers(
        &self,
        _resource: &ResourceRef,
    ) -> Result<Vec<Container>, ReconcilerError> {
        Ok(self.live_rollout_containers.lock().unwrap().clone())
    }

    async fn patch_replica_set(
        &self,
        resource: &ResourceRef,
        patch: &PatchBody,
    ) -> Result<(), ReconcilerError> {
        self.record(resource, patch)
    }

    async fn patch_rollout(
        &self,
        resource: &ResourceRef,
        patch: &PatchBody,
    ) -> Result<(), ReconcilerError> {
        self.record(resource, patch)
    }
}

/// Write an executable that behaves like `git clone` for the given files
///
/// The script receives `clone --depth 1 --single-branch --branch <ref> <url> <dest>`,
/// records its arguments next to itself, and writes `files` into `<dest>`.
/// A ref named `missing` fails the way git does for unknown branches.
#[cfg(unix)]
pub fn fake_git(dir: &Path, files: &[(&str, &str)]) -> PathBuf {
    use std::fmt::Write as _;

    let mut body = String::new();
    for (path, content) in files {
        mkdir_parent(&mut body, path);
        let _ = writeln!(body, "cat > \"$dest/{path}\" <<'ENVEOF'\n{content}\nENVEOF");
    }
    write_git_script(dir, &body)
}

/// Like [`fake_git`], but the checkout contains `link` as a symlink to `target`
#[cfg(unix)]
pub fn fake_git_with_symlink(dir: &Path, link: &str, target: &Path) -> PathBuf {
    use std::fmt::Write as _;

    let mut body = String::new();
    mkdir_parent(&mut body, link);
    let _ = writeln!(body, "ln -s \"{}\" \"$dest/{link}\"", target.display());
    write_git_script(dir, &body)
}

#[cfg(unix)]
fn mkdir_parent(body: &mut String, path: &str) {
    use std::fmt::Write as _;

    let parent = Path::new(path)
        .parent()
        .map(|p| p.display().to_string())
        .unwrap_or_default();
    if !parent.is_empty() {
        let _ = writeln!(body, "mkdir -p \"$dest/{parent}\"");
    }
}

#[cfg(unix)]
fn write_git_script(dir: &Path, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let script = format!(
        "#!/bin/sh\n\
         echo \"$@\" >> \"$(dirname \"$0\")/invocations\"\n\
         if [ \"$6\" = \"missing\" ]; then\n\
           echo \"fatal: Remote branch $6 not found in upstream origin\" >&2\n\
           exit 128\n\
         fi\n\
         dest=\"$8\"\n\
         mkdir -p \"$dest\"\n\
         {body}"
    );

    let path = dir.join("git");
    std::fs::write(&path, script).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

/// Arguments of every recorded fake-git invocation
pub fn git_invocations(dir: &Path) -> Vec<String> {
    std::fs::read_to_string(dir.join("invocations"))
        .map(|s| s.lines().map(str::to_string).collect())
        .unwrap_or_default()
}

pub fn reconciler(
    fetcher: Arc<dyn RepositoryFetcher>,
    workloads: Arc<InMemoryWorkloads>,
) -> Reconciler {
    Reconciler::new(ControllerConfig::default(), fetcher, workloads)
}

pub fn opted_in(path: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (ANNOTATION_ENABLED.to_string(), "true".to_string()),
        (ANNOTATION_REPO.to_string(), REPO_URL.to_string()),
        (ANNOTATION_PATH.to_string(), path.to_string()),
    ])
}

pub fn var(name: &str, value: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: Some(value.to_string()),
        value_from: None,
    }
}

pub fn container(name: &str, env: Vec<EnvVar>) -> Container {
    Container {
        name: name.to_string(),
        image: Some(format!("registry.example.com/{name}:1.0")),
        env: if env.is_empty() { None } else { Some(env) },
        ..Default::default()
    }
}

/// `(name, value)` pairs of the first container's env in a patch body
pub fn patched_env(patch: &serde_json::Value) -> Vec<(String, String)> {
    patch["spec"]["template"]["spec"]["containers"][0]["env"]
        .as_array()
        .map(|env| {
            env.iter()
                .map(|e| {
                    (
                        e["name"].as_str().unwrap_or_default().to_string(),
                        e["value"].as_str().unwrap_or_default().to_string(),
                    )
                })
                .collect()
        })
        .unwrap_or_default()
}
