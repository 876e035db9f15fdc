//! # env-inject controller
//!
//! A Kubernetes controller that injects environment variables from a `.env` file
//! kept in a GitLab repository into ReplicaSets and Argo Rollouts.
//!
//! Workloads opt in through pod template annotations (object annotations for
//! Rollouts). On every create or update the controller clones the requested ref,
//! parses the file, and adds every variable the first container does not already
//! define. Existing values are never overwritten.

pub mod config;
pub mod constants;
pub mod controller;
pub mod observability;
pub mod runtime;
pub mod workload;
