// ABOUTME: Container runtime trait consumed by the orchestrator.
// ABOUTME: Run specs and resource samples shared by every runtime adapter.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

use super::error::ContainerError;
use crate::config::RestartPolicy;

/// Everything needed to start one deployment's container.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSpec {
    pub name: String,
    pub image: String,
    /// Host port bound on 127.0.0.1.
    pub host_port: u16,
    pub container_port: u16,
    pub network: String,
    pub restart: RestartPolicy,
    pub env: HashMap<String, String>,
    pub labels: HashMap<String, String>,
}

/// A point-in-time resource sample for a container.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerStats {
    pub cpu_percent: f64,
    pub memory_used: u64,
    pub memory_limit: u64,
    pub net_in: u64,
    pub net_out: u64,
    pub block_in: u64,
    pub block_out: u64,
    pub pids: u64,
    pub timestamp: DateTime<Utc>,
}

/// Container operations the deployment lifecycle depends on.
///
/// Containers are addressed by name. Implementations must be safe to share
/// across concurrently running deploys.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Make `image` available locally, pulling it or accepting a local build.
    async fn pull_or_build(&self, image: &str) -> Result<(), ContainerError>;

    /// Create and start a container.
    async fn run(&self, spec: &RunSpec) -> Result<(), ContainerError>;

    async fn stop(&self, name: &str) -> Result<(), ContainerError>;

    async fn remove(&self, name: &str) -> Result<(), ContainerError>;

    /// Whether the container is running. A missing container is not running.
    async fn inspect_running(&self, name: &str) -> Result<bool, ContainerError>;

    /// Times the runtime has restarted the container since it was created.
    async fn restart_count(&self, name: &str) -> Result<u32, ContainerError>;

    /// Up to `max_lines` most recent output lines, oldest first.
    async fn logs(&self, name: &str, max_lines: usize) -> Result<Vec<String>, ContainerError>;

    async fn stats(&self, name: &str) -> Result<ContainerStats, ContainerError>;
}
