// ABOUTME: Read-only views over deployments: history, status, logs and metrics.
// ABOUTME: Logs and metrics pass through to the runtime for the serving container.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use super::error::DeployError;
use crate::runtime::{ContainerRuntime, ContainerStats};
use crate::store::{Deployment, DeploymentStore, Project};
use crate::types::ProjectId;

/// Default number of log lines returned for a project.
pub const DEFAULT_LOG_LINES: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectState {
    Active,
    Idle,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectStatus {
    pub project: ProjectId,
    pub status: ProjectState,
    pub active_deployment: Option<Deployment>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectLogs {
    pub container_name: Option<String>,
    pub lines: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectMetrics {
    pub running: bool,
    pub cpu_percent: f64,
    pub memory_used: u64,
    pub memory_limit: u64,
    pub memory_percent: f64,
    pub net_in: u64,
    pub net_out: u64,
    pub block_in: u64,
    pub block_out: u64,
    pub pids: u64,
    pub timestamp: DateTime<Utc>,
}

impl ProjectMetrics {
    pub fn idle(timestamp: DateTime<Utc>) -> Self {
        Self {
            running: false,
            cpu_percent: 0.0,
            memory_used: 0,
            memory_limit: 0,
            memory_percent: 0.0,
            net_in: 0,
            net_out: 0,
            block_in: 0,
            block_out: 0,
            pids: 0,
            timestamp,
        }
    }
}

impl From<ContainerStats> for ProjectMetrics {
    fn from(stats: ContainerStats) -> Self {
        let memory_percent = if stats.memory_limit > 0 {
            stats.memory_used as f64 / stats.memory_limit as f64 * 100.0
        } else {
            0.0
        };
        Self {
            running: true,
            cpu_percent: stats.cpu_percent,
            memory_used: stats.memory_used,
            memory_limit: stats.memory_limit,
            memory_percent,
            net_in: stats.net_in,
            net_out: stats.net_out,
            block_in: stats.block_in,
            block_out: stats.block_out,
            pids: stats.pids,
            timestamp: stats.timestamp,
        }
    }
}

/// Views over the store. Logs and metrics additionally ask the runtime.
#[derive(Clone)]
pub struct Queries {
    store: Arc<dyn DeploymentStore>,
}

impl Queries {
    pub fn new(store: Arc<dyn DeploymentStore>) -> Self {
        Self { store }
    }

    async fn project(&self, id: &ProjectId) -> Result<Project, DeployError> {
        self.store
            .find_project(id)
            .await?
            .ok_or_else(|| DeployError::ProjectNotFound(id.clone()))
    }

    /// Deployments newest first, optionally for one project.
    pub async fn list_deployments(
        &self,
        project: Option<&ProjectId>,
    ) -> Result<Vec<Deployment>, DeployError> {
        match project {
            Some(id) => {
                self.project(id).await?;
                Ok(self.store.find_all_for_project(id).await?)
            }
            None => Ok(self.store.find_all().await?),
        }
    }

    pub async fn project_status(&self, id: &ProjectId) -> Result<ProjectStatus, DeployError> {
        self.project(id).await?;
        let active = self.store.find_active_for_project(id).await?;
        Ok(ProjectStatus {
            project: id.clone(),
            status: if active.is_some() {
                ProjectState::Active
            } else {
                ProjectState::Idle
            },
            active_deployment: active,
        })
    }

    /// Logs of the serving container, falling back to the most recent
    /// deployment so a failed attempt's output stays visible.
    pub async fn project_logs(
        &self,
        runtime: &dyn ContainerRuntime,
        id: &ProjectId,
        lines: usize,
    ) -> Result<ProjectLogs, DeployError> {
        self.project(id).await?;
        let target = match self.store.find_active_for_project(id).await? {
            Some(active) => Some(active),
            None => self.store.find_all_for_project(id).await?.into_iter().next(),
        };

        let Some(target) = target else {
            return Ok(ProjectLogs {
                container_name: None,
                lines: Vec::new(),
            });
        };

        let lines = match runtime.logs(&target.container_name, lines).await {
            Ok(lines) => lines,
            Err(e) if e.is_not_found() => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(ProjectLogs {
            container_name: Some(target.container_name),
            lines,
        })
    }

    /// Resource sample of the serving container; idle when none is running.
    pub async fn project_metrics(
        &self,
        runtime: &dyn ContainerRuntime,
        id: &ProjectId,
    ) -> Result<ProjectMetrics, DeployError> {
        self.project(id).await?;
        let Some(active) = self.store.find_active_for_project(id).await? else {
            return Ok(ProjectMetrics::idle(Utc::now()));
        };

        match runtime.stats(&active.container_name).await {
            Ok(stats) => Ok(stats.into()),
            Err(e) => {
                tracing::warn!(container = %active.container_name, error = %e, "metrics unavailable");
                Ok(ProjectMetrics::idle(Utc::now()))
            }
        }
    }
}
