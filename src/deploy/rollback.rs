// ABOUTME: Manual rollback to the version that was active before the current one.
// ABOUTME: Verifies the target is still running before touching anything.

use serde::Serialize;
use std::sync::Arc;

use super::error::DeployError;
use crate::runtime::ContainerRuntime;
use crate::store::{Deployment, DeploymentStatus, DeploymentStore};
use crate::traffic::TrafficSwitch;
use crate::types::ProjectId;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RollbackOutcome {
    pub rolled_back_from: Deployment,
    pub restored_to: Deployment,
    pub message: String,
}

#[derive(Clone)]
pub struct RollbackCoordinator {
    store: Arc<dyn DeploymentStore>,
    runtime: Arc<dyn ContainerRuntime>,
    traffic: Arc<dyn TrafficSwitch>,
}

impl RollbackCoordinator {
    pub fn new(
        store: Arc<dyn DeploymentStore>,
        runtime: Arc<dyn ContainerRuntime>,
        traffic: Arc<dyn TrafficSwitch>,
    ) -> Self {
        Self {
            store,
            runtime,
            traffic,
        }
    }

    /// Roll back one version. Repeated calls walk further back.
    pub async fn rollback(&self, project_id: &ProjectId) -> Result<RollbackOutcome, DeployError> {
        tracing::info!(project = %project_id, "initiating rollback");

        let current = self
            .store
            .find_active_for_project(project_id)
            .await?
            .ok_or_else(|| DeployError::NoActiveDeployment(project_id.clone()))?;

        let target = self
            .store
            .find_previous_for_project(project_id, current.version)
            .await?
            .ok_or_else(|| DeployError::NoRollbackTarget {
                project: project_id.clone(),
                version: current.version,
            })?;

        if !self.runtime.inspect_running(&target.container_name).await? {
            return Err(DeployError::TargetNotRunning {
                container: target.container_name,
                version: target.version,
            });
        }

        match self.runtime.stop(&current.container_name).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                tracing::warn!(container = %current.container_name, "current container already gone");
            }
            Err(e) => return Err(e.into()),
        }

        let rolled_back_from = self
            .store
            .transition_status(&current.id, DeploymentStatus::Active, DeploymentStatus::RolledBack)
            .await?;

        // The current container is already stopped and retired, so a failure
        // here leaves the project with no ACTIVE record and ingress still on
        // the stopped port until an operator intervenes.
        self.traffic.switch_to(project_id, target.port).await.inspect_err(|e| {
            tracing::error!(
                project = %project_id,
                stopped = %rolled_back_from.container_name,
                stopped_port = rolled_back_from.port,
                target = %target.container_name,
                target_port = target.port,
                error = %e,
                "rollback traffic switch failed: project has no active deployment and traffic still points at a stopped container"
            );
        })?;

        let restored_to = self
            .store
            .transition_status(&target.id, DeploymentStatus::RolledBack, DeploymentStatus::Active)
            .await?;

        let message = format!(
            "Rolled back from v{} to v{}",
            rolled_back_from.version, restored_to.version
        );
        tracing::info!(
            project = %project_id,
            from = %rolled_back_from.container_name,
            to = %restored_to.container_name,
            "rollback completed"
        );

        Ok(RollbackOutcome {
            rolled_back_from,
            restored_to,
            message,
        })
    }
}
