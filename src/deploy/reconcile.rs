// ABOUTME: Startup self-healing pass over persisted deployment state.
// ABOUTME: Closes out interrupted deploys and invalidates dead active containers.

use serde::Serialize;
use std::sync::Arc;

use crate::diagnostics::{Diagnostics, Warning};
use crate::runtime::ContainerRuntime;
use crate::store::{Deployment, DeploymentStatus, DeploymentStore, StoreError};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    /// Interrupted deploys closed out as FAILED.
    pub deploying_fixed: usize,
    /// ACTIVE records whose container was not running.
    pub active_invalidated: usize,
    /// Records that could not be processed; details were logged.
    pub failures: usize,
}

#[derive(Clone)]
pub struct Reconciler {
    store: Arc<dyn DeploymentStore>,
    runtime: Arc<dyn ContainerRuntime>,
}

impl Reconciler {
    pub fn new(store: Arc<dyn DeploymentStore>, runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self { store, runtime }
    }

    /// Run both phases. Only a failure to query the store aborts the pass.
    pub async fn reconcile(&self) -> Result<ReconcileReport, StoreError> {
        tracing::info!("starting reconciliation");
        let mut diagnostics = Diagnostics::default();

        let deploying_fixed = self.fix_interrupted(&mut diagnostics).await?;
        let active_invalidated = self.audit_active(&mut diagnostics).await?;

        let report = ReconcileReport {
            deploying_fixed,
            active_invalidated,
            failures: diagnostics.len(),
        };
        tracing::info!(
            deploying_fixed = report.deploying_fixed,
            active_invalidated = report.active_invalidated,
            failures = report.failures,
            "reconciliation complete"
        );
        Ok(report)
    }

    async fn fix_interrupted(&self, diagnostics: &mut Diagnostics) -> Result<usize, StoreError> {
        let pending = self.store.find_all_deploying().await?;
        if pending.is_empty() {
            return Ok(0);
        }
        tracing::warn!(count = pending.len(), "found interrupted deployments");

        let mut fixed = 0;
        for deployment in pending {
            tracing::warn!(
                deployment = %deployment.id,
                container = %deployment.container_name,
                project = %deployment.project_id,
                "recovering interrupted deployment"
            );
            self.discard_container(&deployment).await;

            match self
                .store
                .transition_status(&deployment.id, DeploymentStatus::Pending, DeploymentStatus::Failed)
                .await
            {
                Ok(_) => fixed += 1,
                Err(e) => diagnostics.warn(Warning::status_update(format!(
                    "could not mark {} FAILED: {e}",
                    deployment.container_name
                ))),
            }
        }
        Ok(fixed)
    }

    /// Best effort; the container may never have been created.
    async fn discard_container(&self, deployment: &Deployment) {
        let name = &deployment.container_name;
        if let Err(e) = self.runtime.stop(name).await {
            tracing::debug!(container = %name, error = %e, "stop during recovery");
        }
        if let Err(e) = self.runtime.remove(name).await {
            tracing::debug!(container = %name, error = %e, "remove during recovery");
        }
    }

    async fn audit_active(&self, diagnostics: &mut Diagnostics) -> Result<usize, StoreError> {
        let active = self.store.find_all_active_with_projects().await?;

        let mut invalidated = 0;
        for entry in active {
            let deployment = &entry.deployment;
            let running = match self.runtime.inspect_running(&deployment.container_name).await {
                Ok(running) => running,
                Err(e) => {
                    diagnostics.warn(Warning::inspect(format!(
                        "could not inspect {}: {e}",
                        deployment.container_name
                    )));
                    continue;
                }
            };
            if running {
                continue;
            }

            tracing::warn!(
                deployment = %deployment.id,
                container = %deployment.container_name,
                project = %deployment.project_id,
                registered = entry.project.is_some(),
                "active deployment container is not running, marking FAILED"
            );
            match self
                .store
                .transition_status(&deployment.id, DeploymentStatus::Active, DeploymentStatus::Failed)
                .await
            {
                Ok(_) => invalidated += 1,
                Err(e) => diagnostics.warn(Warning::status_update(format!(
                    "could not invalidate {}: {e}",
                    deployment.container_name
                ))),
            }
        }
        Ok(invalidated)
    }
}
