// ABOUTME: Drives one project's blue-green deploy: claim, start, validate, cut over.
// ABOUTME: Every return path resolves the claimed record to ACTIVE or FAILED.

use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use super::error::DeployError;
use crate::config::resolve_env_map;
use crate::diagnostics::{Diagnostics, Warning};
use crate::runtime::{ContainerRuntime, RunSpec};
use crate::store::{
    Deployment, DeploymentStatus, DeploymentStore, NewDeployment, Project, SlotColor, StoreError,
};
use crate::traffic::TrafficSwitch;
use crate::types::ProjectId;
use crate::validate::Validator;

/// Claims retried after losing a version allocation race.
const CLAIM_ATTEMPTS: u32 = 3;

/// Headroom on top of the retry budget for inspection and log calls.
const VALIDATION_GRACE: Duration = Duration::from_secs(10);

pub const LABEL_PROJECT: &str = "zeroshift.project";
pub const LABEL_VERSION: &str = "zeroshift.version";

/// Result of a successful deploy.
#[derive(Debug, Clone, Serialize)]
pub struct DeployOutcome {
    pub deployment: Deployment,
    pub message: String,
    /// Non-fatal problems, e.g. the previous version could not be retired.
    pub warnings: Vec<Warning>,
}

/// Why the pre-cutover phase stopped.
enum Failure {
    /// Nothing was started; the error is surfaced unchanged.
    BeforeStart(DeployError),
    /// The container was started; carries the diagnostic.
    AfterStart(String),
    Cancelled,
}

#[derive(Clone)]
pub struct Orchestrator {
    store: Arc<dyn DeploymentStore>,
    runtime: Arc<dyn ContainerRuntime>,
    traffic: Arc<dyn TrafficSwitch>,
    validator: Validator,
    network: String,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn DeploymentStore>,
        runtime: Arc<dyn ContainerRuntime>,
        traffic: Arc<dyn TrafficSwitch>,
        validator: Validator,
        network: impl Into<String>,
    ) -> Self {
        Self {
            store,
            runtime,
            traffic,
            validator,
            network: network.into(),
        }
    }

    pub async fn deploy(
        &self,
        project_id: &ProjectId,
        image: &str,
    ) -> Result<DeployOutcome, DeployError> {
        self.deploy_until(project_id, image, std::future::pending::<()>())
            .await
    }

    /// Deploy, abandoning the attempt if `cancel` completes before cutover.
    ///
    /// Cutover itself is never interrupted once it has started.
    pub async fn deploy_until(
        &self,
        project_id: &ProjectId,
        image: &str,
        cancel: impl Future<Output = ()> + Send,
    ) -> Result<DeployOutcome, DeployError> {
        let project = self
            .store
            .find_project(project_id)
            .await?
            .ok_or_else(|| DeployError::ProjectNotFound(project_id.clone()))?;

        let deployment = self.claim(&project, image).await?;
        tracing::info!(
            project = %project.id,
            version = deployment.version,
            container = %deployment.container_name,
            port = deployment.port,
            color = %deployment.color,
            "deployment claimed"
        );

        let prepared = tokio::select! {
            result = self.prepare(&project, &deployment) => result,
            _ = cancel => Err(Failure::Cancelled),
        };

        match prepared {
            Ok(latency) => self.cut_over(&project, deployment, latency).await,
            Err(Failure::BeforeStart(error)) => {
                tracing::error!(project = %project.id, version = deployment.version, error = %error, "deployment failed before start");
                self.mark_failed(&deployment).await;
                Err(error)
            }
            Err(Failure::AfterStart(diagnostic)) => {
                tracing::error!(project = %project.id, version = deployment.version, "deployment failed validation");
                self.stop_container(&deployment).await;
                self.mark_failed(&deployment).await;
                Err(DeployError::DeploymentFailed {
                    deployment: deployment.id,
                    version: deployment.version,
                    diagnostic,
                })
            }
            Err(Failure::Cancelled) => {
                tracing::warn!(project = %project.id, version = deployment.version, "deployment cancelled");
                self.stop_container(&deployment).await;
                self.mark_failed(&deployment).await;
                Err(DeployError::Cancelled {
                    deployment: deployment.id,
                    version: deployment.version,
                })
            }
        }
    }

    /// Persist the PENDING record that acts as the project's single-flight claim.
    async fn claim(&self, project: &Project, image: &str) -> Result<Deployment, DeployError> {
        let mut attempt = 1;
        loop {
            let version = self.store.next_version(&project.id).await?;
            let preferred_port = project
                .port_for(version)
                .ok_or_else(|| DeployError::PortExhausted {
                    project: project.id.clone(),
                    version,
                })?;
            let active = self.store.find_active_for_project(&project.id).await?;

            let new = NewDeployment {
                project_id: project.id.clone(),
                version,
                image: image.to_string(),
                container_name: project.name.container_name(version),
                preferred_port,
                color: SlotColor::next_after(active.map(|d| d.color)),
            };

            match self.store.create_deployment(new).await {
                Ok(deployment) => return Ok(deployment),
                Err(StoreError::PendingExists { project, version }) => {
                    return Err(DeployError::Conflict { project, version });
                }
                Err(StoreError::PortsExhausted { project, .. }) => {
                    return Err(DeployError::PortExhausted { project, version });
                }
                Err(e) if e.is_retryable() && attempt < CLAIM_ATTEMPTS => {
                    tracing::debug!(project = %project.id, version, attempt, "version taken, retrying claim");
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Pull, start and validate. Returns the passing health check latency.
    async fn prepare(&self, project: &Project, deployment: &Deployment) -> Result<Duration, Failure> {
        let env = resolve_env_map(&project.env).map_err(|var| {
            Failure::BeforeStart(DeployError::MissingEnv {
                project: project.id.clone(),
                var,
            })
        })?;

        tracing::info!(project = %project.id, image = %deployment.image, "fetching image");
        self.runtime
            .pull_or_build(&deployment.image)
            .await
            .map_err(|e| Failure::BeforeStart(e.into()))?;

        let spec = RunSpec {
            name: deployment.container_name.clone(),
            image: deployment.image.clone(),
            host_port: deployment.port,
            container_port: project.container_port,
            network: self.network.clone(),
            restart: project.restart,
            env,
            labels: HashMap::from([
                (LABEL_PROJECT.to_string(), project.id.to_string()),
                (LABEL_VERSION.to_string(), deployment.version.to_string()),
            ]),
        };
        tracing::info!(container = %spec.name, port = spec.host_port, "starting container");
        if let Err(e) = self.runtime.run(&spec).await {
            // A container may have been created without starting.
            if let Err(cleanup) = self.runtime.remove(&spec.name).await
                && !cleanup.is_not_found()
            {
                tracing::debug!(container = %spec.name, error = %cleanup, "cleanup after failed start");
            }
            return Err(Failure::BeforeStart(e.into()));
        }

        let url = format!("http://127.0.0.1:{}", deployment.port);
        let deadline = project.validation.worst_case() + VALIDATION_GRACE;
        let validation = self.validator.validate(
            &url,
            &project.health_path,
            &deployment.container_name,
            &project.validation,
        );

        match tokio::time::timeout(deadline, validation).await {
            Ok(report) if report.success => Ok(report.latency),
            Ok(report) => Err(Failure::AfterStart(
                report
                    .diagnostic
                    .unwrap_or_else(|| "Health validation failed".to_string()),
            )),
            Err(_) => Err(Failure::AfterStart(format!(
                "Validation did not finish within {}s",
                deadline.as_secs()
            ))),
        }
    }

    async fn cut_over(
        &self,
        project: &Project,
        deployment: Deployment,
        latency: Duration,
    ) -> Result<DeployOutcome, DeployError> {
        let mut diagnostics = Diagnostics::default();
        let previous = match self.store.find_active_for_project(&project.id).await {
            Ok(previous) => previous,
            Err(e) => {
                self.stop_container(&deployment).await;
                self.mark_failed(&deployment).await;
                return Err(e.into());
            }
        };

        if let Err(e) = self.traffic.switch_to(&project.id, deployment.port).await {
            tracing::error!(project = %project.id, port = deployment.port, error = %e, "traffic switch failed");
            self.stop_container(&deployment).await;
            self.mark_failed(&deployment).await;
            return Err(DeployError::DeploymentFailed {
                deployment: deployment.id,
                version: deployment.version,
                diagnostic: format!("Traffic switch failed: {e}"),
            });
        }

        let activated = match self
            .store
            .transition_status(&deployment.id, DeploymentStatus::Pending, DeploymentStatus::Active)
            .await
        {
            Ok(activated) => activated,
            Err(e) => {
                // Someone else resolved the record; hand traffic back.
                tracing::error!(project = %project.id, version = deployment.version, error = %e, "could not activate deployment");
                if let Some(prev) = &previous
                    && let Err(switch_err) = self.traffic.switch_to(&project.id, prev.port).await
                {
                    tracing::error!(port = prev.port, error = %switch_err, "failed to restore traffic");
                }
                self.stop_container(&deployment).await;
                self.mark_failed(&deployment).await;
                return Err(DeployError::DeploymentFailed {
                    deployment: deployment.id,
                    version: deployment.version,
                    diagnostic: format!("Deployment record changed during cutover: {e}"),
                });
            }
        };

        if let Some(prev) = previous.filter(|p| p.id != activated.id) {
            match self
                .store
                .transition_status(&prev.id, DeploymentStatus::Active, DeploymentStatus::RolledBack)
                .await
            {
                Ok(_) => {
                    tracing::info!(project = %project.id, version = prev.version, "previous version retired");
                }
                Err(e) => diagnostics.warn(Warning::demotion(format!(
                    "v{} could not be marked ROLLED_BACK: {e}",
                    prev.version
                ))),
            }
        }

        tracing::info!(
            project = %project.id,
            version = activated.version,
            port = activated.port,
            latency_ms = latency.as_millis() as u64,
            "deployment successful"
        );

        let message = format!(
            "Deployed {} v{} on port {} ({}), healthy in {}ms",
            project.name,
            activated.version,
            activated.port,
            activated.color,
            latency.as_millis()
        );
        Ok(DeployOutcome {
            deployment: activated,
            message,
            warnings: diagnostics.into_warnings(),
        })
    }

    async fn stop_container(&self, deployment: &Deployment) {
        match self.runtime.stop(&deployment.container_name).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => {
                tracing::warn!(container = %deployment.container_name, error = %e, "failed to stop container");
            }
        }
    }

    async fn mark_failed(&self, deployment: &Deployment) {
        if let Err(e) = self
            .store
            .transition_status(&deployment.id, DeploymentStatus::Pending, DeploymentStatus::Failed)
            .await
        {
            tracing::error!(deployment = %deployment.id, error = %e, "failed to mark deployment FAILED");
        }
    }
}
