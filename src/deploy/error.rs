// ABOUTME: Error types for deploy, rollback and query operations.
// ABOUTME: kind() groups variants into conflict, not-found, failed and runtime.

use crate::runtime::ContainerError;
use crate::store::StoreError;
use crate::traffic::TrafficError;
use crate::types::{DeploymentId, ProjectId};

/// Errors surfaced by the deployment orchestrator and rollback coordinator.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error("project not found: {0}")]
    ProjectNotFound(ProjectId),

    /// Another deploy for the project holds the single-flight claim.
    #[error("a deployment is already in progress for project {project} (v{version})")]
    Conflict { project: ProjectId, version: u32 },

    /// The new version never became healthy, or cutover failed.
    #[error("deployment v{version} failed: {diagnostic}")]
    DeploymentFailed {
        deployment: DeploymentId,
        version: u32,
        diagnostic: String,
    },

    #[error("deployment v{version} was cancelled")]
    Cancelled {
        deployment: DeploymentId,
        version: u32,
    },

    #[error("project {0} has no active deployment")]
    NoActiveDeployment(ProjectId),

    #[error("no previous version of project {project} to roll back to from v{version}")]
    NoRollbackTarget { project: ProjectId, version: u32 },

    #[error("rollback target {container} (v{version}) is not running")]
    TargetNotRunning { container: String, version: u32 },

    #[error("project {project} cannot allocate a host port for v{version}")]
    PortExhausted { project: ProjectId, version: u32 },

    #[error("missing environment variable {var} for project {project}")]
    MissingEnv { project: ProjectId, var: String },

    #[error(transparent)]
    Container(#[from] ContainerError),

    #[error("traffic switch failed: {0}")]
    Traffic(#[from] TrafficError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployErrorKind {
    /// Single-flight violation.
    Conflict,
    /// Unknown project or no active deployment.
    NotFound,
    /// Validation failed, cutover failed, or nothing to roll back to.
    DeploymentFailed,
    /// A runtime, traffic switch or store call failed unexpectedly.
    Runtime,
}

impl DeployError {
    pub fn kind(&self) -> DeployErrorKind {
        match self {
            DeployError::Conflict { .. } => DeployErrorKind::Conflict,
            DeployError::ProjectNotFound(_) | DeployError::NoActiveDeployment(_) => {
                DeployErrorKind::NotFound
            }
            DeployError::DeploymentFailed { .. }
            | DeployError::Cancelled { .. }
            | DeployError::NoRollbackTarget { .. }
            | DeployError::TargetNotRunning { .. }
            | DeployError::PortExhausted { .. }
            | DeployError::MissingEnv { .. } => DeployErrorKind::DeploymentFailed,
            DeployError::Container(_) | DeployError::Traffic(_) | DeployError::Store(_) => {
                DeployErrorKind::Runtime
            }
        }
    }

    /// Container output or failure detail, when the error carries one.
    pub fn diagnostic(&self) -> Option<&str> {
        match self {
            DeployError::DeploymentFailed { diagnostic, .. } => Some(diagnostic),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_taxonomy() {
        let web = ProjectId::new("web");
        assert_eq!(
            DeployError::Conflict {
                project: web.clone(),
                version: 3
            }
            .kind(),
            DeployErrorKind::Conflict
        );
        assert_eq!(
            DeployError::NoActiveDeployment(web.clone()).kind(),
            DeployErrorKind::NotFound
        );
        assert_eq!(
            DeployError::NoRollbackTarget {
                project: web,
                version: 1
            }
            .kind(),
            DeployErrorKind::DeploymentFailed
        );
        assert_eq!(
            DeployError::Container(ContainerError::Runtime("boom".into())).kind(),
            DeployErrorKind::Runtime
        );
    }

    #[test]
    fn failure_message_carries_diagnostic() {
        let err = DeployError::DeploymentFailed {
            deployment: DeploymentId::new("d1"),
            version: 2,
            diagnostic: "Health check failed after 5 attempts".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "deployment v2 failed: Health check failed after 5 attempts"
        );
        assert_eq!(err.diagnostic(), Some("Health check failed after 5 attempts"));
    }
}
