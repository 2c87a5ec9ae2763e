// ABOUTME: Store error type with SNAFU context selectors.
// ABOUTME: Separates claim conflicts from missing records and backend I/O failures.

use chrono::{DateTime, Utc};
use snafu::Snafu;
use std::path::PathBuf;

use super::model::DeploymentStatus;
use crate::types::{DeploymentId, ProjectId};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum StoreError {
    #[snafu(display("project {project} already has deployment v{version} in progress"))]
    PendingExists { project: ProjectId, version: u32 },

    #[snafu(display("version {version} of project {project} is already allocated"))]
    VersionTaken { project: ProjectId, version: u32 },

    #[snafu(display("{what} {value} is already allocated to another deployment"))]
    Duplicate { what: &'static str, value: String },

    #[snafu(display("no free host port at or above {from} for project {project}"))]
    PortsExhausted { project: ProjectId, from: u16 },

    #[snafu(display("project not found: {id}"))]
    ProjectNotFound { id: ProjectId },

    #[snafu(display("deployment not found: {id}"))]
    DeploymentNotFound { id: DeploymentId },

    #[snafu(display("deployment {id} is {actual}, expected {expected}"))]
    StatusMismatch {
        id: DeploymentId,
        expected: DeploymentStatus,
        actual: DeploymentStatus,
    },

    #[snafu(display("failed to {action} {}: {source}", path.display()))]
    Io {
        action: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("corrupt state file {}: {source}", path.display()))]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[snafu(display(
        "state lock {} held by {holder} (pid {pid}) since {started_at}",
        path.display()
    ))]
    LockHeld {
        path: PathBuf,
        holder: String,
        pid: u32,
        started_at: DateTime<Utc>,
    },
}

impl StoreError {
    /// Whether the error reports a lost race that the caller may retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::VersionTaken { .. })
    }
}
