// ABOUTME: Ingress traffic switching between deployments.
// ABOUTME: Routes all new requests for each project to a single host port.

mod nginx;

pub use nginx::{NginxSwitch, render_upstream};

use async_trait::async_trait;
use std::path::PathBuf;

use crate::types::ProjectId;

/// Points a project's ingress at a deployment's host port.
///
/// After `switch_to` returns `Ok`, new requests for `project` go to
/// `127.0.0.1:<port>` and nothing is routed to a port that has not been
/// validated. Routing of other projects is untouched. On error the previous
/// routing must still be in effect.
#[async_trait]
pub trait TrafficSwitch: Send + Sync {
    async fn switch_to(&self, project: &ProjectId, port: u16) -> Result<(), TrafficError>;
}

#[derive(Debug, thiserror::Error)]
pub enum TrafficError {
    #[error("failed to write upstream config {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to run reload command `{command}`: {source}")]
    ReloadSpawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("reload command `{command}` failed: {stderr}")]
    ReloadFailed { command: String, stderr: String },
}
