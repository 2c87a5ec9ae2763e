// ABOUTME: Deployment lifecycle: orchestrated deploys, rollback, reconciliation.
// ABOUTME: Also exposes read-only queries over deployment history.

mod error;
mod orchestrator;
mod query;
mod reconcile;
mod rollback;

pub use error::{DeployError, DeployErrorKind};
pub use orchestrator::{DeployOutcome, LABEL_PROJECT, LABEL_VERSION, Orchestrator};
pub use query::{
    DEFAULT_LOG_LINES, ProjectLogs, ProjectMetrics, ProjectState, ProjectStatus, Queries,
};
pub use reconcile::{ReconcileReport, Reconciler};
pub use rollback::{RollbackCoordinator, RollbackOutcome};
