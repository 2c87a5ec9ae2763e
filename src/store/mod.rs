// ABOUTME: Deployment store contract and its in-memory and file-backed implementations.
// ABOUTME: The store is the only shared state between concurrent deploys.

mod error;
mod file;
mod lock;
mod memory;
mod model;
mod state;

pub use error::StoreError;
pub use file::FileStore;
pub use lock::{LockInfo, StateLock};
pub use memory::MemoryStore;
pub use model::{
    ActiveDeployment, Deployment, DeploymentStatus, NewDeployment, Project, SlotColor,
};
pub use state::StoreState;

use async_trait::async_trait;

use crate::types::{DeploymentId, ProjectId};

/// Durable record of projects and deployment attempts.
///
/// `create_deployment` is the single-flight claim: it must be atomic with
/// respect to every other `create_deployment` for the same project, and
/// reject the claim when the project already has a `Pending` record or when
/// the version is not exactly one past the project's highest version.
#[async_trait]
pub trait DeploymentStore: Send + Sync {
    async fn create_deployment(&self, new: NewDeployment) -> Result<Deployment, StoreError>;

    async fn find_by_id(&self, id: &DeploymentId) -> Result<Option<Deployment>, StoreError>;

    async fn find_active_for_project(
        &self,
        project: &ProjectId,
    ) -> Result<Option<Deployment>, StoreError>;

    /// Most recent `RolledBack` deployment with a version below `before_version`.
    async fn find_previous_for_project(
        &self,
        project: &ProjectId,
        before_version: u32,
    ) -> Result<Option<Deployment>, StoreError>;

    async fn find_all_deploying(&self) -> Result<Vec<Deployment>, StoreError>;

    async fn find_all_active_with_projects(&self) -> Result<Vec<ActiveDeployment>, StoreError>;

    async fn find_all(&self) -> Result<Vec<Deployment>, StoreError>;

    async fn find_all_for_project(
        &self,
        project: &ProjectId,
    ) -> Result<Vec<Deployment>, StoreError>;

    async fn next_version(&self, project: &ProjectId) -> Result<u32, StoreError>;

    async fn update_status(
        &self,
        id: &DeploymentId,
        status: DeploymentStatus,
    ) -> Result<Deployment, StoreError>;

    /// Conditional update: fails with `StatusMismatch` if the record is no longer in `from`.
    async fn transition_status(
        &self,
        id: &DeploymentId,
        from: DeploymentStatus,
        to: DeploymentStatus,
    ) -> Result<Deployment, StoreError>;

    async fn find_project(&self, id: &ProjectId) -> Result<Option<Project>, StoreError>;

    async fn upsert_project(&self, project: Project) -> Result<(), StoreError>;
}
