// ABOUTME: Process-local deployment store guarded by a single mutex.
// ABOUTME: Used by tests and by embedders that persist records elsewhere.

use async_trait::async_trait;
use parking_lot::Mutex;

use super::error::StoreError;
use super::model::{ActiveDeployment, Deployment, DeploymentStatus, NewDeployment, Project};
use super::state::StoreState;
use super::DeploymentStore;
use crate::types::{DeploymentId, ProjectId};

/// Deployment store held entirely in memory.
///
/// Every call takes the same lock, so the pending-claim check and the insert
/// in `create_deployment` cannot interleave with another claim.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing record set.
    pub fn with_state(state: StoreState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    /// Copy of the current records.
    pub fn snapshot(&self) -> StoreState {
        self.state.lock().clone()
    }
}

#[async_trait]
impl DeploymentStore for MemoryStore {
    async fn create_deployment(&self, new: NewDeployment) -> Result<Deployment, StoreError> {
        self.state.lock().create_deployment(new)
    }

    async fn find_by_id(&self, id: &DeploymentId) -> Result<Option<Deployment>, StoreError> {
        Ok(self.state.lock().find_by_id(id))
    }

    async fn find_active_for_project(
        &self,
        project: &ProjectId,
    ) -> Result<Option<Deployment>, StoreError> {
        Ok(self.state.lock().find_active_for_project(project))
    }

    async fn find_previous_for_project(
        &self,
        project: &ProjectId,
        before_version: u32,
    ) -> Result<Option<Deployment>, StoreError> {
        Ok(self
            .state
            .lock()
            .find_previous_for_project(project, before_version))
    }

    async fn find_all_deploying(&self) -> Result<Vec<Deployment>, StoreError> {
        Ok(self.state.lock().find_all_deploying())
    }

    async fn find_all_active_with_projects(&self) -> Result<Vec<ActiveDeployment>, StoreError> {
        Ok(self.state.lock().find_all_active_with_projects())
    }

    async fn find_all(&self) -> Result<Vec<Deployment>, StoreError> {
        Ok(self.state.lock().find_all())
    }

    async fn find_all_for_project(
        &self,
        project: &ProjectId,
    ) -> Result<Vec<Deployment>, StoreError> {
        Ok(self.state.lock().find_all_for_project(project))
    }

    async fn next_version(&self, project: &ProjectId) -> Result<u32, StoreError> {
        Ok(self.state.lock().next_version(project))
    }

    async fn update_status(
        &self,
        id: &DeploymentId,
        status: DeploymentStatus,
    ) -> Result<Deployment, StoreError> {
        self.state.lock().update_status(id, status)
    }

    async fn transition_status(
        &self,
        id: &DeploymentId,
        from: DeploymentStatus,
        to: DeploymentStatus,
    ) -> Result<Deployment, StoreError> {
        self.state.lock().transition_status(id, from, to)
    }

    async fn find_project(&self, id: &ProjectId) -> Result<Option<Project>, StoreError> {
        Ok(self.state.lock().find_project(id))
    }

    async fn upsert_project(&self, project: Project) -> Result<(), StoreError> {
        self.state.lock().upsert_project(project);
        Ok(())
    }
}
