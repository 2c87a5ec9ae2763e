// ABOUTME: In-memory record set shared by every store backend.
// ABOUTME: All claim and uniqueness rules live here so backends only add locking.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use snafu::{OptionExt, ensure};

use super::error::{
    DeploymentNotFoundSnafu, DuplicateSnafu, PendingExistsSnafu, PortsExhaustedSnafu,
    ProjectNotFoundSnafu,
    StatusMismatchSnafu, StoreError, VersionTakenSnafu,
};
use super::model::{
    ActiveDeployment, Deployment, DeploymentStatus, NewDeployment, Project,
};
use crate::types::{DeploymentId, ProjectId};

/// Every project and deployment, in insertion order.
///
/// Callers must hold whatever lock the backend uses for the duration of a
/// mutating call; the methods themselves are not synchronized.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreState {
    #[serde(default)]
    projects: Vec<Project>,
    #[serde(default)]
    deployments: Vec<Deployment>,
}

impl StoreState {
    pub fn create_deployment(&mut self, new: NewDeployment) -> Result<Deployment, StoreError> {
        ensure!(
            self.project(&new.project_id).is_some(),
            ProjectNotFoundSnafu {
                id: new.project_id.clone()
            }
        );

        if let Some(pending) = self
            .deployments
            .iter()
            .find(|d| d.project_id == new.project_id && d.status == DeploymentStatus::Pending)
        {
            return PendingExistsSnafu {
                project: new.project_id.clone(),
                version: pending.version,
            }
            .fail();
        }

        ensure!(
            new.version == self.next_version(&new.project_id),
            VersionTakenSnafu {
                project: new.project_id.clone(),
                version: new.version,
            }
        );
        ensure!(
            !self
                .deployments
                .iter()
                .any(|d| d.container_name == new.container_name),
            DuplicateSnafu {
                what: "container name",
                value: new.container_name.clone(),
            }
        );
        let port = self.free_port_from(new.preferred_port).context(PortsExhaustedSnafu {
            project: new.project_id.clone(),
            from: new.preferred_port,
        })?;

        let now = Utc::now();
        let deployment = Deployment {
            id: DeploymentId::generate(),
            project_id: new.project_id,
            version: new.version,
            image: new.image,
            container_name: new.container_name,
            port,
            color: new.color,
            status: DeploymentStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        self.deployments.push(deployment.clone());
        Ok(deployment)
    }

    /// Lowest port at or above `from` that no deployment record holds.
    ///
    /// Ports are global across projects and never reused while a record exists.
    fn free_port_from(&self, from: u16) -> Option<u16> {
        (from..=u16::MAX).find(|port| !self.deployments.iter().any(|d| d.port == *port))
    }

    pub fn find_by_id(&self, id: &DeploymentId) -> Option<Deployment> {
        self.deployments.iter().find(|d| &d.id == id).cloned()
    }

    pub fn find_active_for_project(&self, project: &ProjectId) -> Option<Deployment> {
        self.deployments
            .iter()
            .filter(|d| &d.project_id == project && d.status == DeploymentStatus::Active)
            .max_by_key(|d| d.version)
            .cloned()
    }

    pub fn find_previous_for_project(
        &self,
        project: &ProjectId,
        before_version: u32,
    ) -> Option<Deployment> {
        self.deployments
            .iter()
            .filter(|d| {
                &d.project_id == project
                    && d.status == DeploymentStatus::RolledBack
                    && d.version < before_version
            })
            .max_by_key(|d| d.version)
            .cloned()
    }

    pub fn find_all_deploying(&self) -> Vec<Deployment> {
        self.with_status(DeploymentStatus::Pending)
    }

    pub fn find_all_active_with_projects(&self) -> Vec<ActiveDeployment> {
        self.with_status(DeploymentStatus::Active)
            .into_iter()
            .map(|deployment| ActiveDeployment {
                project: self.project(&deployment.project_id).cloned(),
                deployment,
            })
            .collect()
    }

    /// All deployments, newest first.
    pub fn find_all(&self) -> Vec<Deployment> {
        self.deployments.iter().rev().cloned().collect()
    }

    /// A project's deployments, newest first.
    pub fn find_all_for_project(&self, project: &ProjectId) -> Vec<Deployment> {
        self.deployments
            .iter()
            .rev()
            .filter(|d| &d.project_id == project)
            .cloned()
            .collect()
    }

    pub fn next_version(&self, project: &ProjectId) -> u32 {
        self.deployments
            .iter()
            .filter(|d| &d.project_id == project)
            .map(|d| d.version)
            .max()
            .unwrap_or(0)
            + 1
    }

    pub fn update_status(
        &mut self,
        id: &DeploymentId,
        status: DeploymentStatus,
    ) -> Result<Deployment, StoreError> {
        let deployment = self
            .deployments
            .iter_mut()
            .find(|d| &d.id == id)
            .context(DeploymentNotFoundSnafu { id: id.clone() })?;
        deployment.status = status;
        deployment.updated_at = Utc::now();
        Ok(deployment.clone())
    }

    /// Update the status only if the record is still in `from`.
    pub fn transition_status(
        &mut self,
        id: &DeploymentId,
        from: DeploymentStatus,
        to: DeploymentStatus,
    ) -> Result<Deployment, StoreError> {
        let deployment = self
            .deployments
            .iter_mut()
            .find(|d| &d.id == id)
            .context(DeploymentNotFoundSnafu { id: id.clone() })?;
        ensure!(
            deployment.status == from,
            StatusMismatchSnafu {
                id: id.clone(),
                expected: from,
                actual: deployment.status,
            }
        );
        deployment.status = to;
        deployment.updated_at = Utc::now();
        Ok(deployment.clone())
    }

    pub fn find_project(&self, id: &ProjectId) -> Option<Project> {
        self.project(id).cloned()
    }

    pub fn upsert_project(&mut self, project: Project) {
        match self.projects.iter_mut().find(|p| p.id == project.id) {
            Some(existing) => *existing = project,
            None => self.projects.push(project),
        }
    }

    fn project(&self, id: &ProjectId) -> Option<&Project> {
        self.projects.iter().find(|p| &p.id == id)
    }

    fn with_status(&self, status: DeploymentStatus) -> Vec<Deployment> {
        self.deployments
            .iter()
            .filter(|d| d.status == status)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RestartPolicy, ValidationConfig};
    use crate::store::SlotColor;
    use crate::types::ProjectName;
    use proptest::prelude::*;

    fn project(id: &str, base_port: u16) -> Project {
        Project {
            id: ProjectId::new(id),
            name: ProjectName::new(id).unwrap(),
            source: None,
            health_path: "/health".to_string(),
            container_port: 80,
            base_port,
            restart: RestartPolicy::default(),
            validation: ValidationConfig::default(),
            env: Default::default(),
        }
    }

    fn claim(state: &mut StoreState, id: &str, version: u32) -> Result<Deployment, StoreError> {
        let project = state.find_project(&ProjectId::new(id)).unwrap();
        state.create_deployment(NewDeployment {
            project_id: project.id.clone(),
            version,
            image: "app:latest".to_string(),
            container_name: project.name.container_name(version),
            preferred_port: project.port_for(version).unwrap(),
            color: SlotColor::Blue,
        })
    }

    fn state_with(ids: &[(&str, u16)]) -> StoreState {
        let mut state = StoreState::default();
        for (id, port) in ids {
            state.upsert_project(project(id, *port));
        }
        state
    }

    #[test]
    fn second_pending_claim_is_rejected() {
        let mut state = state_with(&[("web", 3100)]);
        claim(&mut state, "web", 1).unwrap();

        let err = claim(&mut state, "web", 2).unwrap_err();
        assert!(matches!(err, StoreError::PendingExists { version: 1, .. }));
    }

    #[test]
    fn stale_version_is_rejected() {
        let mut state = state_with(&[("web", 3100)]);
        let first = claim(&mut state, "web", 1).unwrap();
        state
            .update_status(&first.id, DeploymentStatus::Failed)
            .unwrap();

        let err = claim(&mut state, "web", 1).unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(claim(&mut state, "web", 2).unwrap().version, 2);
    }

    #[test]
    fn claims_for_other_projects_are_independent() {
        let mut state = state_with(&[("web", 3100), ("api", 4100)]);
        claim(&mut state, "web", 1).unwrap();
        assert!(claim(&mut state, "api", 1).is_ok());
    }

    #[test]
    fn overlapping_port_ranges_get_distinct_ports() {
        let mut state = state_with(&[("web", 3100), ("api", 3100)]);
        let web_v1 = claim(&mut state, "web", 1).unwrap();
        state.update_status(&web_v1.id, DeploymentStatus::Active).unwrap();

        let api_v1 = claim(&mut state, "api", 1).unwrap();
        state.update_status(&api_v1.id, DeploymentStatus::Active).unwrap();
        let web_v2 = claim(&mut state, "web", 2).unwrap();

        assert_eq!(web_v1.port, 3101);
        assert_eq!(api_v1.port, 3102);
        assert_eq!(web_v2.port, 3103);
    }

    #[test]
    fn port_range_can_run_out() {
        let mut state = state_with(&[("web", u16::MAX - 1), ("api", u16::MAX - 1)]);
        claim(&mut state, "web", 1).unwrap();

        let err = claim(&mut state, "api", 1).unwrap_err();
        assert!(matches!(err, StoreError::PortsExhausted { from: u16::MAX, .. }));
    }

    #[test]
    fn unknown_project_cannot_claim() {
        let mut state = StoreState::default();
        let err = state
            .create_deployment(NewDeployment {
                project_id: ProjectId::new("ghost"),
                version: 1,
                image: "app".to_string(),
                container_name: "ghost-v1".to_string(),
                preferred_port: 3101,
                color: SlotColor::Blue,
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::ProjectNotFound { .. }));
    }

    #[test]
    fn previous_is_most_recent_rolled_back_below_version() {
        let mut state = state_with(&[("web", 3100)]);
        for version in 1..=3 {
            let d = claim(&mut state, "web", version).unwrap();
            state
                .update_status(&d.id, DeploymentStatus::RolledBack)
                .unwrap();
        }
        let web = ProjectId::new("web");

        assert_eq!(state.find_previous_for_project(&web, 3).unwrap().version, 2);
        assert_eq!(state.find_previous_for_project(&web, 2).unwrap().version, 1);
        assert!(state.find_previous_for_project(&web, 1).is_none());
    }

    #[test]
    fn transition_refuses_moved_records() {
        let mut state = state_with(&[("web", 3100)]);
        let d = claim(&mut state, "web", 1).unwrap();
        state
            .update_status(&d.id, DeploymentStatus::Failed)
            .unwrap();

        let err = state
            .transition_status(&d.id, DeploymentStatus::Pending, DeploymentStatus::Active)
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::StatusMismatch {
                actual: DeploymentStatus::Failed,
                ..
            }
        ));
    }

    #[test]
    fn listing_is_newest_first() {
        let mut state = state_with(&[("web", 3100)]);
        for version in 1..=3 {
            let d = claim(&mut state, "web", version).unwrap();
            state.update_status(&d.id, DeploymentStatus::Failed).unwrap();
        }
        let versions: Vec<u32> = state.find_all().iter().map(|d| d.version).collect();
        assert_eq!(versions, vec![3, 2, 1]);
    }

    proptest! {
        #[test]
        fn versions_are_consecutive_whatever_the_outcomes(
            outcomes in prop::collection::vec(0u8..3, 1..20)
        ) {
            let mut state = state_with(&[("web", 3100)]);
            let web = ProjectId::new("web");
            for (i, outcome) in outcomes.iter().enumerate() {
                let version = state.next_version(&web);
                prop_assert_eq!(version as usize, i + 1);
                let d = claim(&mut state, "web", version).unwrap();
                let status = match outcome {
                    0 => DeploymentStatus::Failed,
                    1 => DeploymentStatus::Active,
                    _ => DeploymentStatus::RolledBack,
                };
                state.update_status(&d.id, status).unwrap();
            }
            let versions: Vec<u32> = state
                .find_all_for_project(&web)
                .iter()
                .map(|d| d.version)
                .collect();
            let expected: Vec<u32> = (1..=outcomes.len() as u32).rev().collect();
            prop_assert_eq!(versions, expected);
        }
    }
}
