// ABOUTME: JSON file deployment store shared safely between processes.
// ABOUTME: Writes happen under a lock file and land with an atomic rename.

use async_trait::async_trait;
use snafu::ResultExt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::error::{CorruptSnafu, IoSnafu, StoreError};
use super::lock::StateLock;
use super::model::{ActiveDeployment, Deployment, DeploymentStatus, NewDeployment, Project};
use super::state::StoreState;
use super::DeploymentStore;
use crate::types::{DeploymentId, ProjectId};

/// Deployment store persisted as a single JSON document.
///
/// Mutations take an in-process mutex and then the on-disk [`StateLock`],
/// re-read the file, apply the change and replace the file via rename, so
/// concurrent claims from other processes observe each other's records.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    write_guard: tokio::sync::Mutex<()>,
}

impl FileStore {
    /// Open (or lazily create) the store at `path`.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await.context(IoSnafu {
                action: "create state directory",
                path: parent,
            })?;
        }
        Ok(Self {
            path,
            write_guard: tokio::sync::Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<StoreState, StoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(StoreState::default()),
            Ok(bytes) => serde_json::from_slice(&bytes).context(CorruptSnafu { path: &self.path }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(StoreState::default()),
            Err(e) => Err(e).context(IoSnafu {
                action: "read",
                path: &self.path,
            }),
        }
    }

    async fn save(&self, state: &StoreState) -> Result<(), StoreError> {
        let body = serde_json::to_vec_pretty(state).context(CorruptSnafu { path: &self.path })?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body).await.context(IoSnafu {
            action: "write",
            path: &tmp,
        })?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .context(IoSnafu {
                action: "replace",
                path: &self.path,
            })
    }

    async fn read<T>(&self, f: impl FnOnce(&StoreState) -> T) -> Result<T, StoreError> {
        let state = self.load().await?;
        Ok(f(&state))
    }

    async fn mutate<T>(
        &self,
        f: impl FnOnce(&mut StoreState) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let _guard = self.write_guard.lock().await;
        let lock = StateLock::acquire(&self.path).await?;

        let result = async {
            let mut state = self.load().await?;
            let value = f(&mut state)?;
            self.save(&state).await?;
            Ok(value)
        }
        .await;

        if let Err(e) = lock.release().await {
            tracing::warn!(error = %e, "failed to release state lock");
        }
        result
    }
}

#[async_trait]
impl DeploymentStore for FileStore {
    async fn create_deployment(&self, new: NewDeployment) -> Result<Deployment, StoreError> {
        self.mutate(|state| state.create_deployment(new)).await
    }

    async fn find_by_id(&self, id: &DeploymentId) -> Result<Option<Deployment>, StoreError> {
        self.read(|state| state.find_by_id(id)).await
    }

    async fn find_active_for_project(
        &self,
        project: &ProjectId,
    ) -> Result<Option<Deployment>, StoreError> {
        self.read(|state| state.find_active_for_project(project))
            .await
    }

    async fn find_previous_for_project(
        &self,
        project: &ProjectId,
        before_version: u32,
    ) -> Result<Option<Deployment>, StoreError> {
        self.read(|state| state.find_previous_for_project(project, before_version))
            .await
    }

    async fn find_all_deploying(&self) -> Result<Vec<Deployment>, StoreError> {
        self.read(StoreState::find_all_deploying).await
    }

    async fn find_all_active_with_projects(&self) -> Result<Vec<ActiveDeployment>, StoreError> {
        self.read(StoreState::find_all_active_with_projects).await
    }

    async fn find_all(&self) -> Result<Vec<Deployment>, StoreError> {
        self.read(StoreState::find_all).await
    }

    async fn find_all_for_project(
        &self,
        project: &ProjectId,
    ) -> Result<Vec<Deployment>, StoreError> {
        self.read(|state| state.find_all_for_project(project)).await
    }

    async fn next_version(&self, project: &ProjectId) -> Result<u32, StoreError> {
        self.read(|state| state.next_version(project)).await
    }

    async fn update_status(
        &self,
        id: &DeploymentId,
        status: DeploymentStatus,
    ) -> Result<Deployment, StoreError> {
        self.mutate(|state| state.update_status(id, status)).await
    }

    async fn transition_status(
        &self,
        id: &DeploymentId,
        from: DeploymentStatus,
        to: DeploymentStatus,
    ) -> Result<Deployment, StoreError> {
        self.mutate(|state| state.transition_status(id, from, to))
            .await
    }

    async fn find_project(&self, id: &ProjectId) -> Result<Option<Project>, StoreError> {
        self.read(|state| state.find_project(id)).await
    }

    async fn upsert_project(&self, project: Project) -> Result<(), StoreError> {
        self.mutate(|state| {
            state.upsert_project(project);
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RestartPolicy, ValidationConfig};
    use crate::store::SlotColor;
    use crate::types::ProjectName;

    fn project() -> Project {
        Project {
            id: ProjectId::new("web"),
            name: ProjectName::new("web").unwrap(),
            source: None,
            health_path: "/health".to_string(),
            container_port: 80,
            base_port: 3100,
            restart: RestartPolicy::default(),
            validation: ValidationConfig::default(),
            env: Default::default(),
        }
    }

    fn new_deployment(version: u32) -> NewDeployment {
        NewDeployment {
            project_id: ProjectId::new("web"),
            version,
            image: "web:1".to_string(),
            container_name: format!("web-v{version}"),
            preferred_port: 3100 + version as u16,
            color: SlotColor::Blue,
        }
    }

    #[tokio::test]
    async fn records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/state.json");

        let store = FileStore::open(&path).await.unwrap();
        store.upsert_project(project()).await.unwrap();
        let created = store.create_deployment(new_deployment(1)).await.unwrap();
        store
            .update_status(&created.id, DeploymentStatus::Active)
            .await
            .unwrap();
        drop(store);

        let reopened = FileStore::open(&path).await.unwrap();
        let active = reopened
            .find_active_for_project(&ProjectId::new("web"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(active.id, created.id);
        assert_eq!(reopened.next_version(&ProjectId::new("web")).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn claim_conflicts_across_store_handles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let a = FileStore::open(&path).await.unwrap();
        let b = FileStore::open(&path).await.unwrap();
        a.upsert_project(project()).await.unwrap();

        a.create_deployment(new_deployment(1)).await.unwrap();
        let err = b.create_deployment(new_deployment(2)).await.unwrap_err();
        assert!(matches!(err, StoreError::PendingExists { .. }));
        assert!(!crate::store::LockInfo::lock_path(&path).exists());
    }

    #[tokio::test]
    async fn corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = FileStore::open(&path).await.unwrap();
        let err = store.find_all().await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }
}
