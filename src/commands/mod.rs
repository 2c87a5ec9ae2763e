// ABOUTME: Command module aggregator for the zeroshift CLI.
// ABOUTME: Builds the shared store, runtime and traffic switch for each command.

mod deploy;
mod inspect;
mod reconcile;
mod rollback;

pub use deploy::deploy;
pub use inspect::{list, logs, metrics, status};
pub use reconcile::reconcile;
pub use rollback::rollback;

use std::path::Path;
use std::sync::Arc;
use zeroshift::config::Config;
use zeroshift::error::Result;
use zeroshift::runtime::{BollardRuntime, ContainerRuntime};
use zeroshift::store::{DeploymentStore, FileStore};
use zeroshift::traffic::{NginxSwitch, TrafficSwitch};
use zeroshift::types::ProjectId;

/// Loaded configuration plus the state store, with projects registered.
pub struct App {
    pub config: Config,
    pub store: Arc<dyn DeploymentStore>,
}

impl App {
    /// Load config (explicit path or discovered in `cwd`) and open the store.
    pub async fn open(cwd: &Path, config_path: Option<&Path>) -> Result<Self> {
        let config = match config_path {
            Some(path) => Config::load(path)?,
            None => Config::discover(cwd)?,
        };

        let store = FileStore::open(config.state_path(cwd)).await?;
        for project in config.projects() {
            store.upsert_project(project).await?;
        }
        tracing::debug!(state = %store.path().display(), "state store opened");

        Ok(Self {
            config,
            store: Arc::new(store),
        })
    }

    pub fn runtime(&self) -> Result<Arc<dyn ContainerRuntime>> {
        let runtime = BollardRuntime::connect(self.config.runtime.socket.as_deref())?;
        Ok(Arc::new(runtime))
    }

    pub fn traffic(&self) -> Arc<dyn TrafficSwitch> {
        Arc::new(NginxSwitch::new(&self.config.traffic))
    }
}

pub fn project_id(raw: &str) -> ProjectId {
    ProjectId::new(raw)
}
