// ABOUTME: Configuration types and parsing for zeroshift.yml.
// ABOUTME: Handles YAML parsing, environment overrides and project registration.

mod env_value;
mod init;
mod restart_policy;
mod traffic;
mod validation;

pub use env_value::{EnvValue, resolve_env_map};
pub use init::init_config;
pub use restart_policy::RestartPolicy;
pub use traffic::{DEFAULT_NGINX_DIR, DEFAULT_UPSTREAM, TrafficConfig};
pub use validation::ValidationConfig;

use crate::error::{Error, Result};
use crate::store::Project;
use crate::types::{ProjectId, ProjectName};
use nonempty::NonEmpty;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

pub const CONFIG_FILENAME: &str = "zeroshift.yml";
pub const CONFIG_FILENAME_ALT: &str = "zeroshift.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".zeroshift/config.yml";

pub const ENV_NETWORK: &str = "ZEROSHIFT_NETWORK";
pub const ENV_STATE_FILE: &str = "ZEROSHIFT_STATE_FILE";
pub const ENV_NGINX_DIR: &str = "ZEROSHIFT_NGINX_DIR";

/// Host port base of the first project that does not set `base_port`.
pub const DEFAULT_BASE_PORT: u16 = 3100;
/// Gap between the defaulted port bases of consecutive projects.
pub const BASE_PORT_STRIDE: u16 = 100;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Container network every deployment joins.
    #[serde(default = "default_network")]
    pub network: String,

    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,

    #[serde(default)]
    pub traffic: TrafficConfig,

    #[serde(default)]
    pub runtime: RuntimeConfig,

    #[serde(deserialize_with = "deserialize_projects")]
    pub projects: NonEmpty<ProjectConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RuntimeConfig {
    /// Docker socket path. Falls back to DOCKER_HOST, then the platform default.
    #[serde(default)]
    pub socket: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProjectConfig {
    #[serde(deserialize_with = "deserialize_project_name")]
    pub id: ProjectName,

    /// Defaults to the id.
    #[serde(default, deserialize_with = "deserialize_project_name_option")]
    pub name: Option<ProjectName>,

    #[serde(default)]
    pub source: Option<String>,

    /// Defaults to `DEFAULT_BASE_PORT`, offset by the project's position.
    #[serde(default)]
    pub base_port: Option<u16>,

    #[serde(default = "default_container_port")]
    pub container_port: u16,

    #[serde(default = "default_health_path")]
    pub health_path: String,

    #[serde(default)]
    pub restart: RestartPolicy,

    #[serde(default)]
    pub validation: ValidationConfig,

    #[serde(default)]
    pub env: HashMap<String, EnvValue>,
}

fn default_network() -> String {
    "zeroshift-net".to_string()
}

fn default_state_file() -> PathBuf {
    PathBuf::from(".zeroshift/state.json")
}

fn default_container_port() -> u16 {
    3000
}

fn default_health_path() -> String {
    "/health".to_string()
}

impl ProjectConfig {
    pub fn to_project(&self, default_base_port: u16) -> Project {
        Project {
            id: ProjectId::new(self.id.as_str()),
            name: self.name.clone().unwrap_or_else(|| self.id.clone()),
            source: self.source.clone(),
            health_path: self.health_path.clone(),
            container_port: self.container_port,
            base_port: self.base_port.unwrap_or(default_base_port),
            restart: self.restart,
            validation: self.validation.clone(),
            env: self.env.clone(),
        }
    }
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let mut config: Config = serde_yaml::from_str(yaml)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn discover(dir: &Path) -> Result<Self> {
        let candidates = [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ];

        for path in &candidates {
            if path.exists() {
                return Self::load(path);
            }
        }

        Err(Error::ConfigNotFound(dir.to_path_buf()))
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(network) = std::env::var(ENV_NETWORK)
            && !network.is_empty()
        {
            self.network = network;
        }
        if let Ok(state_file) = std::env::var(ENV_STATE_FILE)
            && !state_file.is_empty()
        {
            self.state_file = PathBuf::from(state_file);
        }
        if let Ok(nginx) = std::env::var(ENV_NGINX_DIR)
            && !nginx.is_empty()
        {
            self.traffic.config_dir = PathBuf::from(nginx);
        }
    }

    fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        let mut base_ports = HashMap::new();
        for project in self.projects.iter() {
            if let Some(port) = project.base_port
                && let Some(other) = base_ports.insert(port, project.id.as_str())
            {
                return Err(Error::InvalidConfig(format!(
                    "projects {other} and {}: base_port {port} is used twice",
                    project.id
                )));
            }
            if !seen.insert(project.id.as_str()) {
                return Err(Error::InvalidConfig(format!(
                    "duplicate project id: {}",
                    project.id
                )));
            }
            if project.validation.max_retries == 0 {
                return Err(Error::InvalidConfig(format!(
                    "project {}: validation.max_retries must be at least 1",
                    project.id
                )));
            }
            if !project.health_path.starts_with('/') {
                return Err(Error::InvalidConfig(format!(
                    "project {}: health_path must start with '/'",
                    project.id
                )));
            }
        }
        if self.network.is_empty() {
            return Err(Error::InvalidConfig("network cannot be empty".to_string()));
        }
        Ok(())
    }

    /// Projects as store records, in declaration order.
    pub fn projects(&self) -> Vec<Project> {
        self.projects
            .iter()
            .enumerate()
            .map(|(index, project)| project.to_project(default_base_port(index)))
            .collect()
    }

    /// Resolve the state file against the directory the config was found in.
    pub fn state_path(&self, base: &Path) -> PathBuf {
        if self.state_file.is_absolute() {
            self.state_file.clone()
        } else {
            base.join(&self.state_file)
        }
    }
}

fn default_base_port(index: usize) -> u16 {
    u16::try_from(index)
        .ok()
        .and_then(|i| i.checked_mul(BASE_PORT_STRIDE))
        .and_then(|offset| DEFAULT_BASE_PORT.checked_add(offset))
        .unwrap_or(DEFAULT_BASE_PORT)
}

fn deserialize_project_name<'de, D>(deserializer: D) -> std::result::Result<ProjectName, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    ProjectName::new(&s).map_err(serde::de::Error::custom)
}

fn deserialize_project_name_option<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<ProjectName>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    opt.map(|s| ProjectName::new(&s).map_err(serde::de::Error::custom))
        .transpose()
}

fn deserialize_projects<'de, D>(
    deserializer: D,
) -> std::result::Result<NonEmpty<ProjectConfig>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let projects: Vec<ProjectConfig> = Vec::deserialize(deserializer)?;
    NonEmpty::from_vec(projects)
        .ok_or_else(|| serde::de::Error::custom("at least one project is required"))
}
