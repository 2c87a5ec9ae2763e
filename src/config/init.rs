// ABOUTME: Config scaffolding for new installations.
// ABOUTME: Creates zeroshift.yml template files.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::types::ProjectName;

use super::{CONFIG_FILENAME, DEFAULT_NGINX_DIR, DEFAULT_UPSTREAM};

/// Write a template config into `dir`. Returns the path written.
pub fn init_config(dir: &Path, project: Option<&str>, force: bool) -> Result<PathBuf> {
    let config_path = dir.join(CONFIG_FILENAME);

    if config_path.exists() && !force {
        return Err(Error::AlreadyExists(config_path));
    }

    let project = ProjectName::new(project.unwrap_or("my-app"))?;

    std::fs::write(&config_path, generate_template_yaml(&project))?;
    Ok(config_path)
}

fn generate_template_yaml(project: &ProjectName) -> String {
    format!(
        r#"network: zeroshift-net
state_file: .zeroshift/state.json
traffic:
  config_dir: {DEFAULT_NGINX_DIR}
  upstream: {DEFAULT_UPSTREAM}
  reload_command: ["nginx", "-s", "reload"]
projects:
  - id: {project}
    base_port: 3100
    container_port: 3000
    health_path: /health
    validation:
      timeout: 5s
      max_retries: 5
      retry_delay: 2s
      max_latency: 2s
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn template_parses_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = init_config(dir.path(), Some("shop"), false).unwrap();

        let config = temp_env::with_vars_unset(
            [
                crate::config::ENV_NETWORK,
                crate::config::ENV_STATE_FILE,
                crate::config::ENV_NGINX_DIR,
            ],
            || Config::load(&path),
        )
        .unwrap();
        assert_eq!(config.projects.first().id.as_str(), "shop");
    }

    #[test]
    fn refuses_to_overwrite_without_force() {
        let dir = tempfile::tempdir().unwrap();
        init_config(dir.path(), None, false).unwrap();

        let err = init_config(dir.path(), None, false).unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(_)));
        assert!(init_config(dir.path(), None, true).is_ok());
    }

    #[test]
    fn rejects_invalid_project_name() {
        let dir = tempfile::tempdir().unwrap();
        let err = init_config(dir.path(), Some("Bad Name"), false).unwrap_err();
        assert!(matches!(err, Error::InvalidProjectName(_)));
    }
}
