// ABOUTME: Settings for the nginx upstream traffic switch.
// ABOUTME: Upstream file directory, upstream name prefix and reload command.

use serde::Deserialize;
use std::path::PathBuf;

pub const DEFAULT_NGINX_DIR: &str = "/etc/nginx/conf.d";
pub const DEFAULT_UPSTREAM: &str = "zeroshift";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TrafficConfig {
    /// Directory receiving one `{upstream}_{project}.conf` file per project.
    #[serde(default = "default_config_dir")]
    pub config_dir: PathBuf,

    /// Prefix of each project's upstream name, `{upstream}_{project}`.
    #[serde(default = "default_upstream")]
    pub upstream: String,

    /// Command run after the upstream file is replaced. Empty disables reloading.
    #[serde(default = "default_reload_command")]
    pub reload_command: Vec<String>,
}

fn default_config_dir() -> PathBuf {
    PathBuf::from(DEFAULT_NGINX_DIR)
}

fn default_upstream() -> String {
    DEFAULT_UPSTREAM.to_string()
}

fn default_reload_command() -> Vec<String> {
    vec!["nginx".to_string(), "-s".to_string(), "reload".to_string()]
}

impl Default for TrafficConfig {
    fn default() -> Self {
        TrafficConfig {
            config_dir: default_config_dir(),
            upstream: default_upstream(),
            reload_command: default_reload_command(),
        }
    }
}
