// ABOUTME: nginx upstream switch: one upstream file per project, replaced then reloaded.
// ABOUTME: Restores the previous upstream file when the reload fails.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::process::Command;

use super::{TrafficError, TrafficSwitch};
use crate::config::TrafficConfig;
use crate::types::ProjectId;

/// Render the upstream block that routes to `port`.
pub fn render_upstream(upstream: &str, port: u16) -> String {
    format!("upstream {upstream} {{\n  server 127.0.0.1:{port};\n}}\n")
}

#[derive(Debug, Clone)]
pub struct NginxSwitch {
    config_dir: PathBuf,
    upstream: String,
    reload_command: Vec<String>,
}

impl NginxSwitch {
    pub fn new(config: &TrafficConfig) -> Self {
        Self {
            config_dir: config.config_dir.clone(),
            upstream: config.upstream.clone(),
            reload_command: config.reload_command.clone(),
        }
    }

    /// Upstream name a project's server blocks should `proxy_pass` to.
    pub fn upstream_name(&self, project: &ProjectId) -> String {
        format!("{}_{}", self.upstream, project)
    }

    /// File holding the project's upstream block.
    pub fn config_path(&self, project: &ProjectId) -> PathBuf {
        self.config_dir
            .join(format!("{}.conf", self.upstream_name(project)))
    }

    async fn replace(&self, path: &Path, content: &[u8]) -> Result<(), TrafficError> {
        let write_err = |source| TrafficError::Write {
            path: path.to_path_buf(),
            source,
        };
        let tmp = tmp_path(path);
        tokio::fs::write(&tmp, content).await.map_err(write_err)?;
        tokio::fs::rename(&tmp, path).await.map_err(write_err)
    }

    async fn reload(&self) -> Result<(), TrafficError> {
        let Some((program, args)) = self.reload_command.split_first() else {
            return Ok(());
        };
        let command = self.reload_command.join(" ");

        let output = Command::new(program)
            .args(args)
            .output()
            .await
            .map_err(|source| TrafficError::ReloadSpawn {
                command: command.clone(),
                source,
            })?;

        if output.status.success() {
            Ok(())
        } else {
            Err(TrafficError::ReloadFailed {
                command,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[async_trait]
impl TrafficSwitch for NginxSwitch {
    async fn switch_to(&self, project: &ProjectId, port: u16) -> Result<(), TrafficError> {
        let path = self.config_path(project);
        let previous = match tokio::fs::read(&path).await {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(source) => return Err(TrafficError::Write { path, source }),
        };

        let upstream = self.upstream_name(project);
        self.replace(&path, render_upstream(&upstream, port).as_bytes())
            .await?;

        if let Err(e) = self.reload().await {
            let restored = match &previous {
                Some(bytes) => self.replace(&path, bytes).await,
                None => tokio::fs::remove_file(&path)
                    .await
                    .map_err(|source| TrafficError::Write {
                        path: path.clone(),
                        source,
                    }),
            };
            if let Err(restore_err) = restored {
                tracing::error!(%project, error = %restore_err, "failed to restore upstream config");
            }
            return Err(e);
        }

        tracing::info!(%project, port, %upstream, path = %path.display(), "traffic switched");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn switch(dir: &Path, reload_command: &[&str]) -> NginxSwitch {
        NginxSwitch::new(&TrafficConfig {
            config_dir: dir.to_path_buf(),
            upstream: "zeroshift".to_string(),
            reload_command: reload_command.iter().map(|s| s.to_string()).collect(),
        })
    }

    fn web() -> ProjectId {
        ProjectId::new("web")
    }

    #[test]
    fn renders_single_server_block() {
        assert_eq!(
            render_upstream("zeroshift_web", 3104),
            "upstream zeroshift_web {\n  server 127.0.0.1:3104;\n}\n"
        );
    }

    #[test]
    fn each_project_gets_its_own_file() {
        let switch = switch(Path::new("/etc/nginx/conf.d"), &[]);
        assert_eq!(switch.upstream_name(&web()), "zeroshift_web");
        assert_eq!(
            switch.config_path(&web()),
            PathBuf::from("/etc/nginx/conf.d/zeroshift_web.conf")
        );
    }

    #[tokio::test]
    async fn switch_replaces_config_without_reload() {
        let dir = tempfile::tempdir().unwrap();
        let switch = switch(dir.path(), &[]);

        switch.switch_to(&web(), 3101).await.unwrap();
        switch.switch_to(&web(), 3102).await.unwrap();

        let content = std::fs::read_to_string(dir.path().join("zeroshift_web.conf")).unwrap();
        assert_eq!(content, render_upstream("zeroshift_web", 3102));
        assert!(!dir.path().join("zeroshift_web.conf.tmp").exists());
    }

    #[tokio::test]
    async fn switching_one_project_leaves_others_routed() {
        let dir = tempfile::tempdir().unwrap();
        let switch = switch(dir.path(), &[]);

        switch.switch_to(&web(), 3101).await.unwrap();
        switch.switch_to(&ProjectId::new("api"), 4101).await.unwrap();

        let web_conf = std::fs::read_to_string(dir.path().join("zeroshift_web.conf")).unwrap();
        let api_conf = std::fs::read_to_string(dir.path().join("zeroshift_api.conf")).unwrap();
        assert_eq!(web_conf, render_upstream("zeroshift_web", 3101));
        assert_eq!(api_conf, render_upstream("zeroshift_api", 4101));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn successful_reload_keeps_new_config() {
        let dir = tempfile::tempdir().unwrap();
        let switch = switch(dir.path(), &["true"]);

        switch.switch_to(&web(), 3105).await.unwrap();

        let content = std::fs::read_to_string(dir.path().join("zeroshift_web.conf")).unwrap();
        assert!(content.contains("127.0.0.1:3105"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failed_reload_restores_previous_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("zeroshift_web.conf");
        std::fs::write(&path, render_upstream("zeroshift_web", 3101)).unwrap();

        let err = switch(dir.path(), &["false"])
            .switch_to(&web(), 3102)
            .await
            .unwrap_err();

        assert!(matches!(err, TrafficError::ReloadFailed { .. }));
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("127.0.0.1:3101"));
    }

    #[tokio::test]
    async fn missing_reload_binary_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = switch(dir.path(), &["zeroshift-no-such-binary"])
            .switch_to(&web(), 3102)
            .await
            .unwrap_err();

        assert!(matches!(err, TrafficError::ReloadSpawn { .. }));
        assert!(!dir.path().join("zeroshift_web.conf").exists());
    }
}
