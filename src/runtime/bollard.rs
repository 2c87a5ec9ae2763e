// ABOUTME: Bollard-based container runtime implementation.
// ABOUTME: Talks to the Docker Engine API over its unix socket or DOCKER_HOST.

use async_trait::async_trait;
use bollard::Docker;
use bollard::models::{ContainerCreateBody, HostConfig, PortBinding, RestartPolicy, RestartPolicyNameEnum};
use bollard::query_parameters::{
    CreateContainerOptions, CreateImageOptions, InspectContainerOptions, LogsOptions,
    RemoveContainerOptions, StartContainerOptions, StatsOptions, StopContainerOptions,
};
use chrono::Utc;
use futures::StreamExt;
use std::collections::HashMap;
use std::path::Path;

use super::container::{ContainerRuntime, ContainerStats, RunSpec};
use super::error::{ContainerError, map_container_error, map_image_error};
use crate::config::RestartPolicy as RestartPolicyConfig;

/// Seconds a container gets to exit after SIGTERM before it is killed.
const STOP_TIMEOUT_SECS: i32 = 10;

const CONNECT_TIMEOUT_SECS: u64 = 120;

/// Docker Engine API runtime.
#[derive(Debug, Clone)]
pub struct BollardRuntime {
    client: Docker,
}

impl BollardRuntime {
    pub fn new(client: Docker) -> Self {
        Self { client }
    }

    /// Connect to the engine at `socket`, or via DOCKER_HOST and the platform
    /// default when no socket is configured.
    pub fn connect(socket: Option<&Path>) -> Result<Self, ContainerError> {
        let client = match socket {
            Some(path) => Docker::connect_with_unix(
                &path.to_string_lossy(),
                CONNECT_TIMEOUT_SECS,
                bollard::API_DEFAULT_VERSION,
            ),
            None => Docker::connect_with_local_defaults(),
        }
        .map_err(|e| ContainerError::Connection(e.to_string()))?;
        Ok(Self::new(client))
    }

    pub async fn ping(&self) -> Result<(), ContainerError> {
        self.client
            .ping()
            .await
            .map_err(|e| ContainerError::Connection(e.to_string()))?;
        Ok(())
    }

    async fn image_exists(&self, image: &str) -> Result<bool, ContainerError> {
        match self.client.inspect_image(image).await {
            Ok(_) => Ok(true),
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => Ok(false),
            Err(e) => Err(map_image_error(e, image)),
        }
    }

    async fn inspect(
        &self,
        name: &str,
    ) -> Result<bollard::models::ContainerInspectResponse, ContainerError> {
        self.client
            .inspect_container(name, None::<InspectContainerOptions>)
            .await
            .map_err(|e| map_container_error(e, name))
    }
}

fn restart_policy(policy: RestartPolicyConfig) -> RestartPolicy {
    match policy {
        RestartPolicyConfig::Always => RestartPolicy {
            name: Some(RestartPolicyNameEnum::ALWAYS),
            maximum_retry_count: None,
        },
        RestartPolicyConfig::UnlessStopped => RestartPolicy {
            name: Some(RestartPolicyNameEnum::UNLESS_STOPPED),
            maximum_retry_count: None,
        },
        RestartPolicyConfig::OnFailure { max_retries } => RestartPolicy {
            name: Some(RestartPolicyNameEnum::ON_FAILURE),
            maximum_retry_count: max_retries.map(i64::from),
        },
    }
}

fn container_body(spec: &RunSpec) -> ContainerCreateBody {
    let port_key = format!("{}/tcp", spec.container_port);

    let mut port_bindings: HashMap<String, Option<Vec<PortBinding>>> = HashMap::new();
    port_bindings.insert(
        port_key.clone(),
        Some(vec![PortBinding {
            host_ip: Some("127.0.0.1".to_string()),
            host_port: Some(spec.host_port.to_string()),
        }]),
    );

    let host_config = HostConfig {
        restart_policy: Some(restart_policy(spec.restart)),
        port_bindings: Some(port_bindings),
        network_mode: Some(spec.network.clone()),
        ..Default::default()
    };

    let mut env: Vec<String> = spec.env.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
    env.sort();

    ContainerCreateBody {
        image: Some(spec.image.clone()),
        env: if env.is_empty() { None } else { Some(env) },
        labels: if spec.labels.is_empty() {
            None
        } else {
            Some(spec.labels.clone())
        },
        exposed_ports: Some(vec![port_key]),
        host_config: Some(host_config),
        ..Default::default()
    }
}

/// CPU usage as a percentage of one core, scaled by online cores.
pub(crate) fn cpu_percent(
    total: u64,
    pre_total: u64,
    system: u64,
    pre_system: u64,
    online_cpus: u32,
) -> f64 {
    let cpu_delta = total.saturating_sub(pre_total) as f64;
    let system_delta = system.saturating_sub(pre_system) as f64;
    if system_delta <= 0.0 || cpu_delta <= 0.0 {
        return 0.0;
    }
    (cpu_delta / system_delta) * f64::from(online_cpus.max(1)) * 100.0
}

fn to_stats(raw: bollard::models::ContainerStatsResponse) -> ContainerStats {
    let usage = |s: &Option<bollard::models::ContainerCpuStats>| {
        s.as_ref()
            .map(|c| {
                (
                    c.cpu_usage.as_ref().and_then(|u| u.total_usage).unwrap_or(0),
                    c.system_cpu_usage.unwrap_or(0),
                    c.online_cpus.unwrap_or(1),
                )
            })
            .unwrap_or((0, 0, 1))
    };
    let (total, system, cpus) = usage(&raw.cpu_stats);
    let (pre_total, pre_system, _) = usage(&raw.precpu_stats);

    let (net_in, net_out) = raw
        .networks
        .as_ref()
        .map(|nets| {
            nets.values().fold((0, 0), |(rx, tx), n| {
                (rx + n.rx_bytes.unwrap_or(0), tx + n.tx_bytes.unwrap_or(0))
            })
        })
        .unwrap_or((0, 0));

    let (block_in, block_out) = raw
        .blkio_stats
        .as_ref()
        .and_then(|b| b.io_service_bytes_recursive.as_ref())
        .map(|entries| {
            entries.iter().fold((0, 0), |(read, write), entry| {
                let value = entry.value.unwrap_or(0);
                match entry.op.as_deref().map(str::to_ascii_lowercase).as_deref() {
                    Some("read") => (read + value, write),
                    Some("write") => (read, write + value),
                    _ => (read, write),
                }
            })
        })
        .unwrap_or((0, 0));

    ContainerStats {
        cpu_percent: cpu_percent(total, pre_total, system, pre_system, cpus),
        memory_used: raw.memory_stats.as_ref().and_then(|m| m.usage).unwrap_or(0),
        memory_limit: raw.memory_stats.as_ref().and_then(|m| m.limit).unwrap_or(0),
        net_in,
        net_out,
        block_in,
        block_out,
        pids: raw.pids_stats.as_ref().and_then(|p| p.current).unwrap_or(0),
        timestamp: Utc::now(),
    }
}

#[async_trait]
impl ContainerRuntime for BollardRuntime {
    async fn pull_or_build(&self, image: &str) -> Result<(), ContainerError> {
        let opts = CreateImageOptions {
            from_image: Some(image.to_string()),
            ..Default::default()
        };

        let mut stream = self.client.create_image(Some(opts), None, None);
        let mut pull_error = None;
        while let Some(result) = stream.next().await {
            if let Err(e) = result {
                pull_error = Some(e);
                break;
            }
        }

        match pull_error {
            None => Ok(()),
            Some(e) => {
                // Locally built images have no registry to pull from.
                if self.image_exists(image).await? {
                    tracing::info!(image, error = %e, "pull failed, using local image");
                    Ok(())
                } else {
                    Err(map_image_error(e, image))
                }
            }
        }
    }

    async fn run(&self, spec: &RunSpec) -> Result<(), ContainerError> {
        let opts = CreateContainerOptions {
            name: Some(spec.name.clone()),
            ..Default::default()
        };

        self.client
            .create_container(Some(opts), container_body(spec))
            .await
            .map_err(|e| map_container_error(e, &spec.name))?;

        self.client
            .start_container(&spec.name, None::<StartContainerOptions>)
            .await
            .map_err(|e| map_container_error(e, &spec.name))
    }

    async fn stop(&self, name: &str) -> Result<(), ContainerError> {
        let opts = StopContainerOptions {
            t: Some(STOP_TIMEOUT_SECS),
            signal: None,
        };

        match self.client.stop_container(name, Some(opts)).await {
            Ok(()) => Ok(()),
            // 304: already stopped
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 304, ..
            }) => Ok(()),
            Err(e) => Err(map_container_error(e, name)),
        }
    }

    async fn remove(&self, name: &str) -> Result<(), ContainerError> {
        let opts = RemoveContainerOptions {
            force: true,
            ..Default::default()
        };

        self.client
            .remove_container(name, Some(opts))
            .await
            .map_err(|e| map_container_error(e, name))
    }

    async fn inspect_running(&self, name: &str) -> Result<bool, ContainerError> {
        match self.inspect(name).await {
            Ok(details) => Ok(details
                .state
                .and_then(|s| s.running)
                .unwrap_or(false)),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn restart_count(&self, name: &str) -> Result<u32, ContainerError> {
        let details = self.inspect(name).await?;
        Ok(details
            .restart_count
            .and_then(|n| u32::try_from(n).ok())
            .unwrap_or(0))
    }

    async fn logs(&self, name: &str, max_lines: usize) -> Result<Vec<String>, ContainerError> {
        let opts = LogsOptions {
            stdout: true,
            stderr: true,
            tail: max_lines.to_string(),
            ..Default::default()
        };

        let mut stream = self.client.logs(name, Some(opts));
        let mut output = String::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| map_container_error(e, name))?;
            output.push_str(&String::from_utf8_lossy(&chunk.into_bytes()));
        }

        let mut lines: Vec<String> = output.lines().map(str::to_string).collect();
        if lines.len() > max_lines {
            lines.drain(..lines.len() - max_lines);
        }
        Ok(lines)
    }

    async fn stats(&self, name: &str) -> Result<ContainerStats, ContainerError> {
        let opts = StatsOptions {
            stream: false,
            one_shot: false,
        };

        let mut stream = self.client.stats(name, Some(opts));
        match stream.next().await {
            Some(Ok(raw)) => Ok(to_stats(raw)),
            Some(Err(e)) => Err(map_container_error(e, name)),
            None => Err(ContainerError::Runtime(format!(
                "{}: no stats returned",
                name
            ))),
        }
    }
}
