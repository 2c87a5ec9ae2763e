// ABOUTME: Test support utilities.
// ABOUTME: Scriptable in-process runtime, traffic switch and health probe fakes.

// Each test binary only uses some of these helpers, so allow dead_code.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Once};
use std::time::Duration;
use zeroshift::config::{RestartPolicy, ValidationConfig};
use zeroshift::runtime::{ContainerError, ContainerRuntime, ContainerStats, RunSpec};
use zeroshift::store::{
    Deployment, DeploymentStatus, DeploymentStore, MemoryStore, NewDeployment, Project, SlotColor,
};
use zeroshift::traffic::{TrafficError, TrafficSwitch};
use zeroshift::types::{ProjectId, ProjectName};
use zeroshift::validate::{HealthProbe, ProbeError};

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter = EnvFilter::from_default_env().add_directive("zeroshift=debug".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// Validation settings small enough for tests to run in milliseconds.
pub fn fast_validation(max_retries: u32) -> ValidationConfig {
    ValidationConfig {
        timeout: Duration::from_millis(500),
        max_retries,
        retry_delay: Duration::from_millis(5),
        max_latency: Duration::from_secs(1),
    }
}

pub fn project(id: &str, base_port: u16) -> Project {
    Project {
        id: ProjectId::new(id),
        name: ProjectName::new(id).unwrap(),
        source: None,
        health_path: "/health".to_string(),
        container_port: 3000,
        base_port,
        restart: RestartPolicy::UnlessStopped,
        validation: fast_validation(2),
        env: HashMap::new(),
    }
}

pub async fn store_with(projects: Vec<Project>) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    for project in projects {
        store.upsert_project(project).await.unwrap();
    }
    store
}

/// Insert a deployment record directly and move it to `status`.
pub async fn seed_deployment(
    store: &dyn DeploymentStore,
    project: &Project,
    status: DeploymentStatus,
) -> Deployment {
    let version = store.next_version(&project.id).await.unwrap();
    let color = if version % 2 == 1 {
        SlotColor::Blue
    } else {
        SlotColor::Green
    };
    let created = store
        .create_deployment(NewDeployment {
            project_id: project.id.clone(),
            version,
            image: format!("registry.local/{}:{version}", project.id),
            container_name: project.name.container_name(version),
            preferred_port: project.port_for(version).unwrap(),
            color,
        })
        .await
        .unwrap();

    match status {
        DeploymentStatus::Pending => created,
        DeploymentStatus::RolledBack => {
            store
                .transition_status(&created.id, DeploymentStatus::Pending, DeploymentStatus::Active)
                .await
                .unwrap();
            store
                .transition_status(&created.id, DeploymentStatus::Active, DeploymentStatus::RolledBack)
                .await
                .unwrap()
        }
        other => store
            .transition_status(&created.id, DeploymentStatus::Pending, other)
            .await
            .unwrap(),
    }
}

#[derive(Default)]
struct RuntimeState {
    known: HashSet<String>,
    running: HashSet<String>,
    restarts: HashMap<String, u32>,
    logs: HashMap<String, Vec<String>>,
    pull_error: Option<String>,
    pull_delay: Duration,
    start_dead: bool,
    calls: Vec<String>,
    runs: Vec<RunSpec>,
}

/// Container runtime that keeps containers as names in memory.
#[derive(Default)]
pub struct FakeRuntime {
    state: Mutex<RuntimeState>,
}

impl FakeRuntime {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Delay every image fetch, giving concurrent deploys a point to interleave.
    pub fn set_pull_delay(&self, delay: Duration) {
        self.state.lock().pull_delay = delay;
    }

    pub fn fail_pulls(&self, reason: &str) {
        self.state.lock().pull_error = Some(reason.to_string());
    }

    /// Containers started from now on exit immediately.
    pub fn start_dead(&self) {
        self.state.lock().start_dead = true;
    }

    /// Register a container as existing, running or not.
    pub fn add_container(&self, name: &str, running: bool) {
        let mut state = self.state.lock();
        state.known.insert(name.to_string());
        if running {
            state.running.insert(name.to_string());
        } else {
            state.running.remove(name);
        }
    }

    pub fn set_restarts(&self, name: &str, count: u32) {
        self.state.lock().restarts.insert(name.to_string(), count);
    }

    pub fn set_logs(&self, name: &str, lines: &[&str]) {
        self.state
            .lock()
            .logs
            .insert(name.to_string(), lines.iter().map(|l| l.to_string()).collect());
    }

    pub fn is_running(&self, name: &str) -> bool {
        self.state.lock().running.contains(name)
    }

    /// Every call as "<op> <target>", in order.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    pub fn calls_to(&self, op: &str) -> Vec<String> {
        let prefix = format!("{op} ");
        self.calls()
            .into_iter()
            .filter_map(|c| c.strip_prefix(&prefix).map(str::to_string))
            .collect()
    }

    pub fn runs(&self) -> Vec<RunSpec> {
        self.state.lock().runs.clone()
    }

    fn record(&self, op: &str, target: &str) {
        self.state.lock().calls.push(format!("{op} {target}"));
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn pull_or_build(&self, image: &str) -> Result<(), ContainerError> {
        self.record("pull", image);
        let delay = self.state.lock().pull_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        match self.state.lock().pull_error.clone() {
            Some(reason) => Err(ContainerError::ImageUnavailable {
                image: image.to_string(),
                reason,
            }),
            None => Ok(()),
        }
    }

    async fn run(&self, spec: &RunSpec) -> Result<(), ContainerError> {
        self.record("run", &spec.name);
        let mut state = self.state.lock();
        if state.known.contains(&spec.name) {
            return Err(ContainerError::AlreadyExists(spec.name.clone()));
        }
        state.known.insert(spec.name.clone());
        if !state.start_dead {
            state.running.insert(spec.name.clone());
        }
        state.runs.push(spec.clone());
        Ok(())
    }

    async fn stop(&self, name: &str) -> Result<(), ContainerError> {
        self.record("stop", name);
        let mut state = self.state.lock();
        if !state.known.contains(name) {
            return Err(ContainerError::NotFound(name.to_string()));
        }
        state.running.remove(name);
        Ok(())
    }

    async fn remove(&self, name: &str) -> Result<(), ContainerError> {
        self.record("remove", name);
        let mut state = self.state.lock();
        if !state.known.remove(name) {
            return Err(ContainerError::NotFound(name.to_string()));
        }
        state.running.remove(name);
        Ok(())
    }

    async fn inspect_running(&self, name: &str) -> Result<bool, ContainerError> {
        self.record("inspect", name);
        Ok(self.state.lock().running.contains(name))
    }

    async fn restart_count(&self, name: &str) -> Result<u32, ContainerError> {
        Ok(self.state.lock().restarts.get(name).copied().unwrap_or(0))
    }

    async fn logs(&self, name: &str, max_lines: usize) -> Result<Vec<String>, ContainerError> {
        let state = self.state.lock();
        if !state.known.contains(name) {
            return Err(ContainerError::NotFound(name.to_string()));
        }
        let lines = state.logs.get(name).cloned().unwrap_or_default();
        let skip = lines.len().saturating_sub(max_lines);
        Ok(lines.into_iter().skip(skip).collect())
    }

    async fn stats(&self, name: &str) -> Result<ContainerStats, ContainerError> {
        if !self.state.lock().running.contains(name) {
            return Err(ContainerError::NotFound(name.to_string()));
        }
        Ok(ContainerStats {
            cpu_percent: 1.5,
            memory_used: 64,
            memory_limit: 256,
            net_in: 10,
            net_out: 20,
            block_in: 0,
            block_out: 0,
            pids: 3,
            timestamp: Utc::now(),
        })
    }
}

/// Traffic switch that records every (project, port) it was pointed at.
#[derive(Default)]
pub struct FakeSwitch {
    routes: Mutex<Vec<(String, u16)>>,
    failing: Mutex<bool>,
}

impl FakeSwitch {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail(&self) {
        *self.failing.lock() = true;
    }

    pub fn ports(&self) -> Vec<u16> {
        self.routes.lock().iter().map(|(_, port)| *port).collect()
    }

    /// Port the project was last routed to.
    pub fn routed(&self, project: &str) -> Option<u16> {
        self.routes
            .lock()
            .iter()
            .rev()
            .find(|(p, _)| p == project)
            .map(|(_, port)| *port)
    }
}

#[async_trait]
impl TrafficSwitch for FakeSwitch {
    async fn switch_to(&self, project: &ProjectId, port: u16) -> Result<(), TrafficError> {
        if *self.failing.lock() {
            return Err(TrafficError::ReloadFailed {
                command: "nginx -s reload".to_string(),
                stderr: "emerg: host not found".to_string(),
            });
        }
        self.routes.lock().push((project.to_string(), port));
        Ok(())
    }
}

/// One scripted probe answer.
#[derive(Debug, Clone, Copy)]
pub enum Answer {
    Status(u16),
    /// Status returned after the given delay.
    Slow(u16, Duration),
    Refused,
}

/// Health probe that replays a script, then repeats a fallback answer.
pub struct ScriptedProbe {
    script: Mutex<VecDeque<Answer>>,
    fallback: Answer,
    urls: Mutex<Vec<String>>,
}

impl ScriptedProbe {
    pub fn new(script: &[Answer], fallback: Answer) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.iter().copied().collect()),
            fallback,
            urls: Mutex::new(Vec::new()),
        })
    }

    pub fn healthy() -> Arc<Self> {
        Self::new(&[], Answer::Status(200))
    }

    pub fn unhealthy() -> Arc<Self> {
        Self::new(&[], Answer::Status(503))
    }

    pub fn calls(&self) -> usize {
        self.urls.lock().len()
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().clone()
    }
}

#[async_trait]
impl HealthProbe for ScriptedProbe {
    async fn get(&self, url: &str, _timeout: Duration) -> Result<u16, ProbeError> {
        self.urls.lock().push(url.to_string());
        let answer = self.script.lock().pop_front().unwrap_or(self.fallback);
        match answer {
            Answer::Status(code) => Ok(code),
            Answer::Slow(code, delay) => {
                tokio::time::sleep(delay).await;
                Ok(code)
            }
            Answer::Refused => Err(ProbeError::Connect("connection refused".to_string())),
        }
    }
}
