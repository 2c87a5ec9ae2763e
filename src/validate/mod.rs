// ABOUTME: Decides whether a freshly started container is healthy.
// ABOUTME: Bounded health polling with crash-loop and startup failure detection.

mod diagnostic;
mod probe;

pub use diagnostic::{DIAGNOSTIC_TAIL, OUTPUT_BANNER, clean_line, format_diagnostic};
pub use probe::{HealthProbe, HttpProbe, ProbeError};

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::config::ValidationConfig;
use crate::runtime::ContainerRuntime;

/// Log lines fetched when the container never started.
const STARTUP_LOG_LINES: usize = 30;

/// Log lines fetched for crash loops and exhausted retries.
const FAILURE_LOG_LINES: usize = 40;

/// Outcome of validating one container.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationReport {
    pub success: bool,
    /// Latency of the passing request; zero on failure.
    pub latency: Duration,
    /// Reason plus recent container output; set on failure.
    pub diagnostic: Option<String>,
}

impl ValidationReport {
    fn passed(latency: Duration) -> Self {
        Self {
            success: true,
            latency,
            diagnostic: None,
        }
    }

    fn failed(diagnostic: String) -> Self {
        Self {
            success: false,
            latency: Duration::ZERO,
            diagnostic: Some(diagnostic),
        }
    }
}

/// Health validation engine. Never errors and never touches the store.
#[derive(Clone)]
pub struct Validator {
    runtime: Arc<dyn ContainerRuntime>,
    probe: Arc<dyn HealthProbe>,
}

impl Validator {
    pub fn new(runtime: Arc<dyn ContainerRuntime>, probe: Arc<dyn HealthProbe>) -> Self {
        Self { runtime, probe }
    }

    pub async fn validate(
        &self,
        container_url: &str,
        health_path: &str,
        container_name: &str,
        config: &ValidationConfig,
    ) -> ValidationReport {
        let health_url = format!("{container_url}{health_path}");
        tracing::info!(url = %health_url, container = container_name, "starting validation");

        match self.runtime.inspect_running(container_name).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::error!(container = container_name, "container is not running");
                return self
                    .fail(container_name, "Container failed to start", STARTUP_LOG_LINES)
                    .await;
            }
            Err(e) => {
                tracing::error!(container = container_name, error = %e, "container inspection failed");
                let reason = format!("Container failed to start: {e}");
                return self.fail(container_name, &reason, STARTUP_LOG_LINES).await;
            }
        }

        for attempt in 1..=config.max_retries {
            if attempt > 1 {
                match self.runtime.restart_count(container_name).await {
                    Ok(restarts) if restarts > 0 => {
                        tracing::error!(
                            container = container_name,
                            attempt,
                            restarts,
                            "container is crash-looping"
                        );
                        let reason = format!(
                            "App crashed (restarted {restarts}x): check your env vars and startup config"
                        );
                        return self.fail(container_name, &reason, FAILURE_LOG_LINES).await;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!(container = container_name, attempt, error = %e, "restart count unavailable");
                    }
                }
            }

            let start = Instant::now();
            match self.probe.get(&health_url, config.timeout).await {
                Ok(status) if (200..300).contains(&status) => {
                    let latency = start.elapsed();
                    if latency > config.max_latency {
                        tracing::warn!(
                            url = %health_url,
                            attempt,
                            latency_ms = latency.as_millis() as u64,
                            "health response exceeded latency ceiling"
                        );
                    } else {
                        tracing::info!(
                            url = %health_url,
                            attempt,
                            latency_ms = latency.as_millis() as u64,
                            "validation passed"
                        );
                        return ValidationReport::passed(latency);
                    }
                }
                Ok(status) => {
                    tracing::warn!(url = %health_url, attempt, status, "health check returned non-success status");
                }
                Err(e) => {
                    tracing::warn!(url = %health_url, attempt, error = %e, "validation attempt failed");
                }
            }

            if attempt < config.max_retries {
                tokio::time::sleep(config.retry_delay).await;
            }
        }

        let reason = format!("Health check failed after {} attempts", config.max_retries);
        tracing::error!(url = %health_url, container = container_name, "{}", reason);
        self.fail(container_name, &reason, FAILURE_LOG_LINES).await
    }

    async fn fail(&self, container_name: &str, reason: &str, lines: usize) -> ValidationReport {
        match self.runtime.logs(container_name, lines).await {
            Ok(logs) => ValidationReport::failed(format_diagnostic(reason, &logs)),
            Err(e) => {
                tracing::debug!(container = container_name, error = %e, "could not read container logs");
                ValidationReport::failed(format!("{reason}\n\n(container output unavailable: {e})"))
            }
        }
    }
}
