// ABOUTME: Health validation settings for a project.
// ABOUTME: Request timeout, retry budget, retry delay and latency ceiling.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Timeout of a single health request.
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    /// Attempts before giving up.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_delay", with = "humantime_serde")]
    pub retry_delay: Duration,

    /// A 2xx slower than this counts as a failed attempt.
    #[serde(default = "default_max_latency", with = "humantime_serde")]
    pub max_latency: Duration,
}

fn default_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_max_retries() -> u32 {
    5
}

fn default_retry_delay() -> Duration {
    Duration::from_secs(2)
}

fn default_max_latency() -> Duration {
    Duration::from_secs(2)
}

impl Default for ValidationConfig {
    fn default() -> Self {
        ValidationConfig {
            timeout: default_timeout(),
            max_retries: default_max_retries(),
            retry_delay: default_retry_delay(),
            max_latency: default_max_latency(),
        }
    }
}

impl ValidationConfig {
    /// Upper bound on the retry loop: `max_retries × (timeout + retry_delay)`.
    pub fn worst_case(&self) -> Duration {
        (self.timeout + self.retry_delay).saturating_mul(self.max_retries)
    }
}
