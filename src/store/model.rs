// ABOUTME: Persisted records: projects, deployments, statuses and slot colors.
// ABOUTME: Serialized with serde so any store backend can hold them verbatim.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;

use crate::config::{EnvValue, RestartPolicy, ValidationConfig};
use crate::types::{DeploymentId, ProjectId, ProjectName};

/// Lifecycle status of a deployment record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeploymentStatus {
    /// Claimed and in progress. Older records may carry the name `DEPLOYING`.
    #[serde(alias = "DEPLOYING")]
    Pending,
    /// Receiving traffic.
    Active,
    /// Validation failed, the deploy errored, or the container died.
    Failed,
    /// Was active and has been superseded.
    RolledBack,
}

impl DeploymentStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, DeploymentStatus::Failed | DeploymentStatus::RolledBack)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DeploymentStatus::Pending => "PENDING",
            DeploymentStatus::Active => "ACTIVE",
            DeploymentStatus::Failed => "FAILED",
            DeploymentStatus::RolledBack => "ROLLED_BACK",
        }
    }
}

impl fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Human-readable traffic slot. Never used for routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotColor {
    Blue,
    Green,
}

impl SlotColor {
    /// Color for a new deployment given the color currently serving traffic.
    pub fn next_after(active: Option<SlotColor>) -> SlotColor {
        match active {
            Some(SlotColor::Blue) => SlotColor::Green,
            Some(SlotColor::Green) | None => SlotColor::Blue,
        }
    }
}

impl fmt::Display for SlotColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotColor::Blue => f.write_str("blue"),
            SlotColor::Green => f.write_str("green"),
        }
    }
}

/// An application managed by the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: ProjectId,
    #[serde(serialize_with = "serialize_name", deserialize_with = "deserialize_name")]
    pub name: ProjectName,
    #[serde(default)]
    pub source: Option<String>,
    pub health_path: String,
    pub container_port: u16,
    pub base_port: u16,
    #[serde(default)]
    pub restart: RestartPolicy,
    #[serde(default)]
    pub validation: ValidationConfig,
    /// Container environment, resolved when a deployment starts.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub env: HashMap<String, EnvValue>,
}

impl Project {
    /// Host port assigned to a given version.
    ///
    /// Returns `None` when the version would overflow the port range.
    pub fn port_for(&self, version: u32) -> Option<u16> {
        u16::try_from(version)
            .ok()
            .and_then(|v| self.base_port.checked_add(v))
    }
}

fn serialize_name<S: Serializer>(name: &ProjectName, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(name.as_str())
}

fn deserialize_name<'de, D: Deserializer<'de>>(deserializer: D) -> Result<ProjectName, D::Error> {
    let s = String::deserialize(deserializer)?;
    ProjectName::new(&s).map_err(serde::de::Error::custom)
}

/// One attempt to run a specific image for a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deployment {
    pub id: DeploymentId,
    pub project_id: ProjectId,
    pub version: u32,
    pub image: String,
    pub container_name: String,
    pub port: u16,
    pub color: SlotColor,
    pub status: DeploymentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied by the orchestrator when claiming a new deployment.
#[derive(Debug, Clone)]
pub struct NewDeployment {
    pub project_id: ProjectId,
    pub version: u32,
    pub image: String,
    pub container_name: String,
    /// Port to use when no other deployment holds it. The store assigns the
    /// next free port above it otherwise.
    pub preferred_port: u16,
    pub color: SlotColor,
}

/// An active deployment joined with its project (if still registered).
#[derive(Debug, Clone)]
pub struct ActiveDeployment {
    pub deployment: Deployment,
    pub project: Option<Project>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_wire_names() {
        assert_eq!(
            serde_json::to_string(&DeploymentStatus::RolledBack).unwrap(),
            "\"ROLLED_BACK\""
        );
        let parsed: DeploymentStatus = serde_json::from_str("\"ACTIVE\"").unwrap();
        assert_eq!(parsed, DeploymentStatus::Active);
    }

    #[test]
    fn deploying_is_read_as_pending() {
        let parsed: DeploymentStatus = serde_json::from_str("\"DEPLOYING\"").unwrap();
        assert_eq!(parsed, DeploymentStatus::Pending);
    }

    #[test]
    fn terminal_statuses() {
        assert!(DeploymentStatus::Failed.is_terminal());
        assert!(DeploymentStatus::RolledBack.is_terminal());
        assert!(!DeploymentStatus::Pending.is_terminal());
        assert!(!DeploymentStatus::Active.is_terminal());
    }

    #[test]
    fn colors_alternate() {
        assert_eq!(SlotColor::next_after(None), SlotColor::Blue);
        assert_eq!(SlotColor::next_after(Some(SlotColor::Blue)), SlotColor::Green);
        assert_eq!(SlotColor::next_after(Some(SlotColor::Green)), SlotColor::Blue);
    }

    #[test]
    fn port_for_version_checks_overflow() {
        let project = Project {
            id: ProjectId::new("web"),
            name: ProjectName::new("web").unwrap(),
            source: None,
            health_path: "/health".to_string(),
            container_port: 80,
            base_port: 65530,
            restart: RestartPolicy::default(),
            validation: ValidationConfig::default(),
            env: Default::default(),
        };
        assert_eq!(project.port_for(5), Some(65535));
        assert_eq!(project.port_for(6), None);
    }
}
