// ABOUTME: DNS-compatible project name validation.
// ABOUTME: Project names prefix container names, so they follow RFC 1123 label rules.

use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProjectNameError {
    #[error("project name cannot be empty")]
    Empty,

    #[error("project name exceeds maximum length of {MAX_LEN} characters")]
    TooLong,

    #[error("project name cannot start with a hyphen")]
    StartsWithHyphen,

    #[error("project name cannot end with a hyphen")]
    EndsWithHyphen,

    #[error("project name must be lowercase")]
    NotLowercase,

    #[error("invalid character in project name: '{0}'")]
    InvalidChar(char),
}

/// Leaves room for the `-v<version>` suffix inside a 63 character label.
const MAX_LEN: usize = 52;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProjectName(String);

impl ProjectName {
    pub fn new(value: &str) -> Result<Self, ProjectNameError> {
        if value.is_empty() {
            return Err(ProjectNameError::Empty);
        }
        if value.len() > MAX_LEN {
            return Err(ProjectNameError::TooLong);
        }
        if value.starts_with('-') {
            return Err(ProjectNameError::StartsWithHyphen);
        }
        if value.ends_with('-') {
            return Err(ProjectNameError::EndsWithHyphen);
        }

        for c in value.chars() {
            if c.is_ascii_uppercase() {
                return Err(ProjectNameError::NotLowercase);
            }
            if !c.is_ascii_lowercase() && !c.is_ascii_digit() && c != '-' {
                return Err(ProjectNameError::InvalidChar(c));
            }
        }

        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Container name for a given version of this project.
    pub fn container_name(&self, version: u32) -> String {
        format!("{}-v{}", self.0, version)
    }
}

impl fmt::Display for ProjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_dns_labels() {
        assert!(ProjectName::new("web").is_ok());
        assert!(ProjectName::new("api-v2").is_ok());
        assert!(ProjectName::new("a1").is_ok());
    }

    #[test]
    fn rejects_invalid_names() {
        assert!(matches!(ProjectName::new(""), Err(ProjectNameError::Empty)));
        assert!(matches!(
            ProjectName::new("-web"),
            Err(ProjectNameError::StartsWithHyphen)
        ));
        assert!(matches!(
            ProjectName::new("web-"),
            Err(ProjectNameError::EndsWithHyphen)
        ));
        assert!(matches!(
            ProjectName::new("Web"),
            Err(ProjectNameError::NotLowercase)
        ));
        assert!(matches!(
            ProjectName::new("web_app"),
            Err(ProjectNameError::InvalidChar('_'))
        ));
        assert!(matches!(
            ProjectName::new(&"a".repeat(53)),
            Err(ProjectNameError::TooLong)
        ));
    }

    #[test]
    fn container_name_includes_version() {
        let name = ProjectName::new("web").unwrap();
        assert_eq!(name.container_name(7), "web-v7");
    }
}
