// ABOUTME: Diagnostics accumulator for non-fatal problems during an operation.
// ABOUTME: Collects warnings that should be reported without failing the caller.

use serde::Serialize;

/// Collects non-fatal warnings during deploys and reconciliation.
#[derive(Debug, Default)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    /// Record a warning, auto-logging it via tracing.
    pub fn warn(&mut self, warning: Warning) {
        tracing::warn!(kind = ?warning.kind, "{}", warning.message);
        self.warnings.push(warning);
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn len(&self) -> usize {
        self.warnings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn into_warnings(self) -> Vec<Warning> {
        self.warnings
    }
}

/// A non-fatal warning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
}

impl Warning {
    pub fn container_cleanup(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::ContainerCleanup,
            message: message.into(),
        }
    }

    pub fn status_update(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::StatusUpdate,
            message: message.into(),
        }
    }

    pub fn inspect(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::Inspect,
            message: message.into(),
        }
    }

    pub fn demotion(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::Demotion,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// Stopping or removing a container failed.
    ContainerCleanup,
    /// A status write was rejected or failed.
    StatusUpdate,
    /// Container state could not be determined.
    Inspect,
    /// The previous active deployment could not be retired after cutover.
    Demotion,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostics_starts_empty() {
        let diag = Diagnostics::default();
        assert!(!diag.has_warnings());
        assert!(diag.is_empty());
    }

    #[test]
    fn diagnostics_collects_warnings_in_order() {
        let mut diag = Diagnostics::default();

        diag.warn(Warning::container_cleanup("stop web-v2: timeout"));
        diag.warn(Warning::demotion("web-v1 still ACTIVE"));

        assert_eq!(diag.len(), 2);
        let kinds: Vec<_> = diag.into_warnings().into_iter().map(|w| w.kind).collect();
        assert_eq!(kinds, [WarningKind::ContainerCleanup, WarningKind::Demotion]);
    }

    #[test]
    fn warning_serializes_kind_in_snake_case() {
        let json = serde_json::to_string(&Warning::status_update("x")).unwrap();
        assert_eq!(json, r#"{"kind":"status_update","message":"x"}"#);
    }
}
