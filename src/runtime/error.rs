// ABOUTME: Errors returned by container runtime adapters.
// ABOUTME: Classifies engine responses so callers can branch on the cause.

/// Errors from container runtime operations.
#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    #[error("failed to connect to container runtime: {0}")]
    Connection(String),

    #[error("container not found: {0}")]
    NotFound(String),

    #[error("container already exists: {0}")]
    AlreadyExists(String),

    #[error("image {image} unavailable: {reason}")]
    ImageUnavailable { image: String, reason: String },

    #[error("runtime error: {0}")]
    Runtime(String),
}

impl ContainerError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ContainerError::NotFound(_))
    }
}

fn status_of(e: &bollard::errors::Error) -> Option<(u16, &str)> {
    match e {
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } => Some((*status_code, message.as_str())),
        _ => None,
    }
}

/// Map an engine error for an operation addressed to a container.
pub(crate) fn map_container_error(e: bollard::errors::Error, container: &str) -> ContainerError {
    match status_of(&e) {
        Some((404, _)) => ContainerError::NotFound(container.to_string()),
        Some((409, message)) => ContainerError::AlreadyExists(message.to_string()),
        _ => ContainerError::Runtime(format!("{}: {}", container, e)),
    }
}

pub(crate) fn map_image_error(e: bollard::errors::Error, image: &str) -> ContainerError {
    ContainerError::ImageUnavailable {
        image: image.to_string(),
        reason: e.to_string(),
    }
}
