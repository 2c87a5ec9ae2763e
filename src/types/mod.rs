// ABOUTME: Type-safe identifiers and validated domain types.
// ABOUTME: Uses phantom types to prevent ID confusion at compile time.

mod id;
mod image_ref;
mod project_name;

pub use id::{DeploymentId, Id, ProjectId};
pub use image_ref::{ImageRef, ParseImageRefError};
pub use project_name::{ProjectName, ProjectNameError};
