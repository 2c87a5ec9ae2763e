// ABOUTME: Container runtime abstraction and its Docker Engine adapter.
// ABOUTME: The orchestrator only sees the ContainerRuntime trait.

mod bollard;
mod container;
mod error;

pub use self::bollard::BollardRuntime;
pub use container::{ContainerRuntime, ContainerStats, RunSpec};
pub use error::ContainerError;
