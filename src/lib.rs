// ABOUTME: Library root for zeroshift - blue-green deployment orchestration.
// ABOUTME: The main binary is in main.rs.

pub mod config;
pub mod deploy;
pub mod diagnostics;
pub mod error;
pub mod output;
pub mod runtime;
pub mod store;
pub mod traffic;
pub mod types;
pub mod validate;
