//! Container runtime access through its CLI.
//!
//! Every interaction with the runtime is a blocking, sequential subprocess
//! call: `run`, `stop`, `rm`. Success and failure are communicated through
//! the exit code; `run -d` reports the new container id on stdout.

pub mod detect;
mod docker;
mod spec;

use async_trait::async_trait;

use crate::error::RuntimeError;

pub use self::detect::{RuntimeDetection, RuntimeStatus, check_runtime};
pub use self::docker::DockerCli;
pub use self::spec::{RunMode, RunSpec};

/// Identifier of a container launched by this charm.
///
/// Owned only for the duration of the startup sequence; released with
/// `stop` + `rm` before the sequence completes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContainerHandle(String);

impl ContainerHandle {
    /// Wrap the raw runtime output, trimming trailing whitespace.
    pub fn new(raw: &str) -> Option<Self> {
        let id = raw.trim_end();
        (!id.is_empty()).then(|| Self(id.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ContainerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Operations the charm needs from a container runtime.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// `run` a container and return its stdout once the command exits.
    async fn run(&self, spec: &RunSpec) -> Result<String, RuntimeError>;

    async fn stop(&self, handle: &ContainerHandle) -> Result<(), RuntimeError>;

    async fn remove(&self, handle: &ContainerHandle) -> Result<(), RuntimeError>;

    /// Launch `spec` detached and return the handle the runtime printed.
    async fn run_detached(&self, spec: &RunSpec) -> Result<ContainerHandle, RuntimeError> {
        let spec = spec.clone().mode(RunMode::Detached);
        let stdout = self.run(&spec).await?;
        ContainerHandle::new(&stdout).ok_or_else(|| RuntimeError::EmptyContainerId {
            command: spec.to_args().join(" "),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_trims_trailing_newline() {
        let handle = ContainerHandle::new("3f2a9c0d1e\n").unwrap();
        assert_eq!(handle.as_str(), "3f2a9c0d1e");
        assert_eq!(handle.to_string(), "3f2a9c0d1e");
    }

    #[test]
    fn test_empty_output_is_not_a_handle() {
        assert!(ContainerHandle::new("").is_none());
        assert!(ContainerHandle::new(" \n").is_none());
    }
}
