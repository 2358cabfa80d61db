//! Container runtime detection.
//!
//! Decides whether the `docker.available` flag holds: the runtime binary
//! must be on PATH *and* its daemon must answer. A charm that runs before
//! the docker layer finished installing sees `NotInstalled` or
//! `NotRunning` and waits for a later hook.

use std::process::Stdio;

use crate::runtime::DockerCli;

/// Container runtime availability status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeStatus {
    /// Binary found on PATH and daemon responding.
    Available,
    /// Binary not found on PATH.
    NotInstalled,
    /// Binary found but daemon not responding.
    NotRunning,
}

impl RuntimeStatus {
    /// Returns true if the runtime is available and ready.
    pub fn is_ok(&self) -> bool {
        matches!(self, RuntimeStatus::Available)
    }

    /// Human-readable status string.
    pub fn as_str(&self) -> &'static str {
        match self {
            RuntimeStatus::Available => "available",
            RuntimeStatus::NotInstalled => "not installed",
            RuntimeStatus::NotRunning => "not running",
        }
    }

    /// What the operator can do about it.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            RuntimeStatus::Available => None,
            RuntimeStatus::NotInstalled => {
                Some("Install Docker Engine: https://docs.docker.com/engine/install/")
            }
            RuntimeStatus::NotRunning => {
                Some("Start the Docker daemon: sudo systemctl start docker")
            }
        }
    }
}

/// Result of a runtime detection check.
#[derive(Debug, Clone)]
pub struct RuntimeDetection {
    pub status: RuntimeStatus,
    /// Daemon version when available.
    pub server_version: Option<String>,
}

/// Check whether the runtime is installed and running.
///
/// 1. Checks if the runtime binary exists on PATH
/// 2. If found, asks the daemon for its version
/// 3. Returns `Available`, `NotInstalled`, or `NotRunning`
pub async fn check_runtime(cli: &DockerCli) -> RuntimeDetection {
    if !binary_exists(cli.program()).await {
        return RuntimeDetection {
            status: RuntimeStatus::NotInstalled,
            server_version: None,
        };
    }

    match cli.server_version().await {
        Ok(version) => RuntimeDetection {
            status: RuntimeStatus::Available,
            server_version: Some(version),
        },
        Err(e) => {
            tracing::debug!("Runtime daemon not reachable: {}", e);
            RuntimeDetection {
                status: RuntimeStatus::NotRunning,
                server_version: None,
            }
        }
    }
}

/// Check if `program` resolves to an executable.
async fn binary_exists(program: &str) -> bool {
    if program.contains('/') {
        return tokio::fs::metadata(program)
            .await
            .is_ok_and(|m| m.is_file());
    }

    tokio::process::Command::new("which")
        .arg(program)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .is_ok_and(|s| s.success())
}
