//! `ContainerRuntime` backed by the `docker` CLI.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::RuntimeError;
use crate::runtime::{ContainerHandle, ContainerRuntime, RunMode, RunSpec};

/// Shells out to the docker binary.
#[derive(Debug, Clone)]
pub struct DockerCli {
    program: String,
}

impl DockerCli {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Ask the daemon for its version. Fails when the daemon is unreachable
    /// even if the client binary works.
    pub async fn server_version(&self) -> Result<String, RuntimeError> {
        let out = self
            .exec(&[
                "version".to_string(),
                "--format".to_string(),
                "{{.Server.Version}}".to_string(),
            ])
            .await?;
        Ok(out.trim().to_string())
    }

    async fn exec(&self, args: &[String]) -> Result<String, RuntimeError> {
        let rendered = format!("{} {}", self.program, args.join(" "));
        tracing::debug!("Running: {}", rendered);

        let output = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| RuntimeError::SpawnFailed {
                program: self.program.clone(),
                reason: e.to_string(),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();

        if !output.status.success() {
            for line in stdout.lines() {
                tracing::warn!("{}", line);
            }
            // Build containers report their errors on stdout.
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let stderr = if stderr.is_empty() {
                output_tail(&stdout, FAILURE_TAIL_LINES)
            } else {
                stderr
            };
            return Err(RuntimeError::CommandFailed {
                command: rendered,
                code: output.status.code().unwrap_or(-1),
                stderr,
            });
        }

        tracing::trace!("{} stdout: {}", self.program, stdout.trim_end());
        Ok(stdout)
    }
}

/// Lines of stdout kept in the error when a command fails silently on stderr.
const FAILURE_TAIL_LINES: usize = 20;

/// The last `lines` non-empty lines of `text`.
fn output_tail(text: &str, lines: usize) -> String {
    let kept: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    kept[kept.len().saturating_sub(lines)..].join("\n")
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new("docker")
    }
}

#[async_trait]
impl ContainerRuntime for DockerCli {
    async fn run(&self, spec: &RunSpec) -> Result<String, RuntimeError> {
        let stdout = self.exec(&spec.to_args()).await?;
        if spec.mode != RunMode::Detached {
            for line in stdout.lines().filter(|l| !l.trim().is_empty()) {
                tracing::info!("{}", line);
            }
        }
        Ok(stdout)
    }

    async fn stop(&self, handle: &ContainerHandle) -> Result<(), RuntimeError> {
        self.exec(&["stop".to_string(), handle.to_string()])
            .await
            .map(|_| ())
    }

    async fn remove(&self, handle: &ContainerHandle) -> Result<(), RuntimeError> {
        self.exec(&["rm".to_string(), handle.to_string()])
            .await
            .map(|_| ())
    }
}
