//! `HostFramework` over the hook tools the framework puts on PATH.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::HostError;
use crate::host::{AddressKind, HostFramework, PortRange, WorkloadStatus};

/// Invokes `status-set`, `open-port`, `unit-get`, `relation-ids` and
/// `relation-set`.
#[derive(Debug, Clone, Default)]
pub struct HookTools {
    /// Override for the unit's public address (skips `unit-get`).
    public_address: Option<String>,
}

impl HookTools {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_public_address(mut self, address: Option<String>) -> Self {
        self.public_address = address;
        self
    }

    async fn tool(&self, tool: &str, args: &[String]) -> Result<String, HostError> {
        tracing::debug!("{} {}", tool, args.join(" "));

        let output = Command::new(tool)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| HostError::ToolFailed {
                tool: tool.to_string(),
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(HostError::ToolFailed {
                tool: tool.to_string(),
                reason: format!(
                    "exit {}: {}",
                    output.status.code().unwrap_or(-1),
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[async_trait]
impl HostFramework for HookTools {
    async fn status_set(&self, status: WorkloadStatus, message: &str) -> Result<(), HostError> {
        self.tool(
            "status-set",
            &[status.as_str().to_string(), message.to_string()],
        )
        .await
        .map(|_| ())
    }

    async fn open_port(&self, port: &PortRange) -> Result<(), HostError> {
        self.tool("open-port", &[port.to_string()]).await.map(|_| ())
    }

    async fn unit_address(&self, kind: AddressKind) -> Result<String, HostError> {
        if kind == AddressKind::Public
            && let Some(ref address) = self.public_address
        {
            return Ok(address.clone());
        }

        let address = self.tool("unit-get", &[kind.key().to_string()]).await?;
        if address.is_empty() {
            return Err(HostError::InvalidOutput {
                tool: "unit-get".to_string(),
                output: address,
            });
        }
        Ok(address)
    }

    async fn relation_set(
        &self,
        relation: &str,
        settings: &[(String, String)],
    ) -> Result<(), HostError> {
        let ids = self.tool("relation-ids", &[relation.to_string()]).await?;

        for id in ids.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let mut args = vec!["-r".to_string(), id.to_string()];
            args.extend(settings.iter().map(|(k, v)| format!("{}={}", k, v)));
            self.tool("relation-set", &args).await?;
            tracing::debug!("Configured relation {}", id);
        }
        Ok(())
    }
}
