//! Host orchestration framework seam.
//!
//! The framework owns the event loop, relation data and port enforcement.
//! The charm only talks to it through a handful of declarative calls:
//! report a workload status, declare ports open, learn the unit's address,
//! and publish settings on a relation.

mod hook_tools;

use async_trait::async_trait;

use crate::error::HostError;

pub use self::hook_tools::HookTools;

/// Workload status shown to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkloadStatus {
    Maintenance,
    Active,
    Waiting,
    Blocked,
}

impl WorkloadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Maintenance => "maintenance",
            Self::Active => "active",
            Self::Waiting => "waiting",
            Self::Blocked => "blocked",
        }
    }
}

impl std::fmt::Display for WorkloadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which unit address to look up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressKind {
    /// Externally reachable address.
    Public,
    /// Address other units on the model reach this one on.
    Private,
}

impl AddressKind {
    fn key(&self) -> &'static str {
        match self {
            Self::Public => "public-address",
            Self::Private => "private-address",
        }
    }
}

/// A port or inclusive port range to expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortRange {
    pub start: u16,
    pub end: u16,
}

impl PortRange {
    pub fn single(port: u16) -> Self {
        Self::range(port, port)
    }

    pub fn range(start: u16, end: u16) -> Self {
        Self { start, end }
    }
}

impl std::fmt::Display for PortRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.start == self.end {
            write!(f, "{}/tcp", self.start)
        } else {
            write!(f, "{}-{}/tcp", self.start, self.end)
        }
    }
}

/// Calls the charm makes into the host framework.
#[async_trait]
pub trait HostFramework: Send + Sync {
    async fn status_set(&self, status: WorkloadStatus, message: &str) -> Result<(), HostError>;

    /// Declare `port` open for external exposure. Enforcement is external.
    async fn open_port(&self, port: &PortRange) -> Result<(), HostError>;

    async fn unit_address(&self, kind: AddressKind) -> Result<String, HostError>;

    /// Publish `settings` on every established relation named `relation`.
    async fn relation_set(
        &self,
        relation: &str,
        settings: &[(String, String)],
    ) -> Result<(), HostError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_range_display() {
        assert_eq!(PortRange::single(8080).to_string(), "8080/tcp");
        assert_eq!(PortRange::range(32768, 65535).to_string(), "32768-65535/tcp");
    }

    #[test]
    fn test_status_strings() {
        assert_eq!(WorkloadStatus::Maintenance.to_string(), "maintenance");
        assert_eq!(WorkloadStatus::Active.as_str(), "active");
        assert_eq!(WorkloadStatus::Blocked.as_str(), "blocked");
    }
}
