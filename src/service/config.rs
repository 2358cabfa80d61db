//! Configuration types for the Che service container.

use std::time::Duration;

use crate::runtime::{RunMode, RunSpec};

/// How to launch the Che service through its launcher image.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Name used in log lines.
    pub name: String,
    /// Launcher image, e.g. `eclipse/che:6.9.0`.
    pub image: String,
    /// Volume mounts: (host_path, container_path).
    pub volumes: Vec<(String, String)>,
    /// Environment variables: (name, value).
    pub env: Vec<(String, String)>,
    /// Where the service answers once started.
    pub endpoint: ServiceEndpoint,
    /// Fixed delay between readiness probes.
    pub poll_interval: Duration,
    /// Per-request timeout of a single probe.
    pub probe_timeout: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            image: String::new(),
            volumes: Vec::new(),
            env: Vec::new(),
            endpoint: ServiceEndpoint::default(),
            poll_interval: Duration::from_secs(1),
            probe_timeout: Duration::from_secs(10),
        }
    }
}

impl ServiceConfig {
    /// `start --fast` through a detached launcher (the startup trampoline).
    pub fn start_spec(&self) -> RunSpec {
        self.launcher(RunMode::Detached).args(["start", "--fast"])
    }

    /// `stop` through a throwaway interactive launcher.
    pub fn stop_spec(&self) -> RunSpec {
        self.launcher(RunMode::Interactive).args(["stop"])
    }

    fn launcher(&self, mode: RunMode) -> RunSpec {
        let mut spec = RunSpec::new(self.image.clone()).mode(mode);
        for (host, container) in &self.volumes {
            spec = spec.volume(host.clone(), container.clone());
        }
        for (name, value) in &self.env {
            spec = spec.env(name.clone(), value.clone());
        }
        spec
    }
}

/// Local address of the service's HTTP interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEndpoint {
    pub host: String,
    pub port: u16,
}

impl Default for ServiceEndpoint {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8080,
        }
    }
}

impl ServiceEndpoint {
    /// Get the HTTP URL for this endpoint.
    pub fn http_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    /// URL of `path` on this endpoint.
    pub fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.http_url(), path.trim_start_matches('/'))
    }
}

impl std::fmt::Display for ServiceEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}
