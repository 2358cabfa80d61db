//! Configuration for the charm.
//!
//! Settings are loaded with priority: env var > options file > default.
//! `.env` files are loaded via dotenvy before resolution, so anything the
//! operator drops there behaves like a real env var.

pub(crate) mod helpers;
mod options;

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;
use crate::host::PortRange;
use crate::service::{ServiceConfig, ServiceEndpoint};

pub use self::helpers::{Layered, ProcessEnv, VarSource};
pub use self::options::{CharmOptions, DEFAULT_OPTIONS_FILE};

use self::helpers::{optional_env, parse_optional_env};

/// Che image repository.
pub const CHE_IMAGE_REPO: &str = "eclipse/che";

/// Port the Che dashboard listens on.
pub const CHE_UI_PORT: u16 = 8080;

/// Which flavour of the Che install flow to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Variant {
    /// Che 6 with multi-user mode and custom assembly support.
    #[default]
    MultiUser,
    /// Che 5 single-user flow with stack registration after install.
    Legacy,
}

impl Variant {
    pub fn default_che_version(&self) -> &'static str {
        match self {
            Self::MultiUser => "6.9.0",
            Self::Legacy => "5.22.0",
        }
    }

    /// Interval between readiness probes when nothing is configured.
    pub fn default_poll_interval(&self) -> Duration {
        match self {
            Self::MultiUser => Duration::from_secs(100),
            Self::Legacy => Duration::from_secs(1),
        }
    }

    /// Ports declared open once Che is up.
    pub fn exposed_ports(&self) -> Vec<PortRange> {
        let mut ports = vec![
            // Dashboard
            PortRange::single(CHE_UI_PORT),
            // Workspace containers
            PortRange::range(32768, 65535),
        ];
        if *self == Self::MultiUser {
            // Keycloak
            ports.push(PortRange::single(5050));
        }
        ports
    }
}

impl std::fmt::Display for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MultiUser => write!(f, "multiuser"),
            Self::Legacy => write!(f, "legacy"),
        }
    }
}

impl std::str::FromStr for Variant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "multiuser" | "multi-user" | "che6" => Ok(Self::MultiUser),
            "legacy" | "single-user" | "che5" => Ok(Self::Legacy),
            _ => Err(format!(
                "invalid variant '{}', expected 'multiuser' or 'legacy'",
                s
            )),
        }
    }
}

/// Resolved charm configuration.
#[derive(Debug, Clone)]
pub struct CharmConfig {
    pub variant: Variant,
    /// Full image reference, e.g. `eclipse/che:6.9.0`.
    pub image: String,
    /// Home directory holding `data/`, `assembly/` and `.m2/`.
    pub home: PathBuf,
    /// Unpacked charm directory (templates and files).
    pub charm_dir: PathBuf,
    /// Optional image that builds a custom assembly before start.
    pub assembly_image: Option<String>,
    /// Where Che answers HTTP once it is up.
    pub endpoint: ServiceEndpoint,
    pub poll_interval: Duration,
    /// Per-request timeout of a single readiness probe.
    pub probe_timeout: Duration,
    /// Container runtime binary.
    pub docker_bin: String,
    /// Runtime control socket mounted into the Che launcher.
    pub docker_socket: PathBuf,
    pub state_file: PathBuf,
    /// Overrides the address reported by the host framework.
    pub public_ip: Option<String>,
    /// Template files copied into the live data directory (legacy only).
    pub templates: Vec<String>,
}

impl CharmConfig {
    /// Resolve from the process environment.
    pub fn from_env(options_file: Option<&Path>) -> Result<Self, ConfigError> {
        Self::resolve(&ProcessEnv, options_file)
    }

    /// Resolve from `source`, loading the options file from `options_file`
    /// or `$CHARM_DIR/charm-options.toml`.
    pub fn resolve(
        source: &dyn VarSource,
        options_file: Option<&Path>,
    ) -> Result<Self, ConfigError> {
        let charm_dir = optional_env(source, "CHARM_DIR")?
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        let options_path = options_file
            .map(Path::to_path_buf)
            .unwrap_or_else(|| charm_dir.join(DEFAULT_OPTIONS_FILE));
        let options = CharmOptions::load(&options_path)?;

        Self::resolve_with_options(source, charm_dir, &options)
    }

    pub(crate) fn resolve_with_options(
        source: &dyn VarSource,
        charm_dir: PathBuf,
        options: &CharmOptions,
    ) -> Result<Self, ConfigError> {
        let variant_name =
            optional_env(source, "CHE_VARIANT")?.or_else(|| options.variant.clone());
        let variant: Variant = match variant_name {
            Some(v) => v.parse().map_err(|message| ConfigError::InvalidValue {
                key: "CHE_VARIANT".to_string(),
                message,
            })?,
            None => Variant::default(),
        };

        let image = match optional_env(source, "CHE_IMAGE")? {
            Some(image) => image,
            None => {
                let version = optional_env(source, "CHE_VERSION")?
                    .or_else(|| options.che_version.clone())
                    .unwrap_or_else(|| variant.default_che_version().to_string());
                format!("{}:{}", CHE_IMAGE_REPO, version)
            }
        };

        let poll_interval_secs = parse_optional_env(
            source,
            "CHE_POLL_INTERVAL_SECS",
            options
                .poll_interval_secs
                .unwrap_or(variant.default_poll_interval().as_secs()),
        )?;
        if poll_interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "CHE_POLL_INTERVAL_SECS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        let probe_timeout_secs: u64 = parse_optional_env(source, "CHE_PROBE_TIMEOUT_SECS", 10)?;

        let endpoint = ServiceEndpoint {
            host: optional_env(source, "CHE_ENDPOINT_HOST")?
                .unwrap_or_else(|| "localhost".to_string()),
            port: parse_optional_env(source, "CHE_ENDPOINT_PORT", CHE_UI_PORT)?,
        };

        let state_file = optional_env(source, "CHE_STATE_FILE")?
            .map(PathBuf::from)
            .unwrap_or_else(|| charm_dir.join(".che-charm-state.json"));

        Ok(Self {
            variant,
            image,
            home: optional_env(source, "CHE_HOME")?
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("/home/ubuntu")),
            assembly_image: optional_env(source, "CHE_ASSEMBLY_IMAGE")?
                .or_else(|| options.assembly_image().map(str::to_string)),
            endpoint,
            poll_interval: Duration::from_secs(poll_interval_secs),
            probe_timeout: Duration::from_secs(probe_timeout_secs),
            docker_bin: optional_env(source, "CHE_DOCKER_BIN")?
                .unwrap_or_else(|| "docker".to_string()),
            docker_socket: optional_env(source, "CHE_DOCKER_SOCKET")?
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("/var/run/docker.sock")),
            state_file,
            public_ip: optional_env(source, "CHE_PUBLIC_IP")?,
            templates: options.templates.clone().unwrap_or_else(default_templates),
            charm_dir,
        })
    }

    /// Persistent Che data, mounted at `/data`.
    pub fn data_dir(&self) -> PathBuf {
        self.home.join("data")
    }

    /// Custom assembly output, mounted at `/assembly`.
    pub fn assembly_dir(&self) -> PathBuf {
        self.home.join("assembly")
    }

    /// Maven cache shared with the assembly build container.
    pub fn maven_cache_dir(&self) -> PathBuf {
        self.home.join(".m2")
    }

    /// Packaged templates shipped with the charm.
    pub fn template_source_dir(&self) -> PathBuf {
        self.charm_dir.join("templates")
    }

    /// Where Che reads templates from once it has booted once.
    pub fn live_template_dir(&self) -> PathBuf {
        self.data_dir().join("instance").join("data").join("templates")
    }

    pub fn stack_descriptor_path(&self) -> PathBuf {
        self.charm_dir.join("files").join("stack.json")
    }

    pub fn stack_icon_path(&self) -> PathBuf {
        self.charm_dir.join("files").join("stack-icon.svg")
    }

    /// Build the Che launcher configuration for a host reachable at `public_ip`.
    pub fn to_service_config(&self, public_ip: &str) -> ServiceConfig {
        let mut volumes = vec![
            (
                self.docker_socket.display().to_string(),
                "/var/run/docker.sock".to_string(),
            ),
            (self.data_dir().display().to_string(), "/data".to_string()),
        ];
        let mut env = vec![
            ("CHE_HOST".to_string(), public_ip.to_string()),
            ("CHE_DOCKER_IP_EXTERNAL".to_string(), public_ip.to_string()),
        ];

        if self.variant == Variant::MultiUser {
            volumes.push((self.assembly_dir().display().to_string(), "/assembly".to_string()));
            env.push(("CHE_MULTIUSER".to_string(), "true".to_string()));
        }

        ServiceConfig {
            name: "che".to_string(),
            image: self.image.clone(),
            volumes,
            env,
            endpoint: self.endpoint.clone(),
            poll_interval: self.poll_interval,
            probe_timeout: self.probe_timeout,
        }
    }
}

fn default_templates() -> Vec<String> {
    ["che.env", "stacks.json", "samples.json"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn resolve(pairs: &[(&str, &str)], options: &CharmOptions) -> CharmConfig {
        CharmConfig::resolve_with_options(&vars(pairs), PathBuf::from("/var/lib/charm"), options)
            .unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = resolve(&[], &CharmOptions::default());

        assert_eq!(config.variant, Variant::MultiUser);
        assert_eq!(config.image, "eclipse/che:6.9.0");
        assert_eq!(config.poll_interval, Duration::from_secs(100));
        assert_eq!(config.endpoint.http_url(), "http://localhost:8080");
        assert_eq!(config.assembly_image, None);
        assert_eq!(config.data_dir(), PathBuf::from("/home/ubuntu/data"));
        assert_eq!(
            config.state_file,
            PathBuf::from("/var/lib/charm/.che-charm-state.json")
        );
    }

    #[test]
    fn test_legacy_defaults() {
        let config = resolve(&[("CHE_VARIANT", "legacy")], &CharmOptions::default());

        assert_eq!(config.image, "eclipse/che:5.22.0");
        assert_eq!(config.poll_interval, Duration::from_secs(1));
        assert_eq!(config.templates.len(), 3);
    }

    #[test]
    fn test_env_overrides_options() {
        let options = CharmOptions {
            assembly: "from/options:1".to_string(),
            poll_interval_secs: Some(7),
            ..Default::default()
        };
        let config = resolve(
            &[
                ("CHE_ASSEMBLY_IMAGE", "from/env:2"),
                ("CHE_POLL_INTERVAL_SECS", "3"),
            ],
            &options,
        );

        assert_eq!(config.assembly_image.as_deref(), Some("from/env:2"));
        assert_eq!(config.poll_interval, Duration::from_secs(3));
    }

    #[test]
    fn test_options_used_without_env() {
        let options = CharmOptions {
            assembly: "from/options:1".to_string(),
            che_version: Some("6.10.0".to_string()),
            ..Default::default()
        };
        let config = resolve(&[], &options);

        assert_eq!(config.assembly_image.as_deref(), Some("from/options:1"));
        assert_eq!(config.image, "eclipse/che:6.10.0");
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        let err = CharmConfig::resolve_with_options(
            &vars(&[("CHE_POLL_INTERVAL_SECS", "0")]),
            PathBuf::from("."),
            &CharmOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_invalid_variant_rejected() {
        let err = CharmConfig::resolve_with_options(
            &vars(&[("CHE_VARIANT", "enterprise")]),
            PathBuf::from("."),
            &CharmOptions::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("CHE_VARIANT"));
    }

    #[test]
    fn test_exposed_ports_per_variant() {
        let render = |v: Variant| {
            v.exposed_ports()
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
        };
        assert_eq!(
            render(Variant::MultiUser),
            vec!["8080/tcp", "32768-65535/tcp", "5050/tcp"]
        );
        assert_eq!(render(Variant::Legacy), vec!["8080/tcp", "32768-65535/tcp"]);
    }

    #[test]
    fn test_service_config_multiuser_mounts_assembly() {
        let config = resolve(&[], &CharmOptions::default());
        let service = config.to_service_config("10.0.0.5");

        assert!(service.volumes.iter().any(|(_, c)| c == "/assembly"));
        assert!(
            service
                .env
                .contains(&("CHE_MULTIUSER".to_string(), "true".to_string()))
        );
        assert_eq!(
            service
                .env
                .iter()
                .filter(|(_, v)| v == "10.0.0.5")
                .count(),
            2
        );
    }

    #[test]
    fn test_service_config_legacy_has_no_assembly() {
        let config = resolve(&[("CHE_VARIANT", "legacy")], &CharmOptions::default());
        let service = config.to_service_config("10.0.0.5");

        assert!(!service.volumes.iter().any(|(_, c)| c == "/assembly"));
        assert!(!service.env.iter().any(|(k, _)| k == "CHE_MULTIUSER"));
    }
}
