//! Charm options file (`charm-options.toml`).
//!
//! Operator-facing options shipped with or set on the charm. Env vars take
//! priority over anything here.

use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigError;

/// File name looked up in the charm directory when no path is given.
pub const DEFAULT_OPTIONS_FILE: &str = "charm-options.toml";

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct CharmOptions {
    /// Image that builds a custom Che assembly. Empty means no build.
    pub assembly: String,
    /// `multiuser` or `legacy`.
    pub variant: Option<String>,
    /// Che release tag to install.
    pub che_version: Option<String>,
    /// Seconds between readiness probes.
    pub poll_interval_secs: Option<u64>,
    /// Template files copied into the live data directory (legacy only).
    pub templates: Option<Vec<String>>,
}

impl CharmOptions {
    /// Load options from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No options file at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(ConfigError::OptionsFile {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                });
            }
        };

        Self::parse(&raw).map_err(|reason| ConfigError::OptionsFile {
            path: path.to_path_buf(),
            reason,
        })
    }

    pub fn parse(raw: &str) -> Result<Self, String> {
        toml::from_str(raw).map_err(|e| e.to_string())
    }

    /// The assembly image, if one is configured.
    pub fn assembly_image(&self) -> Option<&str> {
        let image = self.assembly.trim();
        (!image.is_empty()).then_some(image)
    }
}
