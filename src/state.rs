//! Persistent flag store.
//!
//! Flags survive between hook invocations. `che.available` is set-once:
//! after a successful install it can never be cleared, which is what keeps
//! the install sequence from running twice.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StateError;

/// Well-known flag names.
pub mod flags {
    /// The container runtime is installed and its daemon answers.
    pub const DOCKER_AVAILABLE: &str = "docker.available";
    /// Che has been installed and is answering. Set-once.
    pub const CHE_AVAILABLE: &str = "che.available";
    /// An `editor` relation is established.
    pub const EDITOR_AVAILABLE: &str = "editor.available";

    pub(crate) const SET_ONCE: &[&str] = &[CHE_AVAILABLE];
}

/// Details of the completed install, kept for `status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallRecord {
    pub image: String,
    pub variant: String,
    pub installed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedState {
    #[serde(default)]
    pub flags: BTreeSet<String>,
    #[serde(default)]
    pub install: Option<InstallRecord>,
}

impl PersistedState {
    fn clear(&mut self, flag: &str) -> Result<bool, StateError> {
        if flags::SET_ONCE.contains(&flag) && self.flags.contains(flag) {
            return Err(StateError::SetOnce {
                flag: flag.to_string(),
            });
        }
        Ok(self.flags.remove(flag))
    }
}

/// Flag storage owned by the host integration.
pub trait StateStore: Send {
    fn is_set(&self, flag: &str) -> bool;

    fn set(&mut self, flag: &str) -> Result<(), StateError>;

    /// Clear a flag. Set-once flags refuse once set.
    fn clear(&mut self, flag: &str) -> Result<(), StateError>;

    fn record_install(&mut self, record: InstallRecord) -> Result<(), StateError>;

    fn install_record(&self) -> Option<&InstallRecord>;

    /// All flags currently set, in name order.
    fn flags(&self) -> Vec<String>;
}

/// State persisted as JSON next to the charm.
#[derive(Debug)]
pub struct JsonStateStore {
    path: PathBuf,
    state: PersistedState,
}

impl JsonStateStore {
    /// Open `path`, starting empty if it does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StateError> {
        let path = path.into();
        let state = match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).map_err(|e| StateError::Corrupt {
                path: path.clone(),
                reason: e.to_string(),
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => PersistedState::default(),
            Err(source) => return Err(StateError::Io { path, source }),
        };
        Ok(Self { path, state })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write to a sibling temp file, then rename over the real one.
    fn save(&self) -> Result<(), StateError> {
        let io_err = |source: std::io::Error| StateError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }

        let json = serde_json::to_vec_pretty(&self.state).map_err(|e| StateError::Corrupt {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(io_err)?;
        std::fs::rename(&tmp, &self.path).map_err(io_err)?;
        Ok(())
    }
}

impl StateStore for JsonStateStore {
    fn is_set(&self, flag: &str) -> bool {
        self.state.flags.contains(flag)
    }

    fn set(&mut self, flag: &str) -> Result<(), StateError> {
        if self.state.flags.insert(flag.to_string()) {
            self.save()?;
        }
        Ok(())
    }

    fn clear(&mut self, flag: &str) -> Result<(), StateError> {
        if self.state.clear(flag)? {
            self.save()?;
        }
        Ok(())
    }

    fn record_install(&mut self, record: InstallRecord) -> Result<(), StateError> {
        self.state.install = Some(record);
        self.save()
    }

    fn install_record(&self) -> Option<&InstallRecord> {
        self.state.install.as_ref()
    }

    fn flags(&self) -> Vec<String> {
        self.state.flags.iter().cloned().collect()
    }
}

/// In-memory store for tests and dry runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryStateStore {
    state: PersistedState,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_flags(flags: &[&str]) -> Self {
        Self {
            state: PersistedState {
                flags: flags.iter().map(|f| f.to_string()).collect(),
                install: None,
            },
        }
    }
}

impl StateStore for MemoryStateStore {
    fn is_set(&self, flag: &str) -> bool {
        self.state.flags.contains(flag)
    }

    fn set(&mut self, flag: &str) -> Result<(), StateError> {
        self.state.flags.insert(flag.to_string());
        Ok(())
    }

    fn clear(&mut self, flag: &str) -> Result<(), StateError> {
        self.state.clear(flag).map(|_| ())
    }

    fn record_install(&mut self, record: InstallRecord) -> Result<(), StateError> {
        self.state.install = Some(record);
        Ok(())
    }

    fn install_record(&self) -> Option<&InstallRecord> {
        self.state.install.as_ref()
    }

    fn flags(&self) -> Vec<String> {
        self.state.flags.iter().cloned().collect()
    }
}
