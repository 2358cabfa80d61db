//! Error types for the charm.

use std::path::PathBuf;

use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A value is present but cannot be used.
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue {
        /// Env var or option key.
        key: String,
        /// What was wrong with it.
        message: String,
    },

    /// The charm options file could not be read or parsed.
    #[error("Failed to load options file {path}: {reason}")]
    OptionsFile {
        /// Path to the options file.
        path: PathBuf,
        /// Reason for failure.
        reason: String,
    },
}

/// Errors from the container runtime CLI.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The runtime binary could not be spawned at all.
    #[error("Failed to spawn '{program}': {reason}")]
    SpawnFailed {
        /// Program that was invoked.
        program: String,
        /// Reason for failure.
        reason: String,
    },

    /// The runtime command ran but exited unsuccessfully.
    #[error("'{command}' exited with {code}: {stderr}")]
    CommandFailed {
        /// Rendered command line.
        command: String,
        /// Exit code, or -1 when killed by a signal.
        code: i32,
        /// Captured stderr (trimmed), or the tail of stdout when stderr is empty.
        stderr: String,
    },

    /// `run` succeeded but printed no container id.
    #[error("'{command}' returned an empty container id")]
    EmptyContainerId {
        /// Rendered command line.
        command: String,
    },
}

/// Errors from the host framework hook tools.
#[derive(Debug, Error)]
pub enum HostError {
    /// Hook tool invocation failed.
    #[error("Hook tool '{tool}' failed: {reason}")]
    ToolFailed {
        /// Hook tool name (e.g. `status-set`).
        tool: String,
        /// Reason for failure.
        reason: String,
    },

    /// The framework gave back something unusable.
    #[error("Hook tool '{tool}' returned invalid output: {output:?}")]
    InvalidOutput {
        /// Hook tool name.
        tool: String,
        /// Raw output.
        output: String,
    },
}

/// Errors from the persistent flag store.
#[derive(Debug, Error)]
pub enum StateError {
    /// Reading or writing the state file failed.
    #[error("State file {path}: {source}")]
    Io {
        /// Path to the state file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The state file exists but is not valid JSON.
    #[error("State file {path} is corrupt: {reason}")]
    Corrupt {
        /// Path to the state file.
        path: PathBuf,
        /// Parse error.
        reason: String,
    },

    /// Attempted to clear a flag that may only ever be set.
    #[error("Flag '{flag}' is set-once and cannot be cleared")]
    SetOnce {
        /// Flag name.
        flag: String,
    },
}

/// Errors that abort an install run.
#[derive(Debug, Error)]
pub enum InstallError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error(transparent)]
    Host(#[from] HostError),

    #[error(transparent)]
    State(#[from] StateError),

    /// A packaged template or data file could not be read or copied.
    #[error("Template {path}: {source}")]
    Template {
        /// File that failed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The stack descriptor is not valid JSON.
    #[error("Stack descriptor {path} is not valid JSON: {reason}")]
    StackDescriptor {
        /// Descriptor file.
        path: PathBuf,
        /// Parse error.
        reason: String,
    },

    /// The service accepted the stack but the response is unusable.
    #[error("Stack registration response invalid: {reason}")]
    StackResponse {
        /// What was wrong with the response.
        reason: String,
    },
}

/// Result type for install operations.
pub type Result<T> = std::result::Result<T, InstallError>;
