//! CLI command handling.
//!
//! Provides subcommands for:
//! - Running as a framework hook (`hook install`, `hook editor-relation-joined`, ...)
//! - Evaluating flags outside a hook context (`dispatch`)
//! - Inspecting persisted state, the runtime and configuration (`status`)
//! - A single readiness probe against Che (`probe`)

mod run;
mod status;

pub use run::{run_dispatch_command, run_hook_command, run_probe_command};
pub use status::{format_status, run_status_command};

use std::path::PathBuf;

use clap::{ColorChoice, Parser, Subcommand};

use crate::config::{CharmConfig, Layered, ProcessEnv, Variant};
use crate::error::ConfigError;

#[derive(Parser, Debug)]
#[command(name = "che-charm")]
#[command(about = "Installs Eclipse Che in a container and exposes it to the orchestrator")]
#[command(
    long_about = "Deployment hook for Eclipse Che. \
        Use 'che-charm <subcommand> --help' for details.\n\
        Examples:\n  \
        che-charm hook install  # Run the install hook\n  \
        che-charm status  # Show flags, runtime and configuration"
)]
#[command(version)]
#[command(color = ColorChoice::Auto)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// State file path (defaults to $CHARM_DIR/.che-charm-state.json)
    #[arg(long, global = true)]
    pub state_file: Option<PathBuf>,

    /// Options file path (defaults to $CHARM_DIR/charm-options.toml)
    #[arg(long, global = true)]
    pub options_file: Option<PathBuf>,

    /// Install flow: "multiuser" or "legacy"
    #[arg(long, global = true)]
    pub variant: Option<Variant>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run as a framework hook
    Hook {
        /// Hook name (e.g. "install", "update-status", "editor-relation-joined")
        name: String,
    },

    /// Evaluate flags and run whatever actions they call for
    Dispatch,

    /// Show persisted flags, install record, runtime and configuration
    Status,

    /// Probe Che once; exits non-zero unless it answers 200
    Probe,
}

impl Cli {
    /// Resolve configuration, with command-line flags taking priority over
    /// env vars and the options file.
    pub fn config(&self) -> Result<CharmConfig, ConfigError> {
        let source = Layered::new(ProcessEnv)
            .set("CHE_VARIANT", self.variant.map(|v| v.to_string()))
            .set(
                "CHE_STATE_FILE",
                self.state_file.as_ref().map(|p| p.display().to_string()),
            );
        CharmConfig::resolve(&source, self.options_file.as_deref())
    }
}
