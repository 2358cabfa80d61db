//! `status` command: what the charm knows about itself.

use std::fmt::Write;

use crate::config::CharmConfig;
use crate::runtime::{DockerCli, RuntimeDetection, check_runtime};
use crate::state::{JsonStateStore, StateStore};

/// Print persisted state, runtime detection and configuration.
pub async fn run_status_command(config: &CharmConfig) -> anyhow::Result<()> {
    let state = JsonStateStore::open(&config.state_file)?;
    let detection = check_runtime(&DockerCli::new(config.docker_bin.clone())).await;
    print!("{}", format_status(config, &state, &detection));
    Ok(())
}

/// Render the status report.
pub fn format_status(
    config: &CharmConfig,
    state: &dyn StateStore,
    detection: &RuntimeDetection,
) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "Eclipse Che charm");
    let _ = writeln!(out);
    let _ = writeln!(out, "  Variant:     {}", config.variant);
    let _ = writeln!(out, "  Image:       {}", config.image);
    let _ = writeln!(out, "  Endpoint:    {}", config.endpoint);
    let _ = writeln!(out, "  Home:        {}", config.home.display());
    let _ = writeln!(
        out,
        "  Assembly:    {}",
        config.assembly_image.as_deref().unwrap_or("(none)")
    );
    let _ = writeln!(out, "  Poll every:  {}s", config.poll_interval.as_secs());
    let _ = writeln!(out, "  State file:  {}", config.state_file.display());

    let _ = writeln!(out);
    match detection.server_version {
        Some(ref version) => {
            let _ = writeln!(
                out,
                "  Runtime:     {} ({} {})",
                detection.status.as_str(),
                config.docker_bin,
                version
            );
        }
        None => {
            let _ = writeln!(out, "  Runtime:     {}", detection.status.as_str());
        }
    }
    if let Some(hint) = detection.status.hint() {
        let _ = writeln!(out, "               {}", hint);
    }

    let flags = state.flags();
    let _ = writeln!(
        out,
        "  Flags:       {}",
        if flags.is_empty() {
            "(none)".to_string()
        } else {
            flags.join(", ")
        }
    );

    match state.install_record() {
        Some(record) => {
            let _ = writeln!(
                out,
                "  Installed:   {} ({}) at {}",
                record.image,
                record.variant,
                record.installed_at.to_rfc3339()
            );
        }
        None => {
            let _ = writeln!(out, "  Installed:   no");
        }
    }

    out
}
