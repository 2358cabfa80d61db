//! Eclipse Che charm - hook entry point.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use che_charm::cli::{
    Cli, Command, run_dispatch_command, run_hook_command, run_probe_command, run_status_command,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load .env if present
    let _ = dotenvy::dotenv();

    // The framework captures stderr into the unit log; stdout stays for
    // command output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("che_charm=info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let config = cli.config()?;

    match cli.command {
        Command::Hook { ref name } => run_hook_command(config, name).await,
        Command::Dispatch => run_dispatch_command(config).await,
        Command::Status => run_status_command(&config).await,
        Command::Probe => run_probe_command(&config).await,
    }
}
