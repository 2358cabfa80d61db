//! Hook, dispatch and probe commands.

use std::sync::Arc;

use crate::charm::{DispatchReport, FlagSet, Installer, dispatch, flags_for_hook};
use crate::config::CharmConfig;
use crate::host::HookTools;
use crate::runtime::{DockerCli, check_runtime};
use crate::service::{ProbeOutcome, ReadinessProbe};
use crate::state::{JsonStateStore, flags};

/// Run as the framework hook `hook`.
pub async fn run_hook_command(config: CharmConfig, hook: &str) -> anyhow::Result<()> {
    tracing::info!("Running hook {}", hook);
    let transient = FlagSet::new().extend(flags_for_hook(hook));
    run_with_flags(config, transient).await
}

/// Evaluate flags without a hook context.
pub async fn run_dispatch_command(config: CharmConfig) -> anyhow::Result<()> {
    run_with_flags(config, FlagSet::new()).await
}

async fn run_with_flags(config: CharmConfig, mut transient: FlagSet) -> anyhow::Result<()> {
    let docker = DockerCli::new(config.docker_bin.clone());
    let detection = check_runtime(&docker).await;
    if detection.status.is_ok() {
        transient = transient.with(flags::DOCKER_AVAILABLE);
    } else {
        tracing::info!("Container runtime {}", detection.status.as_str());
        if let Some(hint) = detection.status.hint() {
            tracing::debug!("{}", hint);
        }
    }

    let mut state = JsonStateStore::open(&config.state_file)?;
    let host = HookTools::new().with_public_address(config.public_ip.clone());
    let installer = Installer::new(config, Arc::new(docker), Arc::new(host));

    let report = dispatch(&installer, &mut state, &transient).await?;
    print_report(&report);
    Ok(())
}

fn print_report(report: &DispatchReport) {
    if report.executed.is_empty() {
        println!("Nothing to do.");
        return;
    }

    let names: Vec<&str> = report.executed.iter().map(|a| a.as_str()).collect();
    println!("Actions: {}", names.join(", "));

    if let Some(ref install) = report.install {
        for (i, start) in install.starts.iter().enumerate() {
            println!(
                "  start #{}: container {} ready after {} probe(s), stop {}",
                i + 1,
                start.container,
                start.attempts,
                start.teardown.stop.as_str()
            );
        }
        println!("  assembly build: {}", install.build.as_str());
        if let Some(ref stack) = install.stack {
            println!(
                "  stack: {}, icon: {}",
                stack.stack.as_str(),
                stack.icon.as_str()
            );
        }
        let ports: Vec<String> = install.ports.iter().map(|p| p.to_string()).collect();
        println!("  opened ports: {}", ports.join(", "));
    }
}

/// Probe the endpoint once. Errors unless Che answered 200.
pub async fn run_probe_command(config: &CharmConfig) -> anyhow::Result<()> {
    let probe = ReadinessProbe::new(&config.endpoint, config.poll_interval, config.probe_timeout);
    match probe.probe().await {
        ProbeOutcome::Ready => {
            println!("{} is ready", probe.url());
            Ok(())
        }
        ProbeOutcome::NotReady { status } => {
            anyhow::bail!("{} answered {}", probe.url(), status)
        }
        ProbeOutcome::Unreachable { reason } => {
            anyhow::bail!("{} is unreachable: {}", probe.url(), reason)
        }
    }
}
