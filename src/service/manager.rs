//! Che service lifecycle through its launcher image.

use std::sync::Arc;

use crate::error::RuntimeError;
use crate::outcome::StepOutcome;
use crate::runtime::{ContainerHandle, ContainerRuntime};
use crate::service::config::{ServiceConfig, ServiceEndpoint};
use crate::service::probe::ReadinessProbe;

/// What happened while disposing of the startup container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeardownReport {
    /// `stop` may fail when the launcher already exited on its own.
    pub stop: StepOutcome,
}

/// Result of a full start sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartReport {
    /// The startup container that was launched and then removed.
    pub container: ContainerHandle,
    /// Readiness probes it took until the service answered 200.
    pub attempts: u32,
    pub teardown: TeardownReport,
}

/// Starts and stops the Che service.
///
/// The launcher container is not Che itself: it boots the real server
/// containers and then waits until it can reach Che on the public address.
/// That address may only become reachable after the operator exposes the
/// application, so the launcher is run detached, readiness is checked
/// locally, and the launcher is thrown away once Che answers.
pub struct CheService {
    config: ServiceConfig,
    runtime: Arc<dyn ContainerRuntime>,
    probe: ReadinessProbe,
}

impl CheService {
    pub fn new(config: ServiceConfig, runtime: Arc<dyn ContainerRuntime>) -> Self {
        let probe =
            ReadinessProbe::new(&config.endpoint, config.poll_interval, config.probe_timeout);
        Self {
            config,
            runtime,
            probe,
        }
    }

    pub fn endpoint(&self) -> &ServiceEndpoint {
        &self.config.endpoint
    }

    /// Launch, wait until ready, then dispose of the launcher.
    pub async fn start(&self) -> Result<StartReport, RuntimeError> {
        let container = self.launch().await?;
        let attempts = self.wait_until_ready().await;
        tracing::info!("{} started", self.config.name);

        let teardown = self.teardown(&container).await?;

        Ok(StartReport {
            container,
            attempts,
            teardown,
        })
    }

    /// Run the launcher detached and return its handle.
    pub async fn launch(&self) -> Result<ContainerHandle, RuntimeError> {
        tracing::info!("Starting {} from {}", self.config.name, self.config.image);
        let handle = self.runtime.run_detached(&self.config.start_spec()).await?;
        tracing::debug!("Startup container: {}", handle);
        Ok(handle)
    }

    /// Poll the endpoint until it answers 200. Never gives up.
    pub async fn wait_until_ready(&self) -> u32 {
        self.probe.wait_until_ready().await
    }

    /// Stop then remove the startup container.
    ///
    /// A failing `stop` is recovered from; `rm` is always attempted and its
    /// failure is returned.
    pub async fn teardown(&self, handle: &ContainerHandle) -> Result<TeardownReport, RuntimeError> {
        tracing::info!("Stopping startup container...");
        let stop = match self.runtime.stop(handle).await {
            Ok(()) => StepOutcome::Done(()),
            Err(e) => {
                tracing::warn!("Killing startup container failed: {}", e);
                StepOutcome::recovered(e.to_string())
            }
        };

        tracing::info!("Removing startup container...");
        self.runtime.remove(handle).await?;
        tracing::info!("Startup container removed!");

        Ok(TeardownReport { stop })
    }

    /// Stop the running service through a throwaway launcher.
    pub async fn stop(&self) -> Result<(), RuntimeError> {
        tracing::info!("Stopping {}", self.config.name);
        self.runtime.run(&self.config.stop_spec()).await?;
        Ok(())
    }
}
