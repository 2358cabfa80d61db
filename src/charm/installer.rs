//! The install-then-ready sequence.

use std::sync::Arc;

use chrono::Utc;

use crate::charm::dispatch::Action;
use crate::config::{CHE_UI_PORT, CharmConfig, Variant};
use crate::error::{InstallError, Result};
use crate::host::{AddressKind, HostFramework, PortRange, WorkloadStatus};
use crate::outcome::StepOutcome;
use crate::runtime::{ContainerRuntime, RunMode, RunSpec};
use crate::service::{CheService, StartReport};
use crate::stack::{StackRegistrar, StackReport, copy_templates};
use crate::state::{InstallRecord, StateStore, flags};

/// Name of the relation other charms use to reach the editor.
pub const EDITOR_RELATION: &str = "editor";

/// Everything one install run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    /// Custom assembly build.
    pub build: StepOutcome,
    /// One entry per trampoline start (two for the legacy flow).
    pub starts: Vec<StartReport>,
    /// Number of templates copied (legacy only).
    pub templates: StepOutcome<usize>,
    /// Stack registration (legacy only).
    pub stack: Option<StackReport>,
    pub ports: Vec<PortRange>,
}

/// Drives the install sequence against a runtime and a host framework.
pub struct Installer {
    config: CharmConfig,
    runtime: Arc<dyn ContainerRuntime>,
    host: Arc<dyn HostFramework>,
}

impl Installer {
    pub fn new(
        config: CharmConfig,
        runtime: Arc<dyn ContainerRuntime>,
        host: Arc<dyn HostFramework>,
    ) -> Self {
        Self {
            config,
            runtime,
            host,
        }
    }

    pub fn config(&self) -> &CharmConfig {
        &self.config
    }

    /// Install Che unless `che.available` is already set.
    ///
    /// Returns `None` when there was nothing to do. On success the flag is
    /// set as the very last step, so a failed run is retried by the next
    /// hook.
    pub async fn install(&self, state: &mut dyn StateStore) -> Result<Option<InstallReport>> {
        if state.is_set(flags::CHE_AVAILABLE) {
            tracing::info!("Che already installed, skipping");
            return Ok(None);
        }

        self.host
            .status_set(WorkloadStatus::Maintenance, "Installing Eclipse Che")
            .await?;

        let build = self.build_assembly().await?;

        let public_ip = self.host.unit_address(AddressKind::Public).await?;
        let service = CheService::new(
            self.config.to_service_config(&public_ip),
            self.runtime.clone(),
        );

        let mut starts = vec![service.start().await?];

        let (templates, stack) = match self.config.variant {
            Variant::MultiUser => (StepOutcome::skipped("multi-user install"), None),
            Variant::Legacy => {
                // Che writes its config layout on first boot; only now can
                // the templates be put in place.
                service.stop().await?;
                let copied = copy_templates(
                    &self.config.template_source_dir(),
                    &self.config.templates,
                    &self.config.live_template_dir(),
                )
                .await?;
                starts.push(service.start().await?);

                let registrar =
                    StackRegistrar::new(service.endpoint().clone(), self.config.probe_timeout);
                let stack = registrar
                    .register_with_icon(
                        &self.config.stack_descriptor_path(),
                        &self.config.stack_icon_path(),
                    )
                    .await?;
                (StepOutcome::Done(copied), Some(stack))
            }
        };

        let ports = self.open_ports().await?;

        self.host
            .status_set(WorkloadStatus::Active, "Ready (eclipse/che)")
            .await?;

        state.record_install(InstallRecord {
            image: self.config.image.clone(),
            variant: self.config.variant.to_string(),
            installed_at: Utc::now(),
        })?;
        state.set(flags::CHE_AVAILABLE)?;
        tracing::info!("Che available");

        Ok(Some(InstallReport {
            build,
            starts,
            templates,
            stack,
            ports,
        }))
    }

    /// Run the configured assembly image, if any, to completion.
    ///
    /// A failing build aborts the install; it is never retried here.
    pub async fn build_assembly(&self) -> Result<StepOutcome> {
        let Some(ref image) = self.config.assembly_image else {
            return Ok(StepOutcome::skipped("no assembly image configured"));
        };

        tracing::info!("Building custom assembly with {}", image);
        let spec = RunSpec::new(image.clone())
            .mode(RunMode::Foreground)
            .volume(
                self.config.maven_cache_dir().display().to_string(),
                "/root/.m2",
            )
            .volume(
                self.config.assembly_dir().display().to_string(),
                "/assembly",
            );
        self.runtime.run(&spec).await?;
        tracing::info!("Assembly built into {}", self.config.assembly_dir().display());

        Ok(StepOutcome::Done(()))
    }

    /// Declare every port a user connects to as open.
    pub async fn open_ports(&self) -> Result<Vec<PortRange>> {
        let ports = self.config.variant.exposed_ports();
        for port in &ports {
            self.host.open_port(port).await?;
            tracing::debug!("Opened {}", port);
        }
        Ok(ports)
    }

    /// Tell related editor consumers where the dashboard lives.
    pub async fn configure_editor_relation(&self) -> Result<()> {
        let hostname = self.host.unit_address(AddressKind::Private).await?;
        self.host
            .relation_set(
                EDITOR_RELATION,
                &[
                    ("hostname".to_string(), hostname),
                    ("port".to_string(), CHE_UI_PORT.to_string()),
                ],
            )
            .await?;
        tracing::info!("Configured {} relation on port {}", EDITOR_RELATION, CHE_UI_PORT);
        Ok(())
    }

    /// Show a failed action on the unit. Host errors here are only logged,
    /// so the original failure is what the hook returns.
    pub async fn report_blocked(&self, action: Action, err: &InstallError) {
        let message = format!("{} failed: {}", action.as_str(), err);
        if let Err(e) = self.host.status_set(WorkloadStatus::Blocked, &message).await {
            tracing::warn!("Could not report blocked status: {}", e);
        }
    }

    /// Report that the charm is blocked on the container runtime.
    pub async fn await_runtime(&self) -> Result<()> {
        self.host
            .status_set(WorkloadStatus::Waiting, "Waiting for Docker")
            .await?;
        Ok(())
    }
}
