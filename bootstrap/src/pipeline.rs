// SPDX-License-Identifier: AGPL-3.0-or-later
//! Bootstrap orchestration
//!
//! Runs the stages in their fixed order and stops at the first failure.

use std::fmt;
use std::path::PathBuf;
use std::time::Instant;

use tracing::{debug, error, info};

use crate::certs::{validate_certificate, CertificateRequest};
use crate::collect::{collect_configuration, Collection};
use crate::config::Config;
use crate::context::Context;
use crate::error::Result;
use crate::fetch::fetch_playbook;
use crate::launch::{seal_and_launch, LaunchDecision};
use crate::prepare::preparer_for;
use crate::probe::{is_cloud_instance, Elevation, OsDescriptor};
use crate::prompt::Prompter;
use crate::runner::CommandRunner;
use crate::runtime::{find_interpreter, install_galaxy_requirements, provision_runtime};
use crate::workspace::Workspace;

/// Bootstrap stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    PrepareSystem,
    FetchPlaybook,
    ProvisionRuntime,
    InstallGalaxyRequirements,
    DetectCloud,
    ValidateCertificate,
    CollectConfiguration,
    SealAndLaunch,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::PrepareSystem => "prepare-system",
            Self::FetchPlaybook => "fetch-playbook",
            Self::ProvisionRuntime => "provision-runtime",
            Self::InstallGalaxyRequirements => "install-galaxy-requirements",
            Self::DetectCloud => "detect-cloud",
            Self::ValidateCertificate => "validate-certificate",
            Self::CollectConfiguration => "collect-configuration",
            Self::SealAndLaunch => "seal-and-launch",
        };
        f.write_str(name)
    }
}

/// How a successful run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// `custom.yml` existed and the playbook was run directly
    AlreadyConfigured,
    /// Configuration collected, secrets sealed and the playbook run
    Launched,
    /// Configuration collected and sealed; the operator declined the run
    Declined,
}

/// Result of a complete bootstrap run
#[derive(Debug)]
pub struct BootstrapReport {
    pub outcome: Outcome,
    /// Stages that completed, in order
    pub stages: Vec<Stage>,
    /// Whether the cloud metadata endpoint answered
    pub cloud_instance: bool,
    pub total_duration_ms: u64,
}

/// The full host bootstrap
pub struct Bootstrap<'a> {
    config: &'a Config,
    os: OsDescriptor,
    ctx: Context<'a>,
    prompter: &'a mut dyn Prompter,
    dry_run: bool,
    interpreter: fn() -> Result<PathBuf>,
}

impl<'a> Bootstrap<'a> {
    pub fn new(
        config: &'a Config,
        os: OsDescriptor,
        workspace: Workspace,
        elevation: Elevation,
        runner: &'a dyn CommandRunner,
        prompter: &'a mut dyn Prompter,
    ) -> Self {
        Self {
            config,
            os,
            ctx: Context::new(runner, workspace, elevation),
            prompter,
            dry_run: false,
            interpreter: find_interpreter,
        }
    }

    /// Skip file writes made by the bootstrapper itself
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Replace the PATH lookup used to find the venv interpreter
    pub fn with_interpreter(mut self, interpreter: fn() -> Result<PathBuf>) -> Self {
        self.interpreter = interpreter;
        self
    }

    /// Run every stage in order
    pub async fn run(mut self) -> Result<BootstrapReport> {
        let start_time = Instant::now();
        let mut stages = Vec::new();

        info!(
            platform = %self.os.platform,
            family = %self.os.family(),
            machine = %self.os.machine,
            workspace = %self.ctx.workspace.root().display(),
            "Starting bootstrap"
        );

        let result = self.run_stages(&mut stages).await;
        let total_duration_ms = start_time.elapsed().as_millis() as u64;

        match result {
            Ok((outcome, cloud_instance)) => {
                info!(
                    outcome = ?outcome,
                    duration_ms = total_duration_ms,
                    stages = stages.len(),
                    "Bootstrap completed"
                );
                Ok(BootstrapReport {
                    outcome,
                    stages,
                    cloud_instance,
                    total_duration_ms,
                })
            }
            Err(e) => {
                error!(
                    completed = stages.len(),
                    error = %e,
                    "Bootstrap stopped"
                );
                Err(e)
            }
        }
    }

    async fn run_stages(&mut self, stages: &mut Vec<Stage>) -> Result<(Outcome, bool)> {
        debug!(stage = %Stage::PrepareSystem, "Starting stage");
        preparer_for(&self.os).prepare(&mut self.ctx).await?;
        stages.push(Stage::PrepareSystem);

        debug!(stage = %Stage::FetchPlaybook, "Starting stage");
        fetch_playbook(&self.ctx, &self.config.workspace.repo_url).await?;
        stages.push(Stage::FetchPlaybook);

        debug!(stage = %Stage::ProvisionRuntime, "Starting stage");
        provision_runtime(&mut self.ctx, self.interpreter).await?;
        stages.push(Stage::ProvisionRuntime);

        debug!(stage = %Stage::InstallGalaxyRequirements, "Starting stage");
        install_galaxy_requirements(&self.ctx).await?;
        stages.push(Stage::InstallGalaxyRequirements);

        let cloud_instance = is_cloud_instance(&self.config.network).await;
        info!(cloud_instance, "Cloud metadata probe finished");
        stages.push(Stage::DetectCloud);

        // Runs before the operator has entered a domain, so the placeholder is used
        let request = CertificateRequest {
            root_host: self.config.certificate.placeholder_domain.clone(),
            email: self.config.certificate.contact_email.clone(),
            staging: false,
        };
        validate_certificate(&self.ctx, &request).await?;
        stages.push(Stage::ValidateCertificate);

        debug!(stage = %Stage::CollectConfiguration, "Starting stage");
        let collection = collect_configuration(&self.ctx, &mut *self.prompter, self.dry_run).await?;
        stages.push(Stage::CollectConfiguration);
        if let Collection::AlreadyConfigured = collection {
            return Ok((Outcome::AlreadyConfigured, cloud_instance));
        }

        debug!(stage = %Stage::SealAndLaunch, "Starting stage");
        let decision = seal_and_launch(&self.ctx, &mut *self.prompter).await?;
        stages.push(Stage::SealAndLaunch);

        let outcome = match decision {
            LaunchDecision::Ran => Outcome::Launched,
            LaunchDecision::Declined => Outcome::Declined,
        };
        Ok((outcome, cloud_instance))
    }
}
