//! Bootstrap pipeline: provision assets, start the service, hand off.
//!
//! Asset problems degrade: every fetch and merge failure is logged and
//! the pipeline keeps going, leaving the service to fail on whatever is
//! actually required. Service problems are fatal: if the process cannot
//! start or never answers its health endpoint, the bootstrap stops with
//! an error and the handler is never launched.

use std::fmt;
use std::process::Stdio;

use tokio::process::Command;
use tokio::task;
use tracing::{error, info, warn};

use crate::assets::{AssetFetcher, AssetSpec, AssetVerifier, DownloadOutcome, ShardMerger};
use crate::config::Config;
use crate::error::{Error, Result, ServiceError};
use crate::service::{ReadinessProbe, ServiceSupervisor};
use crate::status_file::StatusWriter;

/// Where the pipeline currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelinePhase {
    Init,
    Fetching,
    Merging,
    Verifying,
    StartingService,
    WaitingReady,
    Ready,
    Failed,
}

impl fmt::Display for PipelinePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelinePhase::Init => "init",
            PipelinePhase::Fetching => "fetching",
            PipelinePhase::Merging => "merging",
            PipelinePhase::Verifying => "verifying",
            PipelinePhase::StartingService => "starting-service",
            PipelinePhase::WaitingReady => "waiting-ready",
            PipelinePhase::Ready => "ready",
            PipelinePhase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Mutable pipeline state, reflected into the status file as it changes.
#[derive(Debug)]
pub struct PipelineState {
    pub phase: PipelinePhase,
    /// Assets absent after provisioning.
    pub missing: Vec<AssetSpec>,
}

/// What a completed provisioning pass looked like.
#[derive(Debug)]
pub struct ProvisionReport {
    pub outcomes: Vec<DownloadOutcome>,
    pub missing: Vec<AssetSpec>,
}

/// Drives a worker from empty disk to a ready service with a running
/// handler.
pub struct Pipeline {
    config: Config,
    fetcher: AssetFetcher,
    probe: ReadinessProbe,
    state: PipelineState,
    status: Option<StatusWriter>,
}

impl Pipeline {
    pub fn new(config: Config) -> Result<Self> {
        let fetcher = AssetFetcher::new(&config.hub)?;
        let probe = ReadinessProbe::new()?;
        Ok(Self::assemble(config, fetcher, probe))
    }

    /// Construct with explicit components. The seam scenario tests use
    /// to inject scripted transports and a zero warm-up probe.
    #[cfg(any(test, feature = "testkit"))]
    #[must_use]
    pub fn with_components(config: Config, fetcher: AssetFetcher, probe: ReadinessProbe) -> Self {
        Self::assemble(config, fetcher, probe)
    }

    fn assemble(config: Config, fetcher: AssetFetcher, probe: ReadinessProbe) -> Self {
        let status = config.status_file.clone().map(StatusWriter::new);
        Self {
            config,
            fetcher,
            probe,
            state: PipelineState {
                phase: PipelinePhase::Init,
                missing: Vec::new(),
            },
            status,
        }
    }

    #[must_use]
    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    fn set_phase(&mut self, phase: PipelinePhase) {
        info!(from = %self.state.phase, to = %phase, "Phase transition");
        self.state.phase = phase;
        if let Some(status) = &self.status {
            status.set_phase(phase);
        }
    }

    /// Fetch, merge, and verify all configured assets.
    ///
    /// Failures degrade: the report lists what is missing and the caller
    /// decides whether that matters.
    pub async fn provision(&mut self) -> ProvisionReport {
        self.set_phase(PipelinePhase::Fetching);
        let mut outcomes = Vec::with_capacity(self.config.assets.len());
        for asset in &self.config.assets {
            let outcome = self.fetcher.fetch(asset).await;
            if outcome.success {
                info!(asset = %asset.name, attempts = outcome.attempts, "Asset ready");
            } else {
                warn!(asset = %asset.name, attempts = outcome.attempts, "Asset could not be fetched");
            }
            if let Some(status) = &self.status {
                status.record_outcome(&outcome);
            }
            outcomes.push(outcome);
        }

        if self.config.assets.iter().any(AssetSpec::is_partitioned) {
            self.set_phase(PipelinePhase::Merging);
            for asset in &self.config.assets {
                if !asset.is_partitioned() || asset.local_path.exists() {
                    continue;
                }
                let Some(manifest) = asset.manifest_path() else {
                    continue;
                };
                let parts_dir = asset.staging_dir().to_path_buf();
                let target = asset.local_path.clone();
                let merged = task::spawn_blocking(move || {
                    ShardMerger::merge_from_manifest(&manifest, &parts_dir, &target)
                })
                .await;
                match merged {
                    Ok(Ok(stats)) => {
                        info!(
                            asset = %asset.name,
                            shards = stats.shards,
                            tensors = stats.tensors,
                            bytes = stats.bytes_written,
                            "Merged"
                        );
                    }
                    Ok(Err(e)) => warn!(asset = %asset.name, error = %e, "Merge failed"),
                    Err(e) => warn!(asset = %asset.name, error = %e, "Merge task panicked"),
                }
            }
        }

        self.set_phase(PipelinePhase::Verifying);
        let missing = AssetVerifier::verify(&self.config.assets);
        for asset in &missing {
            warn!(
                asset = %asset.name,
                path = %asset.local_path.display(),
                "Asset missing after provisioning"
            );
        }
        self.state.missing = missing.clone();
        if let Some(status) = &self.status {
            status.set_missing(missing.iter().map(|a| a.name.clone()).collect());
        }

        ProvisionReport { outcomes, missing }
    }

    /// Full bootstrap: provision, start the service, wait for readiness,
    /// then hand off. Returns the handler's exit code.
    pub async fn run(&mut self) -> Result<i32> {
        let started = std::time::Instant::now();
        let report = self.provision().await;
        if !report.missing.is_empty() {
            warn!(
                missing = report.missing.len(),
                "Starting service despite missing assets"
            );
        }

        self.set_phase(PipelinePhase::StartingService);
        let mut handle = match ServiceSupervisor::start(&self.config.service) {
            Ok(handle) => handle,
            Err(e) => {
                self.set_phase(PipelinePhase::Failed);
                return Err(e.into());
            }
        };
        if let Some(status) = &self.status {
            status.set_service_pid(handle.pid());
        }

        if let Some(status) = handle.early_exit() {
            self.set_phase(PipelinePhase::Failed);
            return Err(ServiceError::ExitedEarly { status }.into());
        }

        self.set_phase(PipelinePhase::WaitingReady);
        let wait = self
            .probe
            .wait_ready(
                handle.health_url(),
                self.config.probe.max_wait(),
                self.config.probe.poll_interval(),
            )
            .await;

        if let Err(e) = wait {
            // Crashed and hung look the same from the probe's side;
            // record which one it was before tearing down.
            let alive = handle.is_alive();
            error!(alive, url = handle.health_url(), "Service never became ready");
            handle.mark_failed();
            self.set_phase(PipelinePhase::Failed);
            handle.shutdown().await;
            return Err(e.into());
        }

        handle.mark_ready();
        self.set_phase(PipelinePhase::Ready);
        info!(
            elapsed_secs = started.elapsed().as_secs(),
            "Bootstrap complete, service ready"
        );

        let code = self.handoff().await?;
        handle.shutdown().await;
        Ok(code)
    }

    /// Launch the handler and wait for it to finish.
    async fn handoff(&self) -> Result<i32> {
        let handoff = &self.config.handoff;
        info!(command = %handoff.command, "Handing off to request handler");

        let mut cmd = Command::new(&handoff.command);
        cmd.args(&handoff.args)
            .env("COLDSTART_SERVICE_URL", self.config.service.base_url())
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        for (key, value) in &handoff.env {
            cmd.env(key, value);
        }
        if let Some(dir) = &handoff.working_dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|e| Error::Handoff {
            command: handoff.command.clone(),
            source: e,
        })?;

        let status = child.wait().await.map_err(|e| Error::Handoff {
            command: handoff.command.clone(),
            source: e,
        })?;

        // Killed by signal maps to a plain failure code.
        let code = status.code().unwrap_or(1);
        info!(code, "Handler exited");
        Ok(code)
    }
}
