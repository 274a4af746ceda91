//! Inference service process supervision.
//!
//! The service runs as a background child process for the whole worker
//! lifetime. Its stdout/stderr stay attached to ours so its logs
//! interleave with the bootstrap's in the container log stream.

use std::process::Stdio;

use tokio::process::{Child, Command};
use tracing::{debug, info};

use crate::config::ServiceConfig;
use crate::error::ServiceError;

/// Lifecycle states for the supervised service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Starting,
    Ready,
    Failed,
}

/// A running service process and where to probe it.
#[derive(Debug)]
pub struct ServiceHandle {
    child: Child,
    pid: u32,
    health_url: String,
    state: ServiceState,
}

impl ServiceHandle {
    #[must_use]
    pub fn pid(&self) -> u32 {
        self.pid
    }

    #[must_use]
    pub fn health_url(&self) -> &str {
        &self.health_url
    }

    #[must_use]
    pub fn state(&self) -> ServiceState {
        self.state
    }

    pub fn mark_ready(&mut self) {
        self.state = ServiceState::Ready;
    }

    pub fn mark_failed(&mut self) {
        self.state = ServiceState::Failed;
    }

    /// Whether the process is still running. Non-blocking.
    pub fn is_alive(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Exit status if the process already terminated.
    pub fn early_exit(&mut self) -> Option<std::process::ExitStatus> {
        match self.child.try_wait() {
            Ok(Some(status)) => Some(status),
            _ => None,
        }
    }

    /// Kill the service and reap it.
    pub async fn shutdown(mut self) {
        debug!(pid = self.pid, "Stopping service");
        let _ = self.child.kill().await;
    }
}

/// Spawns the background inference service.
pub struct ServiceSupervisor;

impl ServiceSupervisor {
    /// Launch the configured service in the background.
    ///
    /// The child is killed if the handle is dropped without an explicit
    /// shutdown, so an aborted bootstrap never leaves a stray service.
    pub fn start(config: &ServiceConfig) -> std::result::Result<ServiceHandle, ServiceError> {
        let mut cmd = Command::new(&config.command);
        cmd.args(&config.args)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        if let Some(dir) = &config.working_dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|e| ServiceError::SpawnFailed {
            command: config.command.clone(),
            source: e,
        })?;

        let pid = match child.id() {
            Some(pid) => pid,
            None => {
                // id() is None only once the child has been reaped.
                let status = child.try_wait().ok().flatten();
                return Err(match status {
                    Some(status) => ServiceError::ExitedEarly { status },
                    None => ServiceError::SpawnFailed {
                        command: config.command.clone(),
                        source: std::io::Error::other("no PID for spawned process"),
                    },
                });
            }
        };

        info!(pid, command = %config.command, "Service started");

        Ok(ServiceHandle {
            child,
            pid,
            health_url: config.health_url(),
            state: ServiceState::Starting,
        })
    }
}
