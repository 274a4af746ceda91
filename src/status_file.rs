//! Status file for external monitoring.
//!
//! Writes a JSON file that deployment tooling can poll to follow a
//! bootstrap in progress: current phase, per-asset fetch results, what is
//! still missing, and the service PID once it exists.
//!
//! Updates are atomic (write to temp file, then rename) so readers never
//! see partial JSON.

use std::fs;
use std::io::Write;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::assets::DownloadOutcome;
use crate::error::Result;
use crate::pipeline::PipelinePhase;

/// Current status file format version.
const STATUS_VERSION: &str = "1";

/// Top-level status file structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusFile {
    /// Schema version for forward compatibility.
    pub version: String,
    /// When the bootstrap started.
    pub started_at: DateTime<Utc>,
    /// Orchestrator process ID.
    pub pid: u32,
    /// Inference service process ID, once started.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_pid: Option<u32>,
    /// Current pipeline phase.
    pub phase: String,
    /// Per-asset fetch results.
    pub assets: Vec<AssetStatus>,
    /// Assets still missing after provisioning.
    pub missing: Vec<String>,
    /// When this file was last updated.
    pub updated_at: DateTime<Utc>,
}

/// One asset's fetch result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetStatus {
    pub name: String,
    pub success: bool,
    pub attempts: u32,
    pub bytes_written: u64,
}

/// Writer for the status file.
///
/// Thread-safe wrapper that manages atomic updates to the status file.
pub struct StatusWriter {
    path: PathBuf,
    status: Mutex<StatusFile>,
}

impl StatusWriter {
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        let now = Utc::now();
        let status = StatusFile {
            version: STATUS_VERSION.to_string(),
            started_at: now,
            pid: std::process::id(),
            service_pid: None,
            phase: PipelinePhase::Init.to_string(),
            assets: Vec::new(),
            missing: Vec::new(),
            updated_at: now,
        };
        Self {
            path,
            status: Mutex::new(status),
        }
    }

    pub fn set_phase(&self, phase: PipelinePhase) {
        {
            let mut status = self.status.lock();
            status.phase = phase.to_string();
        }
        self.flush();
    }

    pub fn record_outcome(&self, outcome: &DownloadOutcome) {
        {
            let mut status = self.status.lock();
            status.assets.push(AssetStatus {
                name: outcome.asset.clone(),
                success: outcome.success,
                attempts: outcome.attempts,
                bytes_written: outcome.bytes_written,
            });
        }
        self.flush();
    }

    pub fn set_missing(&self, missing: Vec<String>) {
        {
            let mut status = self.status.lock();
            status.missing = missing;
        }
        self.flush();
    }

    pub fn set_service_pid(&self, pid: u32) {
        {
            let mut status = self.status.lock();
            status.service_pid = Some(pid);
        }
        self.flush();
    }

    /// Best-effort write; a broken status file never stops a bootstrap.
    fn flush(&self) {
        if let Err(e) = self.write() {
            tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "Failed to write status file"
            );
        }
    }

    /// Write the current status to the file atomically.
    ///
    /// Creates the parent directory if it doesn't exist.
    pub fn write(&self) -> Result<()> {
        let json = {
            let mut status = self.status.lock();
            status.updated_at = Utc::now();
            serde_json::to_string_pretty(&*status)?
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let temp_path = self.path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path)?;

        let cleanup_and_err = |e| {
            let _ = fs::remove_file(&temp_path);
            e
        };

        file.write_all(json.as_bytes()).map_err(cleanup_and_err)?;
        file.sync_all().map_err(cleanup_and_err)?;
        fs::rename(&temp_path, &self.path).map_err(cleanup_and_err)?;

        Ok(())
    }
}
