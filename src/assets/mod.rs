//! Asset specifications and download outcomes.
//!
//! An asset is one artifact the inference service expects on local disk,
//! identified by a hub repository and either a single remote file or a
//! set of shard files plus an index manifest.

pub mod fetcher;
pub mod merger;
pub mod verifier;

pub use fetcher::{AssetFetcher, Transport, TransportKind};
pub use merger::{MergePlan, MergeStats, ShardMerger};
pub use verifier::AssetVerifier;

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Where an asset's bytes come from.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AssetSource {
    /// Shard files plus the index manifest that maps tensors to them.
    Partitioned { parts: Vec<String>, manifest: String },
    /// One remote file, downloaded as-is.
    Single { remote: String },
}

/// One artifact the worker needs on disk before the service starts.
#[derive(Debug, Clone, Deserialize)]
pub struct AssetSpec {
    /// Short name used in logs and reports.
    pub name: String,
    /// Hub repository, e.g. `Lightricks/LTX-2`.
    pub repo: String,
    #[serde(flatten)]
    pub source: AssetSource,
    /// Final path the service reads the asset from.
    pub local_path: PathBuf,
    /// Whether the repository is gated behind a hub token.
    #[serde(default)]
    pub requires_auth: bool,
}

impl AssetSpec {
    /// Remote files this asset consists of. Parts come before the
    /// manifest so shard bytes are on disk by the time the index is.
    #[must_use]
    pub fn remote_files(&self) -> Vec<&str> {
        match &self.source {
            AssetSource::Single { remote } => vec![remote.as_str()],
            AssetSource::Partitioned { parts, manifest } => {
                let mut files: Vec<&str> = parts.iter().map(String::as_str).collect();
                files.push(manifest.as_str());
                files
            }
        }
    }

    /// Directory shard downloads land in; the merged file's parent.
    #[must_use]
    pub fn staging_dir(&self) -> &Path {
        self.local_path.parent().unwrap_or_else(|| Path::new("."))
    }

    /// Local destination for one remote file of this asset.
    #[must_use]
    pub fn dest_for(&self, remote_name: &str) -> PathBuf {
        match &self.source {
            AssetSource::Single { .. } => self.local_path.clone(),
            AssetSource::Partitioned { .. } => self.staging_dir().join(remote_name),
        }
    }

    #[must_use]
    pub fn is_partitioned(&self) -> bool {
        matches!(self.source, AssetSource::Partitioned { .. })
    }

    /// On-disk path of the index manifest (partitioned assets only).
    #[must_use]
    pub fn manifest_path(&self) -> Option<PathBuf> {
        match &self.source {
            AssetSource::Partitioned { manifest, .. } => {
                Some(self.staging_dir().join(manifest))
            }
            AssetSource::Single { .. } => None,
        }
    }
}

/// Result of one asset fetch. Failures are recorded, not raised.
#[derive(Debug, Clone)]
pub struct DownloadOutcome {
    /// Asset name, as configured.
    pub asset: String,
    /// Download attempts across all files, transports, and rounds.
    /// Zero with `success` set means the asset was already on disk.
    pub attempts: u32,
    /// Transport that produced the last successful download.
    pub transport: Option<TransportKind>,
    pub success: bool,
    /// Bytes written across all downloaded files.
    pub bytes_written: u64,
}

impl DownloadOutcome {
    /// Outcome for an asset already present on disk.
    pub(crate) fn cached(asset: &AssetSpec) -> Self {
        Self {
            asset: asset.name.clone(),
            attempts: 0,
            transport: None,
            success: true,
            bytes_written: 0,
        }
    }
}
