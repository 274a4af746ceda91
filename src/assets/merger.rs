//! Merging partitioned safetensors artifacts.
//!
//! Sharded checkpoints arrive as `model-0000X-of-0000N.safetensors` files
//! plus an index manifest whose `weight_map` assigns each tensor name to
//! a shard. The merger loads every referenced shard, rejects duplicate
//! tensor names, and writes one combined file atomically. Shards and the
//! manifest are deleted only after the merged file is in place; a failed
//! merge deletes nothing.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use safetensors::tensor::{serialize_to_file, Dtype, TensorView};
use safetensors::SafeTensors;
use serde::Deserialize;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::error::MergeError;

/// Index manifest layout used by sharded checkpoints.
#[derive(Debug, Deserialize)]
struct ShardIndex {
    weight_map: BTreeMap<String, String>,
}

/// What a merge did.
#[derive(Debug, Clone, Copy)]
pub struct MergeStats {
    pub shards: usize,
    pub tensors: usize,
    pub bytes_written: u64,
}

/// Work derived from one index manifest.
#[derive(Debug)]
pub struct MergePlan {
    pub manifest_path: PathBuf,
    pub shard_paths: Vec<PathBuf>,
    pub target_path: PathBuf,
}

/// Tensor data lifted out of a shard so the shard buffer can be dropped.
struct OwnedTensor {
    name: String,
    dtype: Dtype,
    shape: Vec<usize>,
    data: Vec<u8>,
}

/// Combines shard files into the single artifact the service loads.
pub struct ShardMerger;

impl ShardMerger {
    /// Read the manifest and resolve which shard files feed the target.
    pub fn plan(
        manifest_path: &Path,
        parts_dir: &Path,
        target_path: &Path,
    ) -> std::result::Result<MergePlan, MergeError> {
        let index = read_index(manifest_path)?;

        // weight_map lists one entry per tensor; several map to the same shard.
        let shard_names: BTreeSet<&String> = index.weight_map.values().collect();
        let shard_paths: Vec<PathBuf> = shard_names
            .iter()
            .map(|name| parts_dir.join(name.as_str()))
            .collect();

        for path in &shard_paths {
            if !path.exists() {
                return Err(MergeError::MissingShard { path: path.clone() });
            }
        }

        Ok(MergePlan {
            manifest_path: manifest_path.to_path_buf(),
            shard_paths,
            target_path: target_path.to_path_buf(),
        })
    }

    /// Merge the planned shards into the target, then delete the parts.
    ///
    /// The combined file is written to a temp file in the target's
    /// directory and renamed into place, so a crash mid-merge leaves the
    /// parts intact and the target absent.
    pub fn merge(plan: &MergePlan) -> std::result::Result<MergeStats, MergeError> {
        let mut tensors: Vec<OwnedTensor> = Vec::new();
        let mut seen: HashMap<String, PathBuf> = HashMap::new();

        for shard_path in &plan.shard_paths {
            let count = load_shard(shard_path, &mut tensors, &mut seen)?;
            debug!(shard = %shard_path.display(), tensors = count, "Loaded shard");
        }

        let mut views = BTreeMap::new();
        for tensor in &tensors {
            let view = TensorView::new(tensor.dtype, tensor.shape.clone(), tensor.data.as_slice())
                .map_err(|e| MergeError::Serialize(format!("tensor {}: {e}", tensor.name)))?;
            views.insert(tensor.name.clone(), view);
        }

        let dir = plan.target_path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir).map_err(MergeError::WriteFailed)?;
        let tmp = NamedTempFile::new_in(dir).map_err(MergeError::WriteFailed)?;
        serialize_to_file(views, &None, tmp.path())
            .map_err(|e| MergeError::Serialize(e.to_string()))?;
        tmp.persist(&plan.target_path)
            .map_err(|e| MergeError::WriteFailed(e.error))?;

        let bytes_written = fs::metadata(&plan.target_path).map(|m| m.len()).unwrap_or(0);

        // Parts go away only once the merged file is in place.
        for shard_path in &plan.shard_paths {
            let _ = fs::remove_file(shard_path);
        }
        let _ = fs::remove_file(&plan.manifest_path);

        info!(
            target = %plan.target_path.display(),
            shards = plan.shard_paths.len(),
            tensors = tensors.len(),
            bytes = bytes_written,
            "Merged shards"
        );

        Ok(MergeStats {
            shards: plan.shard_paths.len(),
            tensors: tensors.len(),
            bytes_written,
        })
    }

    /// Plan and merge in one call.
    pub fn merge_from_manifest(
        manifest_path: &Path,
        parts_dir: &Path,
        target_path: &Path,
    ) -> std::result::Result<MergeStats, MergeError> {
        let plan = Self::plan(manifest_path, parts_dir, target_path)?;
        Self::merge(&plan)
    }
}

fn read_index(path: &Path) -> std::result::Result<ShardIndex, MergeError> {
    let content = fs::read_to_string(path).map_err(|e| MergeError::ManifestUnreadable {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    serde_json::from_str(&content).map_err(|e| MergeError::ManifestUnreadable {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

fn load_shard(
    path: &Path,
    tensors: &mut Vec<OwnedTensor>,
    seen: &mut HashMap<String, PathBuf>,
) -> std::result::Result<usize, MergeError> {
    let bytes = fs::read(path).map_err(|e| MergeError::ShardUnreadable {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let shard = SafeTensors::deserialize(&bytes).map_err(|e| MergeError::ShardUnreadable {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let mut count = 0;
    for name in shard.names() {
        if let Some(first) = seen.get(name.as_str()) {
            return Err(MergeError::TensorConflict {
                name: name.to_string(),
                first: first.display().to_string(),
                second: path.display().to_string(),
            });
        }
        let tensor = shard.tensor(name).map_err(|e| MergeError::ShardUnreadable {
            path: path.to_path_buf(),
            reason: format!("tensor {name}: {e}"),
        })?;
        seen.insert(name.to_string(), path.to_path_buf());
        tensors.push(OwnedTensor {
            name: name.to_string(),
            dtype: tensor.dtype(),
            shape: tensor.shape().to_vec(),
            data: tensor.data().to_vec(),
        });
        count += 1;
    }

    Ok(count)
}
