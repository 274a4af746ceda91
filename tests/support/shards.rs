//! Builders for real safetensors shards and their index manifests.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::Result;
use safetensors::tensor::{serialize_to_file, Dtype, TensorView};

/// Write a safetensors shard holding 2-element F32 tensors.
pub fn write_shard(path: &Path, tensors: &[(&str, [f32; 2])]) -> Result<()> {
    let mut data: Vec<(String, Vec<u8>)> = Vec::new();
    for (name, values) in tensors {
        let mut bytes = Vec::with_capacity(8);
        for v in values {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        data.push((name.to_string(), bytes));
    }

    let mut views = BTreeMap::new();
    for (name, bytes) in &data {
        views.insert(
            name.clone(),
            TensorView::new(Dtype::F32, vec![2], bytes.as_slice())?,
        );
    }
    serialize_to_file(views, &None, path)?;
    Ok(())
}

/// Write an index manifest mapping tensor names to shard files.
pub fn write_manifest(path: &Path, entries: &[(&str, &str)]) -> Result<()> {
    let weight_map: BTreeMap<&str, &str> = entries.iter().copied().collect();
    let manifest = serde_json::json!({
        "metadata": { "total_size": 0 },
        "weight_map": weight_map,
    });
    fs::write(path, serde_json::to_string_pretty(&manifest)?)?;
    Ok(())
}
