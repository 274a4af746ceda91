//! Shard merging end-to-end: tensor union, cleanup, and failure modes.

mod support;

use std::fs;

use anyhow::Result;
use coldstart::assets::ShardMerger;
use coldstart::error::MergeError;
use safetensors::tensor::Dtype;
use safetensors::SafeTensors;
use support::shards::{write_manifest, write_shard};
use tempfile::tempdir;

#[test]
fn merges_five_shards_into_one_artifact() -> Result<()> {
    let dir = tempdir()?;
    let parts_dir = dir.path();

    let mut entries: Vec<(String, String)> = Vec::new();
    for i in 1..=5u32 {
        let shard_name = format!("model-0000{i}-of-00005.safetensors");
        let tensor_name = format!("layer.{i}.weight");
        write_shard(
            &parts_dir.join(&shard_name),
            &[(&tensor_name, [i as f32, 0.5])],
        )?;
        entries.push((tensor_name, shard_name));
    }

    let manifest = parts_dir.join("model.safetensors.index.json");
    let entry_refs: Vec<(&str, &str)> = entries
        .iter()
        .map(|(t, s)| (t.as_str(), s.as_str()))
        .collect();
    write_manifest(&manifest, &entry_refs)?;

    let target = parts_dir.join("model.safetensors");
    let stats = ShardMerger::merge_from_manifest(&manifest, parts_dir, &target)?;

    assert_eq!(stats.shards, 5);
    assert_eq!(stats.tensors, 5);
    assert!(stats.bytes_written > 0);

    let bytes = fs::read(&target)?;
    let merged = SafeTensors::deserialize(&bytes)?;
    assert_eq!(merged.names().len(), 5);
    for i in 1..=5 {
        let name = format!("layer.{i}.weight");
        let tensor = merged.tensor(&name)?;
        assert_eq!(tensor.dtype(), Dtype::F32);
        assert_eq!(tensor.shape(), &[2]);
    }

    // Parts and manifest are gone once the merge landed, and nothing
    // else (no temp files) is left next to the target.
    assert!(!manifest.exists());
    for i in 1..=5 {
        assert!(!parts_dir
            .join(format!("model-0000{i}-of-00005.safetensors"))
            .exists());
    }
    let leftover: Vec<_> = fs::read_dir(parts_dir)?.collect();
    assert_eq!(leftover.len(), 1, "only the merged file should remain");

    Ok(())
}

#[test]
fn shards_shared_by_many_tensors_are_read_once() -> Result<()> {
    let dir = tempdir()?;
    let parts_dir = dir.path();

    write_shard(
        &parts_dir.join("shard.safetensors"),
        &[("a.weight", [1.0, 2.0]), ("b.weight", [3.0, 4.0])],
    )?;
    let manifest = parts_dir.join("model.safetensors.index.json");
    write_manifest(
        &manifest,
        &[("a.weight", "shard.safetensors"), ("b.weight", "shard.safetensors")],
    )?;

    let target = parts_dir.join("model.safetensors");
    let stats = ShardMerger::merge_from_manifest(&manifest, parts_dir, &target)?;

    assert_eq!(stats.shards, 1);
    assert_eq!(stats.tensors, 2);
    Ok(())
}

#[test]
fn duplicate_tensor_names_across_shards_abort_the_merge() -> Result<()> {
    let dir = tempdir()?;
    let parts_dir = dir.path();

    write_shard(
        &parts_dir.join("shard-a.safetensors"),
        &[("alpha", [1.0, 1.0]), ("shared", [2.0, 2.0])],
    )?;
    write_shard(
        &parts_dir.join("shard-b.safetensors"),
        &[("beta", [3.0, 3.0]), ("shared", [4.0, 4.0])],
    )?;
    let manifest = parts_dir.join("model.safetensors.index.json");
    write_manifest(
        &manifest,
        &[
            ("alpha", "shard-a.safetensors"),
            ("shared", "shard-a.safetensors"),
            ("beta", "shard-b.safetensors"),
        ],
    )?;

    let target = parts_dir.join("model.safetensors");
    let err = ShardMerger::merge_from_manifest(&manifest, parts_dir, &target).unwrap_err();

    assert!(matches!(err, MergeError::TensorConflict { .. }));

    // A failed merge deletes nothing and writes nothing.
    assert!(!target.exists());
    assert!(manifest.exists());
    assert!(parts_dir.join("shard-a.safetensors").exists());
    assert!(parts_dir.join("shard-b.safetensors").exists());
    Ok(())
}

#[test]
fn missing_shard_aborts_before_anything_is_touched() -> Result<()> {
    let dir = tempdir()?;
    let parts_dir = dir.path();

    write_shard(&parts_dir.join("present.safetensors"), &[("a", [1.0, 1.0])])?;
    let manifest = parts_dir.join("model.safetensors.index.json");
    write_manifest(
        &manifest,
        &[
            ("a", "present.safetensors"),
            ("b", "absent.safetensors"),
        ],
    )?;

    let target = parts_dir.join("model.safetensors");
    let err = ShardMerger::merge_from_manifest(&manifest, parts_dir, &target).unwrap_err();

    assert!(matches!(err, MergeError::MissingShard { .. }));
    assert!(!target.exists());
    assert!(manifest.exists());
    assert!(parts_dir.join("present.safetensors").exists());
    Ok(())
}

#[test]
fn corrupt_shard_bytes_fail_the_merge_cleanly() -> Result<()> {
    let dir = tempdir()?;
    let parts_dir = dir.path();

    fs::write(parts_dir.join("bad.safetensors"), b"not a safetensors file")?;
    let manifest = parts_dir.join("model.safetensors.index.json");
    write_manifest(&manifest, &[("a", "bad.safetensors")])?;

    let target = parts_dir.join("model.safetensors");
    let err = ShardMerger::merge_from_manifest(&manifest, parts_dir, &target).unwrap_err();

    assert!(matches!(err, MergeError::ShardUnreadable { .. }));
    assert!(!target.exists());
    assert!(parts_dir.join("bad.safetensors").exists());
    Ok(())
}
