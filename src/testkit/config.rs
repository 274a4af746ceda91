//! Canonical test configurations.
//!
//! Single source of truth for config structs used across tests.
//! Avoids each test module defining its own slightly-different defaults.

use std::path::Path;

use crate::assets::{AssetSource, AssetSpec};
use crate::config::{Config, HandoffConfig, HubConfig, ProbeConfig, ServiceConfig};

/// Hub config with zero backoff so retry tests run instantly.
pub fn fast_hub(rounds: u32) -> HubConfig {
    HubConfig {
        retry_rounds: rounds,
        retry_backoff_secs: 0,
        ..HubConfig::default()
    }
}

/// A single-file asset whose final path is `dir`/`remote`.
pub fn single_asset(dir: &Path, name: &str, remote: &str) -> AssetSpec {
    AssetSpec {
        name: name.to_string(),
        repo: "acme/worker-models".to_string(),
        source: AssetSource::Single {
            remote: remote.to_string(),
        },
        local_path: dir.join(remote),
        requires_auth: false,
    }
}

/// A partitioned asset whose parts land next to the merged `target`
/// under `dir`.
pub fn partitioned_asset(
    dir: &Path,
    name: &str,
    parts: &[&str],
    manifest: &str,
    target: &str,
) -> AssetSpec {
    AssetSpec {
        name: name.to_string(),
        repo: "acme/worker-models".to_string(),
        source: AssetSource::Partitioned {
            parts: parts.iter().map(|p| p.to_string()).collect(),
            manifest: manifest.to_string(),
        },
        local_path: dir.join(target),
        requires_auth: false,
    }
}

/// Pipeline config with no assets, a caller-chosen service command, and
/// a probe budget of a couple of seconds.
///
/// Tests that need the readiness probe to succeed point `port` at a
/// responder from [`crate::testkit::http`].
pub fn pipeline_config(root: &Path, service_command: &str, service_args: &[&str], port: u16) -> Config {
    Config {
        assets_root: Some(root.to_path_buf()),
        service: ServiceConfig {
            command: service_command.to_string(),
            args: service_args.iter().map(|a| a.to_string()).collect(),
            host: "127.0.0.1".to_string(),
            port,
            ..ServiceConfig::default()
        },
        probe: ProbeConfig {
            poll_interval_secs: 1,
            max_wait_secs: 2,
        },
        handoff: HandoffConfig {
            command: "true".to_string(),
            ..HandoffConfig::default()
        },
        ..Config::default()
    }
}
