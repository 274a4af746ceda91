//! Handler for the `provision` command.
//!
//! Runs the asset stages of the pipeline without touching the service:
//! useful for baking images and for warming caches ahead of a deploy.

use indicatif::HumanBytes;
use tracing::info;

use crate::cli::{output, ProvisionArgs};
use crate::config::Config;
use crate::error::Result;
use crate::pipeline::Pipeline;

/// Execute the provision command. Returns the process exit code.
///
/// Missing assets are reported but do not fail provisioning, matching
/// what a full run would do.
pub async fn execute(args: &ProvisionArgs) -> Result<i32> {
    let mut config = Config::load(&args.config)?;

    if let Some(ref level) = args.log_level {
        config.logging.level = level.clone();
    }
    if args.json_logs {
        config.logging.format = "json".to_string();
    }
    config.init_logging();

    info!(assets = config.assets.len(), "Provisioning assets");

    let mut pipeline = Pipeline::new(config)?;
    let report = pipeline.provision().await;

    output::section("Provisioning summary");
    for outcome in &report.outcomes {
        if outcome.success && outcome.attempts == 0 {
            output::ok(&format!("{} (cached)", outcome.asset));
        } else if outcome.success {
            output::ok(&format!(
                "{} ({}, {} attempts)",
                outcome.asset,
                HumanBytes(outcome.bytes_written),
                outcome.attempts
            ));
        } else {
            output::warn(&format!(
                "{} failed after {} attempts",
                outcome.asset, outcome.attempts
            ));
        }
    }

    println!();
    if report.missing.is_empty() {
        output::note("All assets present.");
    } else {
        for asset in &report.missing {
            output::warn(&format!(
                "missing: {} ({})",
                asset.name,
                asset.local_path.display()
            ));
        }
    }

    Ok(0)
}
