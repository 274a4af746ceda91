//! Configuration and asset diagnostics.

use std::path::Path;

use crate::assets::AssetVerifier;
use crate::cli::diagnostic::ConfigDiagnostic;
use crate::cli::{output, CheckCommand};
use crate::config::Config;
use crate::error::{ConfigError, Error, Result};

/// Execute a check subcommand. Returns the process exit code.
pub fn execute(cmd: &CheckCommand) -> Result<i32> {
    match cmd {
        CheckCommand::Config(args) => check_config(&args.config),
        CheckCommand::Assets(args) => check_assets(&args.config),
    }
}

/// Validate the configuration file without running anything.
fn check_config(path: &Path) -> Result<i32> {
    println!("Checking configuration: {}", path.display());
    println!();

    if !path.exists() {
        output::error(&format!("Configuration file not found: {}", path.display()));
        return Ok(1);
    }

    let config = match Config::load(path) {
        Ok(config) => config,
        Err(Error::Config(ConfigError::Parse(parse))) => {
            // Point at the offending TOML when we know where it is.
            if let Ok(src) = std::fs::read_to_string(path) {
                let span = parse.span().unwrap_or(0..0);
                let diagnostic =
                    ConfigDiagnostic::new(parse.message().to_string(), src, span.start, span.len())
                        .with_help("see config.toml in the repository for a working example");
                eprintln!("{:?}", miette::Report::new(diagnostic));
            } else {
                output::error(&format!("Configuration error: {parse}"));
            }
            return Ok(1);
        }
        Err(e) => {
            output::error(&format!("Configuration error: {e}"));
            return Ok(1);
        }
    };

    output::ok("Configuration file is valid");
    println!();
    println!("Summary:");
    output::key_value("Hub:", &config.hub.base_url);
    output::key_value(
        "Retries:",
        format!(
            "{} rounds, {}s backoff",
            config.hub.retry_rounds, config.hub.retry_backoff_secs
        ),
    );
    output::key_value("Assets:", config.assets.len());
    output::key_value(
        "Service:",
        format!("{} {}", config.service.command, config.service.args.join(" ")),
    );
    output::key_value("Health endpoint:", config.service.health_url());
    output::key_value(
        "Probe:",
        format!(
            "every {}s, up to {}s",
            config.probe.poll_interval_secs, config.probe.max_wait_secs
        ),
    );
    output::key_value("Handler:", &config.handoff.command);
    println!();

    if config.hub.token.is_some() {
        output::ok("Hub token found (from HF_TOKEN env var)");
    } else if config.assets.iter().any(|a| a.requires_auth) {
        output::warn("Some assets require authentication but HF_TOKEN is not set");
        output::note("  Set HF_TOKEN in the environment or a .env file");
    } else {
        output::note("Hub token: not set (no configured asset requires one)");
    }

    println!();
    println!("Configuration is ready to use.");
    Ok(0)
}

/// Report which configured assets are on disk. Exits nonzero when any
/// are missing, so images can be gated on a warm cache.
fn check_assets(path: &Path) -> Result<i32> {
    let config = Config::load(path)?;

    output::section("Asset check");
    let missing = AssetVerifier::verify(&config.assets);
    for asset in &config.assets {
        let absent = missing.iter().any(|m| m.name == asset.name);
        if absent {
            output::warn(&format!(
                "{} -> {} (missing)",
                asset.name,
                asset.local_path.display()
            ));
        } else {
            output::ok(&format!("{} -> {}", asset.name, asset.local_path.display()));
        }
    }

    println!();
    if missing.is_empty() {
        println!("All assets present.");
        Ok(0)
    } else {
        println!("{} of {} assets missing.", missing.len(), config.assets.len());
        Ok(1)
    }
}
