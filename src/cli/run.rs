//! Handler for the `run` command.

use tokio::signal;
use tracing::{error, info};

use crate::cli::RunArgs;
use crate::config::Config;
use crate::error::Result;
use crate::pipeline::Pipeline;

/// Execute the run command. Returns the process exit code, which on the
/// happy path is the handler's exit code.
pub async fn execute(args: &RunArgs) -> Result<i32> {
    let mut config = Config::load(&args.config)?;

    // Apply CLI overrides
    if let Some(ref level) = args.log_level {
        config.logging.level = level.clone();
    }
    if args.json_logs {
        config.logging.format = "json".to_string();
    }

    config.init_logging();

    info!(
        assets = config.assets.len(),
        service = %config.service.command,
        "coldstart starting"
    );

    let mut pipeline = Pipeline::new(config)?;

    tokio::select! {
        result = pipeline.run() => {
            match result {
                Ok(code) => {
                    info!(code, "coldstart finished");
                    Ok(code)
                }
                Err(e) => {
                    error!(error = %e, "Fatal error");
                    std::process::exit(1);
                }
            }
        }
        _ = signal::ctrl_c() => {
            // Dropping the pipeline future kills the service via
            // kill_on_drop.
            info!("Shutdown signal received");
            Ok(130)
        }
    }
}
