//! Coldstart - GPU worker bootstrap orchestrator.
//!
//! Provisions large model artifacts onto local disk, assembles
//! partitioned checkpoints into the single files the service loads,
//! starts the inference service as a background process, waits for its
//! health endpoint to answer, and hands control to the request handler.
//!
//! # Architecture
//!
//! The bootstrap is a straight pipeline with one deliberate asymmetry:
//! asset failures degrade (the service may not need every file), while
//! service failures are fatal (a worker without a ready service is
//! useless).
//!
//! - **`assets`** - What to download, over which transports, and how
//!   shard files become one artifact
//! - **`service`** - Spawning the service and probing its health endpoint
//! - **`pipeline`** - The stages tying it together, plus the handoff
//!
//! # Modules
//!
//! - [`config`] - Configuration loading from TOML files
//! - [`assets`] - Asset specs, fetching, shard merging, verification
//! - [`service`] - Service process supervision and readiness probing
//! - [`pipeline`] - Bootstrap stages and the handler handoff
//! - [`status_file`] - JSON status file for external monitoring
//! - [`error`] - Error types for the crate
//!
//! # Example
//!
//! ```no_run
//! use coldstart::config::Config;
//! use coldstart::pipeline::Pipeline;
//!
//! # async fn bootstrap() -> coldstart::error::Result<()> {
//! let config = Config::load("config.toml")?;
//! let mut pipeline = Pipeline::new(config)?;
//! let exit_code = pipeline.run().await?;
//! # let _ = exit_code;
//! # Ok(())
//! # }
//! ```

pub mod assets;
pub mod cli;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod service;
pub mod status_file;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;
