//! Shared test utilities available to both unit and integration tests.
//!
//! Enabled via `#[cfg(test)]` (unit tests) or the `testkit` feature
//! (integration tests).
//!
//! # Modules
//!
//! - [`transport`] — Scripted [`Transport`](crate::assets::Transport)
//!   implementations for download tests.
//! - [`http`] — Minimal canned-response HTTP servers for probe and
//!   fetch tests.
//! - [`config`] — Canonical test configurations and asset builders.

pub mod config;
pub mod http;
pub mod transport;
