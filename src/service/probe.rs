//! Readiness polling against the service health endpoint.

use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::{debug, info};

use crate::error::{Result, ServiceError};

/// Pause before the first poll, giving the service time to bind its
/// socket. Applied once per bootstrap, before the `max_wait` budget.
pub const WARMUP_DELAY: Duration = Duration::from_secs(15);

/// Per-poll request timeout.
const POLL_TIMEOUT: Duration = Duration::from_secs(5);

/// Polls the health endpoint until the service answers or the budget
/// runs out.
pub struct ReadinessProbe {
    client: reqwest::Client,
    warmup: Duration,
}

impl ReadinessProbe {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(POLL_TIMEOUT)
            .timeout(POLL_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            warmup: WARMUP_DELAY,
        })
    }

    /// Probe with a custom warm-up delay. Tests use this to skip the
    /// startup pause.
    #[cfg(any(test, feature = "testkit"))]
    pub fn with_warmup(warmup: Duration) -> Result<Self> {
        let mut probe = Self::new()?;
        probe.warmup = warmup;
        Ok(probe)
    }

    /// Wait until `health_url` answers.
    ///
    /// Any response counts as ready, whatever the status code: the check
    /// is "accepting connections", not "healthy". A poll is always
    /// attempted before the deadline is inspected, so a service that
    /// answers exactly at the boundary still passes.
    pub async fn wait_ready(
        &self,
        health_url: &str,
        max_wait: Duration,
        poll_interval: Duration,
    ) -> std::result::Result<(), ServiceError> {
        if !self.warmup.is_zero() {
            debug!(warmup_secs = self.warmup.as_secs(), "Warm-up before first poll");
            sleep(self.warmup).await;
        }

        let started = Instant::now();
        let deadline = started + max_wait;

        loop {
            match self.client.get(health_url).send().await {
                Ok(response) => {
                    info!(
                        url = health_url,
                        status = response.status().as_u16(),
                        elapsed_secs = started.elapsed().as_secs(),
                        "Service is ready"
                    );
                    return Ok(());
                }
                Err(e) => {
                    debug!(url = health_url, error = %e, "Health poll failed");
                }
            }

            if Instant::now() >= deadline {
                return Err(ServiceError::Unresponsive {
                    url: health_url.to_string(),
                    waited_secs: max_wait.as_secs(),
                });
            }
            sleep(poll_interval).await;
        }
    }
}
