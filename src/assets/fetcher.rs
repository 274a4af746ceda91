//! Asset downloading with transport fallback and bounded retries.
//!
//! Each remote file is tried across an ordered transport ladder:
//! authenticated HTTP when a hub token is configured, plain HTTP, then an
//! external `curl` invocation for environments where the in-process
//! client cannot reach the hub. The whole ladder is retried for a fixed
//! number of rounds with a fixed backoff between rounds.
//!
//! Downloads stream to a `.partial` staging path and are renamed into
//! place on success, so the final path never holds a truncated file.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::config::HubConfig;
use crate::error::{FetchError, Result};

use super::{AssetSpec, DownloadOutcome};

const USER_AGENT: &str = concat!("coldstart/", env!("CARGO_PKG_VERSION"));

/// Per-request ceiling; checkpoint files run to tens of gigabytes.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(3600);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Which transport produced a download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    AuthenticatedHttp,
    PlainHttp,
    ExternalCurl,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransportKind::AuthenticatedHttp => "authenticated-http",
            TransportKind::PlainHttp => "plain-http",
            TransportKind::ExternalCurl => "curl",
        };
        f.write_str(name)
    }
}

/// One way of moving a remote file onto disk.
///
/// Implementations must leave a complete file at `dest` on `Ok`; callers
/// discard whatever is at `dest` on `Err`.
#[async_trait]
pub trait Transport: Send + Sync {
    fn kind(&self) -> TransportKind;

    /// Download `url` to `dest`, returning the bytes written.
    async fn download(&self, url: &str, dest: &Path) -> std::result::Result<u64, FetchError>;
}

/// Streaming reqwest transport, optionally sending a bearer token.
pub struct HttpTransport {
    client: reqwest::Client,
    token: Option<String>,
}

impl HttpTransport {
    pub fn plain(client: reqwest::Client) -> Self {
        Self {
            client,
            token: None,
        }
    }

    pub fn authenticated(client: reqwest::Client, token: String) -> Self {
        Self {
            client,
            token: Some(token),
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn kind(&self) -> TransportKind {
        if self.token.is_some() {
            TransportKind::AuthenticatedHttp
        } else {
            TransportKind::PlainHttp
        }
    }

    async fn download(&self, url: &str, dest: &Path) -> std::result::Result<u64, FetchError> {
        let mut request = self.client.get(url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let mut response = request.send().await?;
        if !response.status().is_success() {
            return Err(FetchError::Status {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }

        let bar = download_bar(response.content_length(), url);
        let mut file = fs::File::create(dest).await?;
        let mut written: u64 = 0;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
            bar.inc(chunk.len() as u64);
        }
        file.flush().await?;
        bar.finish_and_clear();

        Ok(written)
    }
}

/// Shells out to `curl` as a last resort.
pub struct CurlTransport;

#[async_trait]
impl Transport for CurlTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::ExternalCurl
    }

    async fn download(&self, url: &str, dest: &Path) -> std::result::Result<u64, FetchError> {
        let status = tokio::process::Command::new("curl")
            .arg("-L")
            .arg("-sS")
            .arg("--fail")
            .arg("-o")
            .arg(dest)
            .arg(url)
            .stdin(Stdio::null())
            .status()
            .await?;

        if !status.success() {
            return Err(FetchError::Tool {
                tool: "curl",
                status,
            });
        }

        let bytes = fs::metadata(dest).await?.len();
        Ok(bytes)
    }
}

/// Downloads assets over the configured transport ladder.
pub struct AssetFetcher {
    transports: Vec<Box<dyn Transport>>,
    base_url: String,
    rounds: u32,
    backoff: Duration,
}

impl AssetFetcher {
    /// Build a fetcher from hub configuration. The authenticated
    /// transport is present only when a token is configured.
    pub fn new(hub: &HubConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        let mut transports: Vec<Box<dyn Transport>> = Vec::new();
        if let Some(token) = &hub.token {
            transports.push(Box::new(HttpTransport::authenticated(
                client.clone(),
                token.clone(),
            )));
        }
        transports.push(Box::new(HttpTransport::plain(client)));
        transports.push(Box::new(CurlTransport));

        Ok(Self::with_transports(transports, hub))
    }

    /// Build a fetcher over explicit transports. Tests use this to
    /// script downloads without a network.
    #[must_use]
    pub fn with_transports(transports: Vec<Box<dyn Transport>>, hub: &HubConfig) -> Self {
        Self {
            transports,
            base_url: hub.base_url.trim_end_matches('/').to_string(),
            rounds: hub.retry_rounds.max(1),
            backoff: Duration::from_secs(hub.retry_backoff_secs),
        }
    }

    /// Ensure every file of `asset` is on disk.
    ///
    /// Never returns an error: failures are folded into the outcome and
    /// the caller decides what a missing asset means.
    pub async fn fetch(&self, asset: &AssetSpec) -> DownloadOutcome {
        if asset.local_path.exists() {
            debug!(
                asset = %asset.name,
                path = %asset.local_path.display(),
                "Asset already present"
            );
            return DownloadOutcome::cached(asset);
        }

        if asset.requires_auth && !self.has_authenticated_transport() {
            warn!(
                asset = %asset.name,
                "Asset requires authentication but no hub token is configured (set HF_TOKEN)"
            );
        }

        let mut outcome = DownloadOutcome {
            asset: asset.name.clone(),
            attempts: 0,
            transport: None,
            success: true,
            bytes_written: 0,
        };

        for remote_name in asset.remote_files() {
            let dest = asset.dest_for(remote_name);
            if dest.exists() {
                debug!(asset = %asset.name, file = remote_name, "File already present");
                continue;
            }
            if !self.fetch_file(asset, remote_name, &dest, &mut outcome).await {
                outcome.success = false;
            }
        }

        outcome
    }

    /// Run the retry rounds for a single remote file. Returns whether
    /// the file ended up at `dest`.
    async fn fetch_file(
        &self,
        asset: &AssetSpec,
        remote_name: &str,
        dest: &Path,
        outcome: &mut DownloadOutcome,
    ) -> bool {
        let url = self.file_url(asset, remote_name);
        let staging = staging_path(dest);

        if let Some(parent) = dest.parent() {
            if let Err(e) = fs::create_dir_all(parent).await {
                warn!(asset = %asset.name, error = %e, "Cannot create destination directory");
                return false;
            }
        }

        for round in 1..=self.rounds {
            for transport in &self.transports {
                outcome.attempts += 1;
                match transport.download(&url, &staging).await {
                    Ok(bytes) => match fs::rename(&staging, dest).await {
                        Ok(()) => {
                            info!(
                                asset = %asset.name,
                                file = remote_name,
                                transport = %transport.kind(),
                                bytes,
                                round,
                                "Downloaded"
                            );
                            outcome.transport = Some(transport.kind());
                            outcome.bytes_written += bytes;
                            return true;
                        }
                        Err(e) => {
                            warn!(
                                asset = %asset.name,
                                file = remote_name,
                                error = %e,
                                "Failed to move download into place"
                            );
                            let _ = fs::remove_file(&staging).await;
                        }
                    },
                    Err(e) => {
                        debug!(
                            asset = %asset.name,
                            file = remote_name,
                            transport = %transport.kind(),
                            round,
                            error = %e,
                            "Attempt failed"
                        );
                        let _ = fs::remove_file(&staging).await;
                    }
                }
            }
            if round < self.rounds {
                debug!(
                    asset = %asset.name,
                    file = remote_name,
                    round,
                    backoff_secs = self.backoff.as_secs(),
                    "Round exhausted, backing off"
                );
                tokio::time::sleep(self.backoff).await;
            }
        }

        warn!(
            asset = %asset.name,
            file = remote_name,
            rounds = self.rounds,
            "All transports failed"
        );
        false
    }

    /// URL a remote file resolves to.
    fn file_url(&self, asset: &AssetSpec, remote_name: &str) -> String {
        format!("{}/{}/resolve/main/{}", self.base_url, asset.repo, remote_name)
    }

    fn has_authenticated_transport(&self) -> bool {
        self.transports
            .iter()
            .any(|t| t.kind() == TransportKind::AuthenticatedHttp)
    }
}

/// Staging path downloads stream to before the final rename.
fn staging_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".partial");
    dest.with_file_name(name)
}

fn download_bar(total: Option<u64>, url: &str) -> ProgressBar {
    let bar = match total {
        Some(len) => {
            let bar = ProgressBar::new(len);
            bar.set_style(
                ProgressStyle::with_template(
                    "{spinner:.green} [{elapsed_precise}] {bytes}/{total_bytes} ({bytes_per_sec}) {msg}",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );
            bar
        }
        None => ProgressBar::new_spinner(),
    };
    let name = url.rsplit('/').next().unwrap_or(url);
    bar.set_message(name.to_string());
    bar
}
