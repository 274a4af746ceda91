//! Scripted [`Transport`](crate::assets::Transport) implementations.

use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::assets::{Transport, TransportKind};
use crate::error::FetchError;

// ---------------------------------------------------------------
// ScriptedTransport
// ---------------------------------------------------------------

/// A transport that fails a fixed number of times, then writes a canned
/// payload to the destination.
///
/// Call counts and requested URLs are shared through `Arc`s so tests can
/// keep asserting after the fetcher takes ownership of the transport.
pub struct ScriptedTransport {
    kind: TransportKind,
    failures_before_success: u32,
    payload: Vec<u8>,
    calls: Arc<AtomicU32>,
    urls: Arc<Mutex<Vec<String>>>,
}

impl ScriptedTransport {
    pub fn new(kind: TransportKind, failures_before_success: u32, payload: &[u8]) -> Self {
        Self {
            kind,
            failures_before_success,
            payload: payload.to_vec(),
            calls: Arc::new(AtomicU32::new(0)),
            urls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Succeeds on every attempt.
    pub fn succeeding(kind: TransportKind, payload: &[u8]) -> Self {
        Self::new(kind, 0, payload)
    }

    /// Fails on every attempt.
    pub fn failing(kind: TransportKind) -> Self {
        Self::new(kind, u32::MAX, &[])
    }

    /// Shared attempt counter.
    pub fn calls(&self) -> Arc<AtomicU32> {
        self.calls.clone()
    }

    /// Shared log of every URL requested, in order.
    pub fn urls(&self) -> Arc<Mutex<Vec<String>>> {
        self.urls.clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    fn kind(&self) -> TransportKind {
        self.kind
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<u64, FetchError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.urls.lock().unwrap().push(url.to_string());

        if call < self.failures_before_success {
            return Err(FetchError::Status {
                status: 503,
                url: url.to_string(),
            });
        }

        tokio::fs::write(dest, &self.payload).await?;
        Ok(self.payload.len() as u64)
    }
}
