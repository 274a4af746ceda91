//! Download behavior: idempotence, transport fallback, bounded retries.

use std::sync::atomic::Ordering;

use coldstart::assets::{AssetFetcher, Transport, TransportKind};
use coldstart::testkit::config::{fast_hub, partitioned_asset, single_asset};
use coldstart::testkit::http::{spawn_responder, CannedResponse};
use coldstart::testkit::transport::ScriptedTransport;
use tempfile::tempdir;

#[tokio::test]
async fn existing_destination_short_circuits_all_transports() {
    let dir = tempdir().unwrap();
    let asset = single_asset(dir.path(), "vae", "vae.safetensors");
    std::fs::write(&asset.local_path, b"weights").unwrap();

    let transport = ScriptedTransport::failing(TransportKind::PlainHttp);
    let calls = transport.calls();
    let fetcher = AssetFetcher::with_transports(vec![Box::new(transport)], &fast_hub(3));

    let outcome = fetcher.fetch(&asset).await;

    assert!(outcome.success);
    assert_eq!(outcome.attempts, 0);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn falls_back_to_the_next_transport_in_order() {
    let dir = tempdir().unwrap();
    let asset = single_asset(dir.path(), "vae", "vae.safetensors");

    let failing = ScriptedTransport::failing(TransportKind::AuthenticatedHttp);
    let failing_calls = failing.calls();
    let succeeding = ScriptedTransport::succeeding(TransportKind::PlainHttp, b"payload");
    let fetcher = AssetFetcher::with_transports(
        vec![Box::new(failing), Box::new(succeeding)],
        &fast_hub(3),
    );

    let outcome = fetcher.fetch(&asset).await;

    assert!(outcome.success);
    assert_eq!(outcome.transport, Some(TransportKind::PlainHttp));
    assert_eq!(outcome.attempts, 2);
    assert_eq!(failing_calls.load(Ordering::SeqCst), 1);
    assert_eq!(std::fs::read(&asset.local_path).unwrap(), b"payload");
}

#[tokio::test]
async fn gives_up_after_exactly_the_configured_rounds() {
    let dir = tempdir().unwrap();
    let asset = single_asset(dir.path(), "vae", "vae.safetensors");

    let first = ScriptedTransport::failing(TransportKind::PlainHttp);
    let second = ScriptedTransport::failing(TransportKind::ExternalCurl);
    let first_calls = first.calls();
    let second_calls = second.calls();
    let fetcher =
        AssetFetcher::with_transports(vec![Box::new(first), Box::new(second)], &fast_hub(3));

    let outcome = fetcher.fetch(&asset).await;

    assert!(!outcome.success);
    assert_eq!(outcome.attempts, 6);
    assert_eq!(first_calls.load(Ordering::SeqCst), 3);
    assert_eq!(second_calls.load(Ordering::SeqCst), 3);
    assert!(!asset.local_path.exists());
    assert!(
        !dir.path().join("vae.safetensors.partial").exists(),
        "failed fetch must not leave staging files"
    );
}

#[tokio::test]
async fn later_rounds_succeed_after_transient_failures() {
    let dir = tempdir().unwrap();
    let asset = single_asset(dir.path(), "vae", "vae.safetensors");

    // Fails the first two attempts, succeeds on the third.
    let transport = ScriptedTransport::new(TransportKind::PlainHttp, 2, b"eventually");
    let calls = transport.calls();
    let fetcher = AssetFetcher::with_transports(vec![Box::new(transport)], &fast_hub(3));

    let outcome = fetcher.fetch(&asset).await;

    assert!(outcome.success);
    assert_eq!(outcome.attempts, 3);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(std::fs::read(&asset.local_path).unwrap(), b"eventually");
}

#[tokio::test]
async fn partitioned_fetch_pulls_every_part_and_the_manifest() {
    let dir = tempdir().unwrap();
    let parts = [
        "model-00001-of-00003.safetensors",
        "model-00002-of-00003.safetensors",
        "model-00003-of-00003.safetensors",
    ];
    let asset = partitioned_asset(
        dir.path(),
        "checkpoint",
        &parts,
        "model.safetensors.index.json",
        "model.safetensors",
    );

    let transport = ScriptedTransport::succeeding(TransportKind::PlainHttp, b"shard-bytes");
    let urls = transport.urls();
    let fetcher = AssetFetcher::with_transports(vec![Box::new(transport)], &fast_hub(1));

    let outcome = fetcher.fetch(&asset).await;

    assert!(outcome.success);
    assert_eq!(outcome.attempts, 4);

    let requested = urls.lock().unwrap().clone();
    assert_eq!(requested.len(), 4);
    for (url, part) in requested.iter().zip(parts.iter()) {
        assert!(url.ends_with(part), "unexpected order: {requested:?}");
    }
    assert!(
        requested[3].ends_with("model.safetensors.index.json"),
        "manifest must be fetched after the parts"
    );

    for part in parts {
        assert!(dir.path().join(part).exists());
    }
    assert!(dir.path().join("model.safetensors.index.json").exists());
}

#[tokio::test]
async fn partitioned_fetch_skips_parts_already_on_disk() {
    let dir = tempdir().unwrap();
    let parts = [
        "model-00001-of-00002.safetensors",
        "model-00002-of-00002.safetensors",
    ];
    let asset = partitioned_asset(
        dir.path(),
        "checkpoint",
        &parts,
        "model.safetensors.index.json",
        "model.safetensors",
    );
    std::fs::write(dir.path().join(parts[0]), b"already here").unwrap();

    let transport = ScriptedTransport::succeeding(TransportKind::PlainHttp, b"fresh");
    let calls = transport.calls();
    let fetcher = AssetFetcher::with_transports(vec![Box::new(transport)], &fast_hub(1));

    let outcome = fetcher.fetch(&asset).await;

    assert!(outcome.success);
    // Only the second part and the manifest hit the network.
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(std::fs::read(dir.path().join(parts[0])).unwrap(), b"already here");
}

#[tokio::test]
async fn one_bad_file_fails_the_asset_but_keeps_the_good_ones() {
    let dir = tempdir().unwrap();
    let asset = partitioned_asset(
        dir.path(),
        "checkpoint",
        &["part-a.safetensors", "part-b.safetensors"],
        "model.safetensors.index.json",
        "model.safetensors",
    );

    // First file downloads, everything after fails.
    let transport = ScriptedTransport::new(TransportKind::PlainHttp, 0, b"bytes");
    let flaky = FailAfter {
        inner: transport,
        allow: 1,
    };
    let fetcher = AssetFetcher::with_transports(vec![Box::new(flaky)], &fast_hub(1));

    let outcome = fetcher.fetch(&asset).await;

    assert!(!outcome.success);
    assert!(dir.path().join("part-a.safetensors").exists());
    assert!(!dir.path().join("part-b.safetensors").exists());
}

/// Delegates to an inner transport for the first `allow` calls, then
/// fails unconditionally.
struct FailAfter {
    inner: ScriptedTransport,
    allow: u32,
}

#[async_trait::async_trait]
impl Transport for FailAfter {
    fn kind(&self) -> TransportKind {
        self.inner.kind()
    }

    async fn download(
        &self,
        url: &str,
        dest: &std::path::Path,
    ) -> Result<u64, coldstart::error::FetchError> {
        let seen = self.inner.calls().load(Ordering::SeqCst);
        if seen >= self.allow {
            return Err(coldstart::error::FetchError::Status {
                status: 500,
                url: url.to_string(),
            });
        }
        self.inner.download(url, dest).await
    }
}

// ---------------------------------------------------------------
// Real HTTP transports against a local responder
// ---------------------------------------------------------------

#[tokio::test]
async fn http_transport_streams_the_body_to_disk() {
    let (addr, server) = spawn_responder(CannedResponse::Ok(b"tensor-bytes".to_vec())).await;
    let dir = tempdir().unwrap();
    let asset = single_asset(dir.path(), "vae", "vae.safetensors");

    let mut hub = fast_hub(1);
    hub.base_url = format!("http://{addr}");
    let fetcher = AssetFetcher::new(&hub).unwrap();

    let outcome = fetcher.fetch(&asset).await;

    assert!(outcome.success);
    assert_eq!(outcome.transport, Some(TransportKind::PlainHttp));
    assert_eq!(outcome.bytes_written, 12);
    assert_eq!(std::fs::read(&asset.local_path).unwrap(), b"tensor-bytes");
    server.abort();
}

#[tokio::test]
async fn bearer_token_reaches_the_hub() {
    let (addr, server) = spawn_responder(CannedResponse::RequireBearer {
        token: "hub-secret".to_string(),
        body: b"gated".to_vec(),
    })
    .await;
    let dir = tempdir().unwrap();
    let mut asset = single_asset(dir.path(), "checkpoint", "model.safetensors");
    asset.requires_auth = true;

    let mut hub = fast_hub(1);
    hub.base_url = format!("http://{addr}");
    hub.token = Some("hub-secret".to_string());
    let fetcher = AssetFetcher::new(&hub).unwrap();

    let outcome = fetcher.fetch(&asset).await;

    assert!(outcome.success);
    assert_eq!(outcome.transport, Some(TransportKind::AuthenticatedHttp));
    assert_eq!(std::fs::read(&asset.local_path).unwrap(), b"gated");
    server.abort();
}
