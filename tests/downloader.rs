//! Integration tests for the download orchestrator
//!
//! These exercise the full attempt lifecycle against an in-process HTTP
//! fixture server: incremental metadata discovery, concurrent child fan-out,
//! known-asset substitution, aggregate progress, and atomic failure.

mod common;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use tempfile::TempDir;

use userscript_fetcher::app::{
    DownloadRequest, Downloader, KnownAssets, ScriptClient, ScriptRegistry,
};
use userscript_fetcher::errors::{InstallError, TransferError};

use common::{FixtureServer, Route};

fn client() -> ScriptClient {
    ScriptClient::new().expect("build client")
}

/// The concrete scenario: inline primary with one resource, no known assets.
#[tokio::test]
async fn test_inline_primary_with_one_resource() {
    let server = FixtureServer::start().await;
    server.route("/img.png", Route::binary("image/png", b"image-bytes"));

    let primary = format!(
        "// @name Foo\n// @namespace bar\n// @resource img {}\n...body...\n",
        server.url("/img.png")
    );

    let downloader = Downloader::new(client(), DownloadRequest::from_content(primary.clone()));
    downloader.start();

    let metadata = downloader.metadata().await.unwrap();
    assert_eq!(metadata.name, "Foo");
    assert_eq!(metadata.namespace, "bar");
    assert_eq!(
        metadata.resource_url("img").unwrap().as_str(),
        server.url("/img.png").as_str()
    );

    let bundle = downloader.completion().await.unwrap();
    assert_eq!(bundle.content, primary);
    assert_eq!(
        bundle.resources.get("img").unwrap().content,
        Bytes::from_static(b"image-bytes")
    );
    assert_eq!(
        bundle.resources.get("img").unwrap().mime.as_deref(),
        Some("image/png")
    );

    // One inline primary plus exactly one resource transfer
    assert_eq!(server.hits("/img.png"), 1);
    assert_eq!(server.total_hits(), 1);
    assert_eq!(downloader.progress(), 1.0);
}

/// A remote script declaring icon, dependency and resource via relative URLs.
#[tokio::test]
async fn test_remote_script_full_fan_out() {
    let server = FixtureServer::start().await;
    let script = "\
// ==UserScript==
// @name         Fan Out
// @namespace    it
// @icon         /icon.png
// @require      /lib.js
// @resource     data /data.bin
// ==/UserScript==
main();
";
    server.route("/fanout.user.js", Route::javascript(script));
    server.route("/icon.png", Route::binary("image/png", b"icon"));
    server.route("/lib.js", Route::javascript("lib();"));
    server.route("/data.bin", Route::binary("application/octet-stream", b"data"));

    let downloader = Downloader::new(
        client(),
        DownloadRequest::from_url(server.url("/fanout.user.js")),
    );
    downloader.start();

    let metadata = downloader.metadata().await.unwrap();
    assert_eq!(metadata.name, "Fan Out");
    // Relative URLs resolved against the script's own URL
    assert_eq!(
        metadata.icon_url.as_ref().unwrap().as_str(),
        server.url("/icon.png").as_str()
    );

    let bundle = downloader.completion().await.unwrap();
    assert_eq!(bundle.content, script);
    assert_eq!(bundle.icon.as_ref().unwrap().content, Bytes::from_static(b"icon"));
    assert_eq!(bundle.requires.len(), 1);
    assert_eq!(bundle.requires[0].content, "lib();");
    assert_eq!(
        bundle.resources.get("data").unwrap().content,
        Bytes::from_static(b"data")
    );
    assert_eq!(
        bundle.source_url.as_ref().unwrap().as_str(),
        server.url("/fanout.user.js").as_str()
    );

    for path in ["/fanout.user.js", "/icon.png", "/lib.js", "/data.bin"] {
        assert_eq!(server.hits(path), 1, "exactly one transfer for {path}");
    }
    assert_eq!(downloader.progress(), 1.0);
}

/// Metadata resolves from partial content while the body is still streaming.
#[tokio::test]
async fn test_metadata_resolves_before_primary_completes() {
    let server = FixtureServer::start().await;
    let header = "\
// ==UserScript==
// @name Early
// @namespace stream
// ==/UserScript==
";
    let body = "x();\n".repeat(400);
    let script = format!("{header}{body}");
    server.route(
        "/early.user.js",
        Route::javascript(&script).chunked(256, Duration::from_millis(80)),
    );

    let downloader = Downloader::new(
        client(),
        DownloadRequest::from_url(server.url("/early.user.js")),
    );
    downloader.start();

    let metadata = downloader.metadata().await.unwrap();
    assert_eq!(metadata.name, "Early");

    // The body is still dripping: completion must not have resolved yet.
    let still_pending =
        tokio::time::timeout(Duration::from_millis(10), downloader.completion()).await;
    assert!(still_pending.is_err(), "completion resolved before the body finished");
    assert!(downloader.progress() < 1.0);

    let bundle = downloader.completion().await.unwrap();
    assert_eq!(bundle.content, script);
    assert_eq!(downloader.progress(), 1.0);
}

/// A header only parseable from the complete body must still produce
/// metadata once the transfer finishes.
#[tokio::test]
async fn test_primary_completion_before_parse_success_no_deadlock() {
    let server = FixtureServer::start().await;
    // Bare directives with no terminating body line: no prefix of this text
    // parses, only the complete content does.
    let script = "// @name Late\n// @namespace ns\n";
    server.route("/late.user.js", Route::javascript(script));

    let downloader = Downloader::new(
        client(),
        DownloadRequest::from_url(server.url("/late.user.js")),
    );
    downloader.start();

    let metadata = tokio::time::timeout(Duration::from_secs(5), downloader.metadata())
        .await
        .expect("metadata deadlocked")
        .unwrap();
    assert_eq!(metadata.name, "Late");

    let bundle = downloader.completion().await.unwrap();
    assert_eq!(bundle.content, script);
    assert!(bundle.requires.is_empty());
    assert_eq!(downloader.progress(), 1.0);
}

/// A complete script with no parseable header fails both signals.
#[tokio::test]
async fn test_unparseable_remote_script_fails() {
    let server = FixtureServer::start().await;
    server.route("/plain.js", Route::javascript("function main() {}\n"));

    let downloader = Downloader::new(client(), DownloadRequest::from_url(server.url("/plain.js")));
    downloader.start();

    assert!(matches!(
        downloader.metadata().await,
        Err(InstallError::Parse(_))
    ));
    assert!(matches!(
        downloader.completion().await,
        Err(InstallError::Parse(_))
    ));
}

/// One failing dependency fails the attempt even when the others finished.
#[tokio::test]
async fn test_failed_dependency_is_fatal() {
    let server = FixtureServer::start().await;
    let script = "\
// ==UserScript==
// @name Fragile
// @require /a.js
// @require /b.js
// @require /missing.js
// ==/UserScript==
";
    server.route("/fragile.user.js", Route::javascript(script));
    server.route("/a.js", Route::javascript("a();"));
    server.route("/b.js", Route::javascript("b();"));
    // /missing.js has no route: the fixture answers 404

    let downloader = Downloader::new(
        client(),
        DownloadRequest::from_url(server.url("/fragile.user.js")),
    );
    downloader.start();

    // Metadata itself is fine; the attempt fails on the child transfer.
    assert!(downloader.metadata().await.is_ok());

    match downloader.completion().await {
        Err(InstallError::Transfer(TransferError::Status { url, status })) => {
            assert_eq!(status, 404);
            assert!(url.contains("/missing.js"));
        }
        other => panic!("expected a 404 transfer failure, got {:?}", other),
    }
}

/// Known assets are served from memory; only true cache-misses hit the wire.
#[tokio::test]
async fn test_known_assets_suppress_transfers() {
    let server = FixtureServer::start().await;
    let script = "\
// ==UserScript==
// @name Cached
// @icon /icon.png
// @require /lib.js
// @resource data /data.bin
// ==/UserScript==
";
    server.route("/cached.user.js", Route::javascript(script));

    let known = KnownAssets {
        icon: Some((server.url("/icon.png"), Bytes::from_static(b"known-icon"))),
        requires: HashMap::from([(server.url("/lib.js"), "known lib".to_string())]),
        resources: HashMap::from([(server.url("/data.bin"), Bytes::from_static(b"known-data"))]),
    };

    let downloader = Downloader::new(
        client(),
        DownloadRequest::from_url(server.url("/cached.user.js")).with_known_assets(known),
    );
    downloader.start();

    let bundle = downloader.completion().await.unwrap();
    assert_eq!(bundle.icon.as_ref().unwrap().content, Bytes::from_static(b"known-icon"));
    assert_eq!(bundle.requires[0].content, "known lib");
    assert_eq!(
        bundle.resources.get("data").unwrap().content,
        Bytes::from_static(b"known-data")
    );

    // Only the primary went over the network.
    assert_eq!(server.total_hits(), 1);
    assert_eq!(server.hits("/cached.user.js"), 1);
    assert_eq!(downloader.remote_child_count(), 0);
}

/// Feeding a completed bundle back as known assets issues zero child
/// transfers on the second attempt.
#[tokio::test]
async fn test_round_trip_reinstall() {
    let server = FixtureServer::start().await;
    let script = "\
// ==UserScript==
// @name Round
// @icon /icon.png
// @require /lib.js
// ==/UserScript==
";
    server.route("/round.user.js", Route::javascript(script));
    server.route("/icon.png", Route::binary("image/png", b"icon"));
    server.route("/lib.js", Route::javascript("lib();"));

    let first = Downloader::new(
        client(),
        DownloadRequest::from_url(server.url("/round.user.js")),
    );
    first.start();
    let metadata = first.metadata().await.unwrap();
    let bundle = first.completion().await.unwrap();
    assert_eq!(server.hits("/icon.png"), 1);
    assert_eq!(server.hits("/lib.js"), 1);

    let known = KnownAssets::from_bundle(&metadata, &bundle);
    let second = Downloader::new(
        client(),
        DownloadRequest::from_url(server.url("/round.user.js")).with_known_assets(known),
    );
    second.start();
    second.completion().await.unwrap();

    // The script itself was re-fetched; no child URL was.
    assert_eq!(server.hits("/round.user.js"), 2);
    assert_eq!(server.hits("/icon.png"), 1);
    assert_eq!(server.hits("/lib.js"), 1);
    assert_eq!(second.remote_child_count(), 0);
}

/// Aggregate progress stays in [0, 1] and never decreases once metadata is
/// known, even though registration grew the denominator.
#[tokio::test]
async fn test_aggregate_progress_bounds_and_monotonicity() {
    let server = FixtureServer::start().await;
    let script = "\
// ==UserScript==
// @name Meter
// @require /lib.js
// @resource data /data.bin
// ==/UserScript==
";
    server.route(
        "/meter.user.js",
        Route::javascript(&format!("{script}{}", "pad();\n".repeat(200)))
            .chunked(128, Duration::from_millis(20)),
    );
    server.route(
        "/lib.js",
        Route::javascript(&"l();\n".repeat(200)).chunked(128, Duration::from_millis(20)),
    );
    server.route(
        "/data.bin",
        Route::binary("application/octet-stream", &[7u8; 1000])
            .chunked(128, Duration::from_millis(20)),
    );

    let downloader = Downloader::new(
        client(),
        DownloadRequest::from_url(server.url("/meter.user.js")),
    );

    // The listener reads the aggregate through the public accessor from
    // inside the callback (reentrancy), recording whether metadata was
    // already published at the time of each sample.
    let samples: Arc<Mutex<Vec<(bool, f64)>>> = Arc::new(Mutex::new(Vec::new()));
    {
        let samples = samples.clone();
        let observer = downloader.clone();
        downloader.add_progress_listener(Arc::new(move |_tick| {
            let mut samples = samples.lock().unwrap();
            let known = observer.try_metadata().is_some();
            samples.push((known, observer.progress()));
        }));
    }

    downloader.start();
    downloader.completion().await.unwrap();

    let samples = samples.lock().unwrap();
    assert!(!samples.is_empty());
    for &(_, value) in samples.iter() {
        assert!((0.0..=1.0).contains(&value), "aggregate out of range: {value}");
    }

    let after_metadata: Vec<f64> = samples
        .iter()
        .filter(|(known, _)| *known)
        .map(|&(_, value)| value)
        .collect();
    for pair in after_metadata.windows(2) {
        assert!(
            pair[1] >= pair[0],
            "aggregate decreased after metadata was known: {} -> {}",
            pair[0],
            pair[1]
        );
    }

    assert_eq!(downloader.progress(), 1.0);
}

/// Completed attempts hand off to the registry; re-install updates in place.
#[tokio::test]
async fn test_install_handoff_to_registry() {
    let server = FixtureServer::start().await;
    let script = "\
// ==UserScript==
// @name Keeper
// @namespace reg
// @version 1.0
// ==/UserScript==
keep();
";
    server.route("/keeper.user.js", Route::javascript(script));

    let temp_dir = TempDir::new().unwrap();
    let registry = ScriptRegistry::open(temp_dir.path()).await.unwrap();

    let downloader = Downloader::new(
        client(),
        DownloadRequest::from_url(server.url("/keeper.user.js")),
    );
    let uuid = downloader.install(&registry).await.unwrap();

    let installed = registry.get(&uuid).await.unwrap();
    assert_eq!(installed.name, "Keeper");
    assert_eq!(installed.content, script);
    assert_eq!(
        installed.source_url.as_deref(),
        Some(server.url("/keeper.user.js").as_str())
    );

    // Installing the same script again keeps the record identity.
    let again = Downloader::new(
        client(),
        DownloadRequest::from_url(server.url("/keeper.user.js")),
    );
    let second_uuid = again.install(&registry).await.unwrap();
    assert_eq!(uuid, second_uuid);
    assert_eq!(registry.len().await, 1);
}

/// Attempts are independent: a failing attempt does not disturb one running
/// concurrently.
#[tokio::test]
async fn test_concurrent_attempts_are_independent() {
    let server = FixtureServer::start().await;
    let good = "\
// ==UserScript==
// @name Good
// ==/UserScript==
";
    server.route("/good.user.js", Route::javascript(good));
    server.route("/bad.user.js", Route::javascript("no header here\n"));

    let ok_attempt = Downloader::new(
        client(),
        DownloadRequest::from_url(server.url("/good.user.js")),
    );
    let bad_attempt = Downloader::new(
        client(),
        DownloadRequest::from_url(server.url("/bad.user.js")),
    );
    assert_ne!(ok_attempt.id(), bad_attempt.id());

    ok_attempt.start();
    bad_attempt.start();

    assert!(bad_attempt.completion().await.is_err());
    let bundle = ok_attempt.completion().await.unwrap();
    assert_eq!(bundle.content, good);
}
