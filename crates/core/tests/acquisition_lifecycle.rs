//! Acquisition lifecycle integration tests.
//!
//! These tests drive the real strategy chain end to end:
//! validating -> locating -> fetching -> in-process -> streaming -> done
//! with fake binaries on a synthetic filesystem and mocked media seams.

#![cfg(unix)]

mod common;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use clipfetch_core::{
    external::{ArgumentBuilder, FetchedBinaryStrategy, LocalBinaryStrategy},
    fetcher::FetchSource,
    platform::{Arch, Os},
    testing::{MockMediaSource, MockTranscoder},
    AcquisitionError, AcquisitionRequest, AcquisitionStrategy, BinaryLocator, InProcessExtractor,
    Orchestrator, OutputFormat, Platform, ProcessRunner, QualityCeiling, RuntimeFetcher,
    ScratchManager, SearchRoot, StrategyKind,
};

use common::{removed_eventually, settled_entries, write_script, FAKE_EXTRACTOR_SCRIPT};

/// Test helper wiring all three strategies over temp directories.
struct TestHarness {
    bin_dir: TempDir,
    scratch_dir: TempDir,
    fetch_sources: Vec<FetchSource>,
    source: Arc<MockMediaSource>,
    transcoder: Arc<MockTranscoder>,
}

impl TestHarness {
    fn new() -> Self {
        Self {
            bin_dir: TempDir::new().expect("Failed to create bin dir"),
            scratch_dir: TempDir::new().expect("Failed to create scratch dir"),
            fetch_sources: vec![
                FetchSource::new("http://127.0.0.1:1/yt-dlp_linux"),
                FetchSource::new("http://127.0.0.1:1/yt-dlp_linux_nightly"),
            ],
            source: Arc::new(MockMediaSource::with_default_streams()),
            transcoder: Arc::new(MockTranscoder::new()),
        }
    }

    fn install_local_binary(&self, body: &str) {
        write_script(self.bin_dir.path(), "yt-dlp", body);
    }

    fn in_process(&self) -> InProcessExtractor {
        InProcessExtractor::new(self.source.clone(), self.transcoder.clone(), 192)
    }

    fn orchestrator(&self) -> Orchestrator {
        let platform = Platform::new(Os::Linux, Arch::X86_64);
        let runner = ProcessRunner::new(Duration::from_secs(10));
        let scratch = ScratchManager::new(self.scratch_dir.path());

        let strategies: Vec<Arc<dyn AcquisitionStrategy>> = vec![
            Arc::new(LocalBinaryStrategy::new(
                BinaryLocator::new(
                    vec![SearchRoot::Fixed(self.bin_dir.path().to_path_buf())],
                    platform,
                ),
                runner.clone(),
                ArgumentBuilder::default(),
            )),
            Arc::new(FetchedBinaryStrategy::new(
                RuntimeFetcher::new(
                    self.fetch_sources.clone(),
                    platform,
                    scratch.clone(),
                    Duration::from_secs(2),
                    Duration::from_secs(2),
                ),
                runner,
                ArgumentBuilder::default(),
            )),
            Arc::new(self.in_process()),
        ];

        Orchestrator::new(strategies, scratch, "clipfetch-download")
    }

    async fn scratch_entries(&self) -> usize {
        settled_entries(self.scratch_dir.path()).await
    }
}

/// Serves a runnable binary at `/yt-dlp`.
async fn binary_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/yt-dlp"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"#!/bin/sh\nexit 0\n".to_vec()))
        .mount(&server)
        .await;
    server
}

async fn request_count(server: &MockServer) -> usize {
    server.received_requests().await.map(|r| r.len()).unwrap_or(0)
}

async fn collect(download: clipfetch_core::CompletedDownload) -> Vec<u8> {
    let mut stream = download.into_stream().await.expect("open stream");
    let mut body = Vec::new();
    while let Some(chunk) = stream.next().await {
        body.extend(chunk.expect("chunk"));
    }
    body
}

#[tokio::test]
async fn test_local_binary_short_circuits_chain() {
    let mut harness = TestHarness::new();
    let server = binary_server().await;
    harness.fetch_sources = vec![FetchSource::new(format!("{}/yt-dlp", server.uri()))];
    harness.install_local_binary(FAKE_EXTRACTOR_SCRIPT);

    let (download, report) = harness
        .orchestrator()
        .acquire("https://example/video1", OutputFormat::Mp4, QualityCeiling::Auto)
        .await
        .expect("acquire");

    assert_eq!(report.strategies_attempted(), vec![StrategyKind::ExternalLocal]);
    assert_eq!(request_count(&server).await, 0);
    assert!(harness.source.opened_urls().is_empty());

    let scratch_path = download.scratch_path().to_path_buf();
    let body = collect(download).await;
    assert_eq!(body, b"fake media payload\n");
    assert!(removed_eventually(&scratch_path).await);
    assert_eq!(harness.scratch_entries().await, 0);
}

#[tokio::test]
async fn test_fallback_result_matches_direct_in_process_extraction() {
    let harness = TestHarness::new();

    let (download, report) = harness
        .orchestrator()
        .acquire("https://youtu.be/dQw4w9WgXcQ", OutputFormat::Mp4, QualityCeiling::P720)
        .await
        .expect("acquire");
    assert_eq!(report.winner(), Some(StrategyKind::InProcess));
    let via_chain = collect(download).await;

    let direct_dir = TempDir::new().unwrap();
    let direct_output = direct_dir.path().join("download.mp4");
    let request = AcquisitionRequest::new(
        "https://youtu.be/dQw4w9WgXcQ",
        OutputFormat::Mp4,
        QualityCeiling::P720,
    )
    .unwrap();
    harness
        .in_process()
        .extract(&request, &direct_output)
        .await
        .expect("direct extraction");

    assert_eq!(via_chain, std::fs::read(&direct_output).unwrap());
    assert_eq!(harness.scratch_entries().await, 0);
}

#[tokio::test]
async fn test_local_failure_goes_straight_to_in_process() {
    let mut harness = TestHarness::new();
    let server = binary_server().await;
    harness.fetch_sources = vec![FetchSource::new(format!("{}/yt-dlp", server.uri()))];
    harness.install_local_binary(
        "echo 'ERROR: Sign in to confirm you are not a bot' >&2\nexit 1",
    );

    let (download, report) = harness
        .orchestrator()
        .acquire("https://youtu.be/dQw4w9WgXcQ", OutputFormat::Mp3, QualityCeiling::Auto)
        .await
        .expect("acquire");

    assert_eq!(request_count(&server).await, 0);
    assert_eq!(
        report.strategies_attempted(),
        vec![StrategyKind::ExternalLocal, StrategyKind::InProcess]
    );
    assert!(report.attempts[0].diagnostic.contains("not a bot"));
    assert!(collect(download).await.starts_with(b"MP3@192:"));
}

#[tokio::test]
async fn test_every_strategy_failing_reports_last_diagnostic() {
    let mut harness = TestHarness::new();
    harness.source = Arc::new(MockMediaSource::failing("video unavailable in your country"));

    let err = harness
        .orchestrator()
        .acquire("https://example/video1", OutputFormat::Mp4, QualityCeiling::Auto)
        .await
        .expect_err("all strategies fail");

    match &err {
        AcquisitionError::ExtractionFailed { strategy, reason } => {
            assert_eq!(*strategy, StrategyKind::InProcess);
            assert!(reason.contains("video unavailable in your country"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!err.is_client_error());
    assert_eq!(harness.scratch_entries().await, 0);
}

#[tokio::test]
async fn test_empty_url_touches_nothing() {
    let harness = TestHarness::new();
    harness.install_local_binary(FAKE_EXTRACTOR_SCRIPT);

    let err = harness
        .orchestrator()
        .acquire("", OutputFormat::Mp4, QualityCeiling::Auto)
        .await
        .expect_err("invalid input");

    assert!(err.is_client_error());
    assert_eq!(harness.scratch_entries().await, 0);
}

#[tokio::test]
async fn test_client_abort_mid_stream_releases_scratch() {
    let harness = TestHarness::new();
    // large enough for several chunks
    let body = "yes | head -c 1000000 > \"$out\"";
    let script =
        FAKE_EXTRACTOR_SCRIPT.replace("printf 'fake media payload\\n' > \"$out\"", body);
    harness.install_local_binary(&script);

    let (download, _) = harness
        .orchestrator()
        .acquire("https://example/video1", OutputFormat::Mp4, QualityCeiling::Auto)
        .await
        .expect("acquire");
    assert_eq!(download.size(), 1_000_000);
    let scratch_path = download.scratch_path().to_path_buf();

    let mut stream = download.into_stream().await.unwrap();
    assert!(!stream.next().await.unwrap().unwrap().is_empty());
    drop(stream);

    assert!(removed_eventually(&scratch_path).await);
    assert!(!Path::new(&scratch_path).join("download.mp4").exists());
}
