//! Common test utilities for E2E testing with mocks.
//!
//! This module provides a test fixture that creates an in-process server
//! whose strategy chain runs over temp directories: a search root for fake
//! extraction binaries, a scratch root, and mocked media seams for the
//! in-process strategy.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use clipfetch_core::{
    external::{ArgumentBuilder, FetchedBinaryStrategy, LocalBinaryStrategy},
    fetcher::FetchSource,
    testing::{MockMediaSource, MockTranscoder},
    AcquisitionStrategy, BinaryLocator, Config, InProcessExtractor, Orchestrator, Platform,
    ProcessRunner, RuntimeFetcher, ScratchManager, SearchRoot,
};
use clipfetch_server::{api::create_router, state::AppState};

/// Test fixture for E2E testing with mock dependencies.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_download() {
///     let fixture = TestFixture::new();
///
///     let response = fixture.post("/api/v1/download", json!({
///         "url": "https://youtu.be/dQw4w9WgXcQ"
///     })).await;
///
///     assert_eq!(response.status, 200);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Mock media source behind the in-process strategy
    pub source: Arc<MockMediaSource>,
    /// Mock transcoder behind the in-process strategy
    pub transcoder: Arc<MockTranscoder>,
    /// Search root for fake extraction binaries
    pub bin_dir: TempDir,
    /// Root for per-request scratch directories
    pub scratch_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub bytes: Vec<u8>,
}

impl TestResponse {
    /// Body parsed as JSON, or `Null` when it is not JSON.
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.bytes).unwrap_or(Value::Null)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

impl TestFixture {
    /// Create a new test fixture with default mocks.
    pub fn new() -> Self {
        Self::with_config(TestConfig::default())
    }

    /// Create a test fixture with custom configuration.
    pub fn with_config(test_config: TestConfig) -> Self {
        let bin_dir = TempDir::new().expect("Failed to create bin dir");
        let scratch_dir = TempDir::new().expect("Failed to create scratch dir");
        let source = Arc::new(
            test_config
                .source
                .unwrap_or_else(MockMediaSource::with_default_streams),
        );
        let transcoder = Arc::new(MockTranscoder::new());

        let mut config = Config::default();
        config.acquisition.scratch_dir = scratch_dir.path().to_path_buf();
        config.locator.include_default_roots = false;
        config.locator.extra_dirs = vec![bin_dir.path().to_path_buf()];

        let platform = Platform::current();
        let locator = BinaryLocator::new(
            vec![SearchRoot::Fixed(bin_dir.path().to_path_buf())],
            platform,
        );
        let scratch = ScratchManager::new(scratch_dir.path());
        let runner = ProcessRunner::new(Duration::from_secs(10));

        let strategies: Vec<Arc<dyn AcquisitionStrategy>> = vec![
            Arc::new(LocalBinaryStrategy::new(
                locator.clone(),
                runner.clone(),
                ArgumentBuilder::default(),
            )),
            Arc::new(FetchedBinaryStrategy::new(
                RuntimeFetcher::new(
                    test_config.fetch_sources,
                    platform,
                    scratch.clone(),
                    Duration::from_secs(2),
                    Duration::from_secs(2),
                ),
                runner,
                ArgumentBuilder::default(),
            )),
            Arc::new(InProcessExtractor::new(
                source.clone(),
                transcoder.clone(),
                config.fallback.audio_bitrate_kbps,
            )),
        ];

        let orchestrator = Orchestrator::new(
            strategies,
            scratch,
            config.acquisition.download_basename.clone(),
        );
        let state = Arc::new(AppState::new(config, orchestrator, locator));

        Self {
            router: create_router(state),
            source,
            transcoder,
            bin_dir,
            scratch_dir,
        }
    }

    /// Number of entries left under the scratch root once pending
    /// removals, which run on the blocking pool, have settled.
    pub async fn scratch_entries(&self) -> usize {
        for _ in 0..100 {
            if count_entries(self.scratch_dir.path()) == 0 {
                return 0;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        count_entries(self.scratch_dir.path())
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request_raw("POST", path, &body.to_string(), "application/json")
            .await
    }

    /// Send a POST request with raw string body (for testing malformed JSON).
    pub async fn post_raw(&self, path: &str, body: &str) -> TestResponse {
        self.request_raw("POST", path, body, "application/json").await
    }

    /// Send a request with raw string body and custom content type.
    async fn request_raw(
        &self,
        method: &str,
        path: &str,
        body: &str,
        content_type: &str,
    ) -> TestResponse {
        let request = Request::builder()
            .method(method)
            .uri(path)
            .header("Content-Type", content_type)
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let body = body
            .map(|b| Body::from(b.to_string()))
            .unwrap_or_else(Body::empty);
        let request = Request::builder()
            .method(method)
            .uri(path)
            .body(body)
            .unwrap();
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes()
            .to_vec();

        TestResponse {
            status,
            headers,
            bytes,
        }
    }
}

/// Configuration for test fixture.
#[derive(Debug)]
pub struct TestConfig {
    /// Runtime fetch sources; unreachable by default.
    pub fetch_sources: Vec<FetchSource>,
    /// Replaces the default mock media source.
    pub source: Option<MockMediaSource>,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            fetch_sources: vec![FetchSource::new("http://127.0.0.1:1/yt-dlp_linux")],
            source: None,
        }
    }
}

impl TestConfig {
    /// In-process metadata resolution fails with `reason`.
    pub fn with_failing_source(reason: &str) -> Self {
        Self {
            source: Some(MockMediaSource::failing(reason)),
            ..Default::default()
        }
    }
}

pub fn count_entries(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
}

/// Answers `--version`, otherwise writes a small payload to the path after `-o`.
pub const FAKE_EXTRACTOR_SCRIPT: &str = r#"if [ "$1" = "--version" ]; then
  echo 2025.06.30
  exit 0
fi
out=""
while [ $# -gt 0 ]; do
  if [ "$1" = "-o" ]; then
    out="$2"
  fi
  shift
done
if [ -z "$out" ]; then
  echo "ERROR: no output path" >&2
  exit 2
fi
printf 'fake media payload\n' > "$out"
"#;

/// Writes an executable `#!/bin/sh` script named `name` into `dir`.
#[cfg(unix)]
pub fn write_script(dir: &Path, name: &str, body: &str) -> std::path::PathBuf {
    use std::io::Write;
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "#!/bin/sh").unwrap();
    writeln!(file, "{}", body).unwrap();
    file.sync_all().unwrap();
    drop(file);
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}
