//! Strategies that drive the external extraction binary.
//!
//! Both strategies share the argument builder and the process runner and
//! differ only in where the binary comes from: the locator's search roots
//! or a runtime fetch.

mod args;

pub use args::{video_format_selector, ArgumentBuilder};

use async_trait::async_trait;
use std::path::Path;
use tracing::{debug, info};

use crate::fetcher::RuntimeFetcher;
use crate::locator::BinaryLocator;
use crate::metrics;
use crate::orchestrator::{AcquisitionStrategy, AttemptOutcome, StrategyKind};
use crate::process::ProcessRunner;
use crate::request::AcquisitionRequest;

/// Runs `binary` for `request` and converts the result into an attempt outcome.
async fn run_extraction(
    runner: &ProcessRunner,
    args: &ArgumentBuilder,
    binary: &Path,
    request: &AcquisitionRequest,
    output: &Path,
) -> AttemptOutcome {
    let argv = args.build(request, output);
    debug!(binary = %binary.display(), args = ?argv, "Running extraction binary");

    let outcome = runner.run(binary, &argv).await;
    if outcome.timed_out {
        return AttemptOutcome::TimedOut {
            elapsed: outcome.elapsed,
            diagnostic: outcome.stderr,
        };
    }
    if outcome.success() {
        return AttemptOutcome::Produced;
    }

    let diagnostic = if outcome.stderr.is_empty() {
        format!("{} exited with code {}", binary.display(), outcome.exit_code)
    } else {
        outcome.stderr
    };
    AttemptOutcome::Failed {
        exit_code: Some(outcome.exit_code),
        diagnostic,
    }
}

/// Uses a binary found in the locator's search roots.
pub struct LocalBinaryStrategy {
    locator: BinaryLocator,
    runner: ProcessRunner,
    args: ArgumentBuilder,
}

impl LocalBinaryStrategy {
    pub fn new(locator: BinaryLocator, runner: ProcessRunner, args: ArgumentBuilder) -> Self {
        Self {
            locator,
            runner,
            args,
        }
    }
}

#[async_trait]
impl AcquisitionStrategy for LocalBinaryStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::ExternalLocal
    }

    async fn attempt(&self, request: &AcquisitionRequest, output: &Path) -> AttemptOutcome {
        let located = self.locator.locate();
        let Some(binary) = located.found else {
            return AttemptOutcome::Unavailable {
                reason: format!(
                    "no extraction binary among {} candidates",
                    located.candidates.len()
                ),
            };
        };

        info!(binary = %binary.display(), "Using local extraction binary");
        run_extraction(&self.runner, &self.args, &binary, request, output).await
    }
}

/// Downloads a binary at request time, then runs it.
pub struct FetchedBinaryStrategy {
    fetcher: RuntimeFetcher,
    runner: ProcessRunner,
    args: ArgumentBuilder,
}

impl FetchedBinaryStrategy {
    pub fn new(fetcher: RuntimeFetcher, runner: ProcessRunner, args: ArgumentBuilder) -> Self {
        Self {
            fetcher,
            runner,
            args,
        }
    }
}

#[async_trait]
impl AcquisitionStrategy for FetchedBinaryStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::ExternalFetched
    }

    async fn attempt(&self, request: &AcquisitionRequest, output: &Path) -> AttemptOutcome {
        // The binary's directory lives only as long as this attempt.
        let binary = match self.fetcher.fetch_binary().await {
            Ok(binary) => {
                metrics::BINARY_FETCHES.with_label_values(&["success"]).inc();
                binary
            }
            Err(e) => {
                metrics::BINARY_FETCHES.with_label_values(&["failed"]).inc();
                info!(error = %e, "Runtime fetch failed, moving on");
                return AttemptOutcome::Unavailable {
                    reason: e.to_string(),
                };
            }
        };

        info!(
            binary = %binary.path().display(),
            source = %binary.source_url(),
            "Using fetched extraction binary"
        );
        run_extraction(&self.runner, &self.args, binary.path(), request, output).await
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::fetcher::FetchSource;
    use crate::locator::SearchRoot;
    use crate::platform::{Arch, Os, Platform};
    use crate::request::{OutputFormat, QualityCeiling};
    use crate::scratch::ScratchManager;
    use crate::testing::{write_script, FAKE_EXTRACTOR_SCRIPT};
    use std::time::Duration;
    use tempfile::TempDir;

    fn linux() -> Platform {
        Platform::new(Os::Linux, Arch::X86_64)
    }

    fn request() -> AcquisitionRequest {
        AcquisitionRequest::new(
            "https://example.com/video1",
            OutputFormat::Mp4,
            QualityCeiling::Auto,
        )
        .unwrap()
    }

    fn local(dir: &Path, timeout: Duration) -> LocalBinaryStrategy {
        LocalBinaryStrategy::new(
            BinaryLocator::new(vec![SearchRoot::Fixed(dir.to_path_buf())], linux()),
            ProcessRunner::new(timeout),
            ArgumentBuilder::default(),
        )
    }

    #[tokio::test]
    async fn test_local_miss_is_unavailable() {
        let bin_dir = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let outcome = local(bin_dir.path(), Duration::from_secs(5))
            .attempt(&request(), &out.path().join("download.mp4"))
            .await;
        assert!(matches!(outcome, AttemptOutcome::Unavailable { .. }));
        assert!(outcome.diagnostic().contains("3 candidates"));
    }

    #[tokio::test]
    async fn test_local_binary_writes_exact_output() {
        let bin_dir = TempDir::new().unwrap();
        write_script(bin_dir.path(), "yt-dlp", FAKE_EXTRACTOR_SCRIPT);
        let out = TempDir::new().unwrap();
        let output = out.path().join("download.mp4");

        let outcome = local(bin_dir.path(), Duration::from_secs(5))
            .attempt(&request(), &output)
            .await;
        assert_eq!(outcome, AttemptOutcome::Produced);
        assert!(std::fs::metadata(&output).unwrap().len() > 0);
    }

    #[tokio::test]
    async fn test_local_failure_carries_stderr() {
        let bin_dir = TempDir::new().unwrap();
        write_script(
            bin_dir.path(),
            "yt-dlp",
            "echo 'ERROR: [generic] Unsupported URL' >&2\nexit 1",
        );
        let out = TempDir::new().unwrap();

        let outcome = local(bin_dir.path(), Duration::from_secs(5))
            .attempt(&request(), &out.path().join("download.mp4"))
            .await;
        match outcome {
            AttemptOutcome::Failed {
                exit_code,
                diagnostic,
            } => {
                assert_eq!(exit_code, Some(1));
                assert!(diagnostic.contains("Unsupported URL"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_local_timeout() {
        let bin_dir = TempDir::new().unwrap();
        write_script(bin_dir.path(), "yt-dlp", "exec sleep 30");
        let out = TempDir::new().unwrap();

        let outcome = local(bin_dir.path(), Duration::from_millis(200))
            .attempt(&request(), &out.path().join("download.mp4"))
            .await;
        assert!(matches!(outcome, AttemptOutcome::TimedOut { .. }));
    }

    #[tokio::test]
    async fn test_fetch_failure_is_unavailable() {
        let scratch = TempDir::new().unwrap();
        let fetcher = RuntimeFetcher::new(
            vec![FetchSource::new("http://127.0.0.1:1/yt-dlp")],
            linux(),
            ScratchManager::new(scratch.path()),
            Duration::from_secs(2),
            Duration::from_secs(2),
        );
        let strategy = FetchedBinaryStrategy::new(
            fetcher,
            ProcessRunner::new(Duration::from_secs(5)),
            ArgumentBuilder::default(),
        );
        let out = TempDir::new().unwrap();

        let outcome = strategy
            .attempt(&request(), &out.path().join("download.mp4"))
            .await;
        assert!(matches!(outcome, AttemptOutcome::Unavailable { .. }));
        assert!(outcome.diagnostic().contains("127.0.0.1:1"));
    }
}
