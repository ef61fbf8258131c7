//! Acquisition orchestrator implementation.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::strategy::AcquisitionStrategy;
use super::types::{
    AcquisitionError, AcquisitionReport, AcquisitionState, AttemptOutcome, ExtractionAttempt,
    StrategyKind,
};
use crate::config::Config;
use crate::external::{ArgumentBuilder, FetchedBinaryStrategy, LocalBinaryStrategy};
use crate::fallback::InProcessExtractor;
use crate::fetcher::RuntimeFetcher;
use crate::locator::BinaryLocator;
use crate::metrics;
use crate::process::ProcessRunner;
use crate::request::{AcquisitionRequest, OutputFormat, QualityCeiling};
use crate::scratch::{CompletedDownload, ScratchManager};

/// Drives one request through the strategy chain.
///
/// Attempts are strictly sequential and share one scratch directory. Once an
/// external strategy has actually run, the remaining external strategies are
/// skipped: a second copy of the same tool would fail the same way.
pub struct Orchestrator {
    strategies: Vec<Arc<dyn AcquisitionStrategy>>,
    scratch: ScratchManager,
    download_basename: String,
}

impl Orchestrator {
    pub fn new(
        strategies: Vec<Arc<dyn AcquisitionStrategy>>,
        scratch: ScratchManager,
        download_basename: impl Into<String>,
    ) -> Self {
        Self {
            strategies,
            scratch,
            download_basename: download_basename.into(),
        }
    }

    /// Local binary, then fetched binary, then in-process, as enabled in config.
    pub fn from_config(config: &Config) -> Self {
        let scratch = ScratchManager::new(&config.acquisition.scratch_dir);
        let runner = ProcessRunner::new(Duration::from_secs(config.acquisition.timeout_secs));
        let args = ArgumentBuilder::new(config.transcoder.ffmpeg_path.clone());

        let mut strategies: Vec<Arc<dyn AcquisitionStrategy>> = vec![Arc::new(
            LocalBinaryStrategy::new(
                BinaryLocator::from_config(&config.locator),
                runner.clone(),
                args.clone(),
            ),
        )];

        if config.fetcher.enabled {
            strategies.push(Arc::new(FetchedBinaryStrategy::new(
                RuntimeFetcher::from_config(&config.fetcher, scratch.clone()),
                runner,
                args,
            )));
        }

        if config.fallback.enabled {
            strategies.push(Arc::new(InProcessExtractor::from_config(config)));
        }

        Self::new(
            strategies,
            scratch,
            config.acquisition.download_basename.clone(),
        )
    }

    /// Strategy order as configured.
    pub fn strategy_kinds(&self) -> Vec<StrategyKind> {
        self.strategies.iter().map(|s| s.kind()).collect()
    }

    pub fn scratch(&self) -> &ScratchManager {
        &self.scratch
    }

    /// Validates the input and runs the chain until an output file exists.
    ///
    /// On success the returned download owns the scratch directory; on
    /// failure the directory has already been removed.
    pub async fn acquire(
        &self,
        url: &str,
        format: OutputFormat,
        quality: QualityCeiling,
    ) -> Result<(CompletedDownload, AcquisitionReport), AcquisitionError> {
        let started = Instant::now();
        let mut report = AcquisitionReport::default();

        let result = self.run_chain(url, format, quality, &mut report).await;

        let label = match &result {
            Ok(_) => "success",
            Err(e) if e.is_client_error() => "invalid_input",
            Err(_) => "failed",
        };
        metrics::ACQUISITIONS.with_label_values(&[label]).inc();
        metrics::ACQUISITION_DURATION
            .with_label_values(&[label])
            .observe(started.elapsed().as_secs_f64());

        match result {
            Ok(download) => {
                report.enter(AcquisitionState::Streaming);
                info!(
                    strategy = ?report.winner(),
                    size = download.size(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Acquisition succeeded"
                );
                Ok((download, report))
            }
            Err(e) => {
                report.enter(AcquisitionState::Failed);
                if e.is_client_error() {
                    info!(error = %e, "Request rejected");
                } else {
                    warn!(
                        error = %e,
                        attempts = ?report.strategies_attempted(),
                        "Acquisition failed, all strategies exhausted"
                    );
                }
                Err(e)
            }
        }
    }

    async fn run_chain(
        &self,
        url: &str,
        format: OutputFormat,
        quality: QualityCeiling,
        report: &mut AcquisitionReport,
    ) -> Result<CompletedDownload, AcquisitionError> {
        report.enter(AcquisitionState::Validating);
        let request = AcquisitionRequest::new(url, format, quality)?;

        // Dropped on every early return below, which removes the directory.
        let scratch = self.scratch.allocate(format.extension()).await?;
        let download_name = format!("{}.{}", self.download_basename, format.extension());

        let mut external_ran = false;
        let mut ran: Vec<(StrategyKind, AttemptOutcome)> = Vec::new();
        let mut unavailable: Vec<String> = Vec::new();

        for strategy in &self.strategies {
            let kind = strategy.kind();
            if kind.is_external() && external_ran {
                debug!(strategy = %kind, "Skipping external strategy, one already ran");
                metrics::STRATEGIES_SKIPPED
                    .with_label_values(&[kind.as_str()])
                    .inc();
                continue;
            }

            report.enter(kind.entry_state());
            scratch.clear_output().await;

            let attempt_started = Instant::now();
            let mut outcome = strategy.attempt(&request, scratch.output_path()).await;
            if outcome.ran() {
                report.enter(kind.running_state());
            }

            let size = match outcome {
                AttemptOutcome::Produced => scratch.adopt_output().await,
                _ => None,
            };
            if outcome == AttemptOutcome::Produced && size.is_none() {
                outcome = AttemptOutcome::Failed {
                    exit_code: Some(0),
                    diagnostic: format!("{} reported success but wrote no output", kind),
                };
            }

            metrics::STRATEGY_ATTEMPTS
                .with_label_values(&[kind.as_str(), outcome.label()])
                .inc();
            report.attempts.push(ExtractionAttempt {
                strategy: kind,
                outcome: outcome.label(),
                exit_status: outcome.exit_code(),
                diagnostic: outcome.diagnostic().to_string(),
                output_file: size.map(|_| scratch.output_path().to_path_buf()),
                elapsed_ms: attempt_started.elapsed().as_millis() as u64,
            });

            if let Some(size) = size {
                return Ok(CompletedDownload::new(scratch, size, download_name));
            }

            if outcome.ran() {
                warn!(
                    strategy = %kind,
                    outcome = outcome.label(),
                    diagnostic = %outcome.diagnostic(),
                    "Strategy failed, falling back"
                );
                external_ran |= kind.is_external();
                ran.push((kind, outcome));
            } else {
                info!(strategy = %kind, reason = %outcome.diagnostic(), "Strategy unavailable");
                unavailable.push(format!("{}: {}", kind, outcome.diagnostic()));
            }
        }

        Err(match AcquisitionError::from_attempts(&ran) {
            Some(err) => err,
            None if unavailable.is_empty() => AcquisitionError::ToolUnavailable {
                reason: "no strategies configured".to_string(),
            },
            None => AcquisitionError::ToolUnavailable {
                reason: unavailable.join("; "),
            },
        })
    }
}
