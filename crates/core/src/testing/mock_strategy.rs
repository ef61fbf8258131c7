//! Scripted acquisition strategy for orchestrator tests.

use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::orchestrator::{AcquisitionStrategy, AttemptOutcome, StrategyKind};
use crate::request::AcquisitionRequest;

/// What a [`MockStrategy`] does when attempted.
#[derive(Debug, Clone)]
pub enum MockBehavior {
    /// Writes the bytes to the output path and reports success.
    Produce(Vec<u8>),
    /// Reports that nothing could be run.
    Unavailable(String),
    /// Reports a failed run with exit code 1.
    Fail(String),
    /// Leaves a partial file behind, then reports failure.
    FailAfterWriting(Vec<u8>, String),
    /// Reports a timeout after the given number of seconds.
    TimeOut(u64),
    /// Writes `clean` if the output path was empty on entry, `dirty` otherwise.
    ExpectCleanOutput,
}

/// Mock implementation of the AcquisitionStrategy trait.
#[derive(Debug)]
pub struct MockStrategy {
    kind: StrategyKind,
    behavior: MockBehavior,
    calls: AtomicUsize,
}

impl MockStrategy {
    pub fn new(kind: StrategyKind, behavior: MockBehavior) -> Self {
        Self {
            kind,
            behavior,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AcquisitionStrategy for MockStrategy {
    fn kind(&self) -> StrategyKind {
        self.kind
    }

    async fn attempt(&self, _request: &AcquisitionRequest, output: &Path) -> AttemptOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            MockBehavior::Produce(bytes) => match tokio::fs::write(output, bytes).await {
                Ok(()) => AttemptOutcome::Produced,
                Err(e) => AttemptOutcome::Failed {
                    exit_code: Some(1),
                    diagnostic: e.to_string(),
                },
            },
            MockBehavior::Unavailable(reason) => AttemptOutcome::Unavailable {
                reason: reason.clone(),
            },
            MockBehavior::Fail(diagnostic) => AttemptOutcome::Failed {
                exit_code: Some(1),
                diagnostic: diagnostic.clone(),
            },
            MockBehavior::FailAfterWriting(bytes, diagnostic) => {
                let _ = tokio::fs::write(output, bytes).await;
                AttemptOutcome::Failed {
                    exit_code: Some(1),
                    diagnostic: diagnostic.clone(),
                }
            }
            MockBehavior::TimeOut(secs) => AttemptOutcome::TimedOut {
                elapsed: Duration::from_secs(*secs),
                diagnostic: format!("Timed out after {}s", secs),
            },
            MockBehavior::ExpectCleanOutput => {
                let content: &[u8] = if output.exists() { b"dirty" } else { b"clean" };
                match tokio::fs::write(output, content).await {
                    Ok(()) => AttemptOutcome::Produced,
                    Err(e) => AttemptOutcome::Failed {
                        exit_code: Some(1),
                        diagnostic: e.to_string(),
                    },
                }
            }
        }
    }
}
