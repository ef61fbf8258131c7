//! The uniform strategy seam the orchestrator iterates over.

use async_trait::async_trait;
use std::path::Path;

use super::types::{AttemptOutcome, StrategyKind};
use crate::fallback::{FallbackError, InProcessExtractor};
use crate::request::AcquisitionRequest;

/// One way of producing the output file.
///
/// Implementations report every failure as an [`AttemptOutcome`]; the
/// orchestrator decides whether to move on.
#[async_trait]
pub trait AcquisitionStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    /// Tries to write `request`'s media to exactly `output`.
    async fn attempt(&self, request: &AcquisitionRequest, output: &Path) -> AttemptOutcome;
}

#[async_trait]
impl AcquisitionStrategy for InProcessExtractor {
    fn kind(&self) -> StrategyKind {
        StrategyKind::InProcess
    }

    async fn attempt(&self, request: &AcquisitionRequest, output: &Path) -> AttemptOutcome {
        match self.extract(request, output).await {
            Ok(()) => AttemptOutcome::Produced,
            Err(FallbackError::TranscodeTimeout { elapsed_secs }) => AttemptOutcome::TimedOut {
                elapsed: std::time::Duration::from_secs(elapsed_secs),
                diagnostic: format!("Transcoding timed out after {}s", elapsed_secs),
            },
            Err(FallbackError::Transcode { reason, exit_code }) => AttemptOutcome::Failed {
                exit_code,
                diagnostic: format!("Transcoding failed: {}", reason),
            },
            Err(e) => AttemptOutcome::Failed {
                exit_code: None,
                diagnostic: e.to_string(),
            },
        }
    }
}
