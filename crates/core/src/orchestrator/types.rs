//! Types for the acquisition orchestrator.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::request::RequestError;
use crate::scratch::ScratchError;

/// The three acquisition approaches, in fallback order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    ExternalLocal,
    ExternalFetched,
    InProcess,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExternalLocal => "external_local",
            Self::ExternalFetched => "external_fetched",
            Self::InProcess => "in_process",
        }
    }

    pub fn is_external(&self) -> bool {
        !matches!(self, Self::InProcess)
    }

    /// State entered before the strategy is attempted.
    pub fn entry_state(&self) -> AcquisitionState {
        match self {
            Self::ExternalLocal => AcquisitionState::LocatingBinary,
            Self::ExternalFetched => AcquisitionState::FetchingBinary,
            Self::InProcess => AcquisitionState::InProcessFallback,
        }
    }

    /// State entered once the strategy has a tool to run.
    pub fn running_state(&self) -> AcquisitionState {
        match self {
            Self::ExternalLocal => AcquisitionState::UsingLocalBinary,
            Self::ExternalFetched => AcquisitionState::UsingFetchedBinary,
            Self::InProcess => AcquisitionState::InProcessFallback,
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one strategy attempt. Strategies never return errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// The strategy reports having written the output file.
    Produced,
    /// The strategy had nothing to run (no binary found, fetch failed, disabled).
    Unavailable { reason: String },
    /// The strategy ran and failed.
    Failed {
        exit_code: Option<i32>,
        diagnostic: String,
    },
    /// The strategy ran into its deadline and was killed.
    TimedOut { elapsed: Duration, diagnostic: String },
}

impl AttemptOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Produced => "produced",
            Self::Unavailable { .. } => "unavailable",
            Self::Failed { .. } => "failed",
            Self::TimedOut { .. } => "timed_out",
        }
    }

    /// Whether the strategy actually ran something.
    pub fn ran(&self) -> bool {
        !matches!(self, Self::Unavailable { .. })
    }

    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::Produced => Some(0),
            Self::Failed { exit_code, .. } => *exit_code,
            Self::TimedOut { .. } => Some(crate::process::TIMEOUT_EXIT_CODE),
            Self::Unavailable { .. } => None,
        }
    }

    pub fn diagnostic(&self) -> &str {
        match self {
            Self::Produced => "",
            Self::Unavailable { reason } => reason,
            Self::Failed { diagnostic, .. } | Self::TimedOut { diagnostic, .. } => diagnostic,
        }
    }
}

/// Orchestrator states, in the order a request can visit them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AcquisitionState {
    Validating,
    LocatingBinary,
    UsingLocalBinary,
    FetchingBinary,
    UsingFetchedBinary,
    InProcessFallback,
    Streaming,
    /// The response stream closed.
    Done,
    Failed,
}

impl AcquisitionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

/// Record of one attempt within a request.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionAttempt {
    pub strategy: StrategyKind,
    pub outcome: &'static str,
    pub exit_status: Option<i32>,
    pub diagnostic: String,
    /// Set only when a non-empty output was verified.
    pub output_file: Option<PathBuf>,
    pub elapsed_ms: u64,
}

/// Everything the orchestrator did for one request.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AcquisitionReport {
    pub attempts: Vec<ExtractionAttempt>,
    pub trail: Vec<AcquisitionState>,
}

impl AcquisitionReport {
    pub(crate) fn enter(&mut self, state: AcquisitionState) {
        if self.trail.last() != Some(&state) {
            tracing::debug!(state = ?state, "Acquisition state");
            self.trail.push(state);
        }
    }

    pub fn strategies_attempted(&self) -> Vec<StrategyKind> {
        self.attempts.iter().map(|a| a.strategy).collect()
    }

    /// Strategy that produced the output, if any.
    pub fn winner(&self) -> Option<StrategyKind> {
        self.attempts
            .iter()
            .find(|a| a.output_file.is_some())
            .map(|a| a.strategy)
    }
}

/// Terminal failure of an acquisition.
#[derive(Debug, Error)]
pub enum AcquisitionError {
    /// Missing or malformed input. Nothing was allocated.
    #[error("Invalid input: {0}")]
    InvalidInput(#[from] RequestError),

    /// No strategy had anything to run.
    #[error("No extraction tool available: {reason}")]
    ToolUnavailable { reason: String },

    /// The last strategy that ran produced no valid output.
    #[error("Extraction failed ({strategy}): {reason}")]
    ExtractionFailed {
        strategy: StrategyKind,
        reason: String,
    },

    /// The last strategy that ran hit its deadline.
    #[error("Extraction timed out ({strategy}) after {elapsed_secs}s")]
    Timeout {
        strategy: StrategyKind,
        elapsed_secs: u64,
    },

    /// The per-request scratch directory could not be created.
    #[error("Scratch allocation failed: {0}")]
    Scratch(#[from] ScratchError),
}

impl AcquisitionError {
    /// Caller's fault (HTTP 400) as opposed to exhausted strategies (500).
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidInput(_))
    }

    /// Builds the terminal error from the attempts that ran, oldest first.
    ///
    /// The variant and strategy follow the last attempt. An `ExtractionFailed`
    /// reason starts with its diagnostic and appends every earlier one, so the
    /// external tool's stderr survives an in-process failure after it.
    pub(crate) fn from_attempts(ran: &[(StrategyKind, AttemptOutcome)]) -> Option<Self> {
        let ((strategy, last), earlier) = ran.split_last()?;
        let error = match last {
            AttemptOutcome::TimedOut { elapsed, .. } => Self::Timeout {
                strategy: *strategy,
                elapsed_secs: elapsed.as_secs(),
            },
            other => {
                let mut reasons = vec![other.diagnostic().to_string()];
                reasons.extend(
                    earlier
                        .iter()
                        .rev()
                        .filter(|(_, outcome)| !outcome.diagnostic().is_empty())
                        .map(|(kind, outcome)| format!("{}: {}", kind, outcome.diagnostic())),
                );
                Self::ExtractionFailed {
                    strategy: *strategy,
                    reason: reasons.join("; "),
                }
            }
        };
        Some(error)
    }
}
