//! Error types for the in-process fallback.

use thiserror::Error;

/// Typed failure of the in-process extractor, always with a readable reason.
#[derive(Debug, Error)]
pub enum FallbackError {
    /// The URL is not handled by the configured media source.
    #[error("Unsupported source for in-process extraction: {url}")]
    UnsupportedSource { url: String },

    /// Metadata resolution failed.
    #[error("Failed to resolve media metadata: {reason}")]
    Metadata { reason: String },

    /// No stream satisfied the selection predicates.
    #[error("No {kind} stream matches the requested profile")]
    NoMatchingStream { kind: &'static str },

    /// Opening or reading a source stream failed.
    #[error("Failed to read source stream: {reason}")]
    Stream { reason: String },

    /// The transcoder exited unsuccessfully.
    #[error("Transcoding failed: {reason}")]
    Transcode {
        reason: String,
        exit_code: Option<i32>,
    },

    /// The transcoder was killed by its deadline.
    #[error("Transcoding timed out after {elapsed_secs}s")]
    TranscodeTimeout { elapsed_secs: u64 },

    /// The transcoder reported success but wrote nothing.
    #[error("Transcoder produced an empty output file")]
    EmptyOutput,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FallbackError {
    pub fn metadata(reason: impl Into<String>) -> Self {
        Self::Metadata {
            reason: reason.into(),
        }
    }

    pub fn stream(reason: impl Into<String>) -> Self {
        Self::Stream {
            reason: reason.into(),
        }
    }
}
