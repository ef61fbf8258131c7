//! Error types for the runtime fetcher.

use thiserror::Error;

use crate::scratch::ScratchError;

/// Why a binary could not be fetched. Never fatal for a request.
#[derive(Debug, Error)]
pub enum FetchError {
    /// No remote source is known for this platform.
    #[error("No fetch sources for platform {platform}")]
    NoSources { platform: String },

    /// Connection, DNS or transfer failure.
    #[error("Failed to download {url}: {reason}")]
    Network { url: String, reason: String },

    /// Server answered with a non-success status.
    #[error("Download of {url} returned HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    /// Server answered with zero bytes.
    #[error("Download of {url} returned an empty payload")]
    EmptyPayload { url: String },

    /// Payload digest did not match the pinned one.
    #[error("Checksum mismatch for {url}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        url: String,
        expected: String,
        actual: String,
    },

    /// The downloaded binary did not pass `--version`.
    #[error("Self-check of binary from {url} failed (exit {exit_code}): {diagnostic}")]
    SelfCheckFailed {
        url: String,
        exit_code: i32,
        diagnostic: String,
    },

    /// Writing the payload to disk failed.
    #[error("Failed to store binary from {url}: {source}")]
    Io {
        url: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Scratch(#[from] ScratchError),
}

impl FetchError {
    pub(crate) fn network(url: &str, reason: impl Into<String>) -> Self {
        Self::Network {
            url: url.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn io(url: &str, source: std::io::Error) -> Self {
        Self::Io {
            url: url.to_string(),
            source,
        }
    }
}
