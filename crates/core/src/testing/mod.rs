//! Testing utilities and mock implementations.
//!
//! Mocks cover every seam the orchestrator depends on, so the whole chain
//! can be exercised without network access or real media tools.
//!
//! # Example
//!
//! ```rust,ignore
//! use clipfetch_core::testing::{MockMediaSource, MockTranscoder};
//!
//! let source = Arc::new(MockMediaSource::with_default_streams());
//! let transcoder = Arc::new(MockTranscoder::new());
//! let extractor = InProcessExtractor::new(source.clone(), transcoder, 192);
//!
//! extractor.extract(&request, &output).await?;
//! assert_eq!(source.opened_urls().len(), 2);
//! ```

mod mock_media;
mod mock_strategy;
#[cfg(test)]
mod support;

pub use mock_media::{MockMediaSource, MockTranscoder};
pub use mock_strategy::{MockBehavior, MockStrategy};
#[cfg(test)]
pub(crate) use support::*;
