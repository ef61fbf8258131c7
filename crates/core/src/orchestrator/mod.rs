//! Acquisition orchestrator.
//!
//! Turns a request into a verified output file by walking an ordered list of
//! strategies:
//! - **Local binary**: an extraction binary found in the search roots
//! - **Fetched binary**: downloaded at request time when none is bundled
//! - **In-process**: stream resolution and transcoding without the binary
//!
//! The first attempt that leaves a non-empty output file wins; the caller
//! then streams it and the scratch directory goes away with the stream.

mod runner;
mod strategy;
mod types;

pub use runner::Orchestrator;
pub use strategy::AcquisitionStrategy;
pub use types::{
    AcquisitionError, AcquisitionReport, AcquisitionState, AttemptOutcome, ExtractionAttempt,
    StrategyKind,
};
