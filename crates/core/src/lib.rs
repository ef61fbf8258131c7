pub mod config;
pub mod external;
pub mod fallback;
pub mod fetcher;
pub mod locator;
pub mod metrics;
pub mod orchestrator;
pub mod platform;
pub mod process;
pub mod request;
pub mod scratch;
pub mod testing;

pub use config::{
    load_config, load_config_from_env, load_config_from_str, validate_config, Config, ConfigError,
};
pub use external::ArgumentBuilder;
pub use fallback::{FallbackError, InProcessExtractor, MediaSource, SourceStream, Transcoder};
pub use fetcher::{FetchError, FetchedBinary, RuntimeFetcher};
pub use locator::{BinaryLocator, CandidateProbe, LocateResult, SearchRoot};
pub use orchestrator::{
    AcquisitionError, AcquisitionReport, AcquisitionState, AcquisitionStrategy, AttemptOutcome,
    ExtractionAttempt, Orchestrator, StrategyKind,
};
pub use platform::Platform;
pub use process::{ProcessOutcome, ProcessRunner};
pub use request::{AcquisitionRequest, OutputFormat, QualityCeiling, RequestError};
pub use scratch::{CompletedDownload, DownloadStream, ScratchDir, ScratchError, ScratchManager};
