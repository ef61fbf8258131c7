//! Runtime fetcher.
//!
//! Downloads a prebuilt extraction binary when none is bundled. Sources are
//! tried in order; a candidate counts only once it answers `--version`.
//! Every failure is returned as a [`FetchError`] so the caller can move on to
//! the next strategy.

mod error;
mod sources;

pub use error::FetchError;
pub use sources::{
    asset_name, default_sources, sources_from_config, FetchSource, PINNED_RELEASE,
};

use futures::StreamExt;
use reqwest::Client;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::config::FetcherConfig;
use crate::platform::Platform;
use crate::process::ProcessRunner;
use crate::scratch::{ScratchDir, ScratchManager, FETCH_PREFIX};

/// A verified binary, removed from disk when dropped.
#[derive(Debug)]
pub struct FetchedBinary {
    scratch: ScratchDir,
    source_url: String,
}

impl FetchedBinary {
    pub fn path(&self) -> &Path {
        self.scratch.output_path()
    }

    pub fn source_url(&self) -> &str {
        &self.source_url
    }
}

/// Fetches a binary for one platform from an ordered list of sources.
pub struct RuntimeFetcher {
    client: Client,
    sources: Vec<FetchSource>,
    platform: Platform,
    scratch: ScratchManager,
    self_check: ProcessRunner,
}

impl RuntimeFetcher {
    pub fn new(
        sources: Vec<FetchSource>,
        platform: Platform,
        scratch: ScratchManager,
        download_timeout: Duration,
        self_check_timeout: Duration,
    ) -> Self {
        let client = Client::builder()
            .timeout(download_timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Failed to configure HTTP client, using defaults");
                Client::new()
            });

        Self {
            client,
            sources,
            platform,
            scratch,
            self_check: ProcessRunner::new(self_check_timeout),
        }
    }

    /// Builds a fetcher for the current platform.
    pub fn from_config(config: &FetcherConfig, scratch: ScratchManager) -> Self {
        let platform = Platform::current();
        Self::new(
            sources_from_config(config, platform),
            platform,
            scratch,
            Duration::from_secs(config.timeout_secs),
            Duration::from_secs(config.self_check_timeout_secs),
        )
    }

    /// Returns the first source whose binary passes the self-check.
    ///
    /// On exhaustion the last encountered error is returned.
    pub async fn fetch_binary(&self) -> Result<FetchedBinary, FetchError> {
        let mut last_error = FetchError::NoSources {
            platform: self.platform.to_string(),
        };

        for source in &self.sources {
            match self.try_source(source).await {
                Ok(binary) => {
                    info!(
                        url = %source.url,
                        path = %binary.path().display(),
                        "Fetched extraction binary"
                    );
                    return Ok(binary);
                }
                Err(e) => {
                    info!(url = %source.url, error = %e, "Fetch source failed, trying next");
                    last_error = e;
                }
            }
        }

        Err(last_error)
    }

    async fn try_source(&self, source: &FetchSource) -> Result<FetchedBinary, FetchError> {
        let scratch = self
            .scratch
            .allocate_with(FETCH_PREFIX, self.platform.fetched_binary_name())
            .await?;

        let digest = self.download(&source.url, scratch.output_path()).await?;

        if let Some(expected) = &source.sha256 {
            if !expected.eq_ignore_ascii_case(&digest) {
                return Err(FetchError::ChecksumMismatch {
                    url: source.url.clone(),
                    expected: expected.clone(),
                    actual: digest,
                });
            }
        }

        mark_executable(scratch.output_path())
            .await
            .map_err(|e| FetchError::io(&source.url, e))?;

        let outcome = self
            .self_check
            .run(scratch.output_path(), &["--version".to_string()])
            .await;
        if !outcome.success() {
            return Err(FetchError::SelfCheckFailed {
                url: source.url.clone(),
                exit_code: outcome.exit_code,
                diagnostic: outcome.stderr,
            });
        }

        Ok(FetchedBinary {
            scratch,
            source_url: source.url.clone(),
        })
    }

    /// Streams the payload to `dest`, returning its hex SHA-256.
    async fn download(&self, url: &str, dest: &Path) -> Result<String, FetchError> {
        debug!(url = %url, "Downloading extraction binary");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::network(url, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| FetchError::io(url, e))?;
        let mut hasher = Sha256::new();
        let mut written: u64 = 0;

        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| FetchError::network(url, e.to_string()))?;
            hasher.update(&chunk);
            file.write_all(&chunk)
                .await
                .map_err(|e| FetchError::io(url, e))?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(|e| FetchError::io(url, e))?;

        if written == 0 {
            return Err(FetchError::EmptyPayload {
                url: url.to_string(),
            });
        }

        debug!(url = %url, bytes = written, "Download complete");
        Ok(format!("{:x}", hasher.finalize()))
    }
}

#[cfg(unix)]
async fn mark_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).await
}

#[cfg(not(unix))]
async fn mark_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
