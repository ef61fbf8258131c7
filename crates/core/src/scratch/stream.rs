//! Streaming a completed output file back to the caller.

use futures::stream::BoxStream;
use futures::StreamExt;
use std::io;
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncReadExt;

use super::ScratchDir;
use crate::metrics;

/// Content type of every download response.
pub const CONTENT_TYPE: &str = "application/octet-stream";

/// Read size per emitted chunk.
const CHUNK_SIZE: usize = 64 * 1024;

/// Sequential chunks of the output file.
///
/// The stream owns the scratch directory: dropping it, whether after the last
/// chunk, on a read error or because the consumer went away, removes the
/// directory.
pub type DownloadStream = BoxStream<'static, io::Result<Vec<u8>>>;

/// A successfully produced output file, still owned by its scratch directory.
#[derive(Debug)]
pub struct CompletedDownload {
    scratch: ScratchDir,
    size: u64,
    download_name: String,
}

impl CompletedDownload {
    pub(crate) fn new(scratch: ScratchDir, size: u64, download_name: String) -> Self {
        Self {
            scratch,
            size,
            download_name,
        }
    }

    pub fn path(&self) -> &Path {
        self.scratch.output_path()
    }

    pub fn scratch_path(&self) -> &Path {
        self.scratch.path()
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn download_name(&self) -> &str {
        &self.download_name
    }

    /// `content-disposition` header value for this download.
    pub fn content_disposition(&self) -> String {
        content_disposition(&self.download_name)
    }

    /// Opens the file for sequential reading without buffering it in memory.
    ///
    /// If opening fails the scratch directory is released before returning.
    pub async fn into_stream(self) -> io::Result<DownloadStream> {
        let file = File::open(self.scratch.output_path()).await?;
        metrics::ACTIVE_STREAMS.inc();
        let state = StreamState {
            file,
            scratch: self.scratch,
            sent: 0,
            size: self.size,
        };

        Ok(futures::stream::unfold(Some(state), |state| async move {
            let mut state = state?;
            let mut buf = vec![0u8; CHUNK_SIZE];
            match state.file.read(&mut buf).await {
                Ok(0) => None,
                Ok(n) => {
                    buf.truncate(n);
                    state.sent += n as u64;
                    metrics::BYTES_STREAMED.inc_by(n as u64);
                    Some((Ok(buf), Some(state)))
                }
                Err(e) => Some((Err(e), None)),
            }
        })
        .boxed())
    }
}

/// Field order matters: the file handle closes before the directory is removed.
struct StreamState {
    file: File,
    scratch: ScratchDir,
    sent: u64,
    size: u64,
}

impl Drop for StreamState {
    fn drop(&mut self) {
        metrics::ACTIVE_STREAMS.dec();
        if self.sent < self.size {
            metrics::STREAMS_ABORTED.inc();
            tracing::info!(
                sent = self.sent,
                size = self.size,
                scratch = %self.scratch.path().display(),
                "Download stream closed before completion"
            );
        } else {
            tracing::debug!(size = self.size, "Download stream completed");
        }
    }
}

/// Strips characters that would break a quoted header parameter or a file path.
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| !c.is_control())
        .map(|c| match c {
            '"' | '\\' | '/' | ':' | '*' | '?' | '<' | '>' | '|' => '_',
            c => c,
        })
        .collect();
    let trimmed = cleaned.trim().trim_matches('.');
    if trimmed.is_empty() {
        "download".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Builds an `attachment` disposition with an ASCII fallback and an RFC 5987 name.
pub fn content_disposition(name: &str) -> String {
    let sanitized = sanitize_filename(name);
    let ascii: String = sanitized
        .chars()
        .map(|c| if c.is_ascii() { c } else { '_' })
        .collect();
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        ascii,
        urlencoding::encode(&sanitized)
    )
}
