//! In-process fallback extractor.
//!
//! Last resort when no external binary can be used: streams are resolved
//! through a [`MediaSource`] and turned into the requested container by a
//! [`Transcoder`]. Its failure is terminal for the request.

mod error;
mod select;
mod source;
mod transcoder;
mod types;

pub use error::FallbackError;
pub use select::{select_audio, select_video};
pub use source::{video_id, InnertubeResolver, MediaSource};
pub use transcoder::{FfmpegTranscoder, Transcoder, MUX_AUDIO_BITRATE_KBPS};
pub use types::SourceStream;

use futures::StreamExt;
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::process::ByteStream;
use crate::request::{AcquisitionRequest, OutputFormat};

const VIDEO_STAGING: &str = "video.stage";
const AUDIO_STAGING: &str = "audio.stage";

/// Extracts media without any external extraction binary.
#[derive(Clone)]
pub struct InProcessExtractor {
    source: Arc<dyn MediaSource>,
    transcoder: Arc<dyn Transcoder>,
    audio_bitrate_kbps: u32,
}

impl InProcessExtractor {
    pub fn new(
        source: Arc<dyn MediaSource>,
        transcoder: Arc<dyn Transcoder>,
        audio_bitrate_kbps: u32,
    ) -> Self {
        Self {
            source,
            transcoder,
            audio_bitrate_kbps,
        }
    }

    /// Innertube resolver plus ffmpeg, configured from `config`.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            Arc::new(InnertubeResolver::new(&config.fallback)),
            Arc::new(FfmpegTranscoder::from_config(&config.transcoder)),
            config.fallback.audio_bitrate_kbps,
        )
    }

    /// Writes the requested rendition of `request` to `output`.
    pub async fn extract(
        &self,
        request: &AcquisitionRequest,
        output: &Path,
    ) -> Result<(), FallbackError> {
        let streams = self.source.streams(request.source_url()).await?;
        info!(
            source = self.source.name(),
            streams = streams.len(),
            format = %request.output_format(),
            "In-process extraction started"
        );

        match request.output_format() {
            OutputFormat::Mp3 => self.extract_audio(&streams, output).await?,
            OutputFormat::Mp4 => {
                self.extract_video(&streams, request.quality().max_height(), output)
                    .await?
            }
        }

        match tokio::fs::metadata(output).await {
            Ok(meta) if meta.len() > 0 => Ok(()),
            _ => Err(FallbackError::EmptyOutput),
        }
    }

    async fn extract_audio(
        &self,
        streams: &[SourceStream],
        output: &Path,
    ) -> Result<(), FallbackError> {
        let audio = select_audio(streams, OutputFormat::Mp3)
            .ok_or(FallbackError::NoMatchingStream { kind: "audio" })?;
        debug!(container = %audio.container, bitrate = ?audio.bitrate, "Selected audio stream");

        let input = self.source.open(audio).await?;
        self.transcoder
            .encode_audio(input, output, self.audio_bitrate_kbps)
            .await
    }

    async fn extract_video(
        &self,
        streams: &[SourceStream],
        max_height: Option<u32>,
        output: &Path,
    ) -> Result<(), FallbackError> {
        let video = select_video(streams, max_height)
            .ok_or(FallbackError::NoMatchingStream { kind: "video" })?;
        let audio = select_audio(streams, OutputFormat::Mp4)
            .ok_or(FallbackError::NoMatchingStream { kind: "audio" })?;
        debug!(
            height = ?video.height,
            codecs = %video.codecs,
            audio = %audio.container,
            "Selected streams for muxing"
        );

        let staging = output.parent().map(Path::to_path_buf).unwrap_or_default();
        let video_path = staging.join(VIDEO_STAGING);
        let audio_path = staging.join(AUDIO_STAGING);

        let result = self
            .download_and_mux(video, audio, &video_path, &audio_path, output)
            .await;

        for path in [&video_path, &audio_path] {
            remove_staging(path).await;
        }
        result
    }

    async fn download_and_mux(
        &self,
        video: &SourceStream,
        audio: &SourceStream,
        video_path: &Path,
        audio_path: &Path,
        output: &Path,
    ) -> Result<(), FallbackError> {
        let (video_bytes, audio_bytes) = tokio::try_join!(
            async {
                let stream = self.source.open(video).await?;
                write_stream(stream, video_path).await
            },
            async {
                let stream = self.source.open(audio).await?;
                write_stream(stream, audio_path).await
            },
        )?;
        debug!(video_bytes, audio_bytes, "Source streams staged");

        self.transcoder.mux(video_path, audio_path, output).await
    }
}

/// Drains `stream` into a new file at `path`, returning the byte count.
async fn write_stream(mut stream: ByteStream, path: &Path) -> Result<u64, FallbackError> {
    let mut file = tokio::fs::File::create(path).await?;
    let mut written = 0u64;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| FallbackError::stream(e.to_string()))?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;
    if written == 0 {
        return Err(FallbackError::stream(format!(
            "source stream for {} was empty",
            path.display()
        )));
    }
    Ok(written)
}

async fn remove_staging(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "Failed to remove staging file");
        }
    }
}
