//! Audio encoding and stream muxing.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::error::FallbackError;
use crate::config::TranscoderConfig;
use crate::process::{ByteStream, ProcessOutcome, ProcessRunner};

/// Bitrate of the AAC track written when muxing.
pub const MUX_AUDIO_BITRATE_KBPS: u32 = 192;

/// Turns source streams into the requested output container.
#[async_trait]
pub trait Transcoder: Send + Sync {
    fn name(&self) -> &str;

    /// Re-encodes `input` to MP3 at `bitrate_kbps`, writing `output`.
    async fn encode_audio(
        &self,
        input: ByteStream,
        output: &Path,
        bitrate_kbps: u32,
    ) -> Result<(), FallbackError>;

    /// Copies the video track, re-encodes audio to AAC, writes a faststart MP4.
    async fn mux(&self, video: &Path, audio: &Path, output: &Path) -> Result<(), FallbackError>;
}

/// [`Transcoder`] backed by the ffmpeg binary.
pub struct FfmpegTranscoder {
    binary: PathBuf,
    log_level: String,
    runner: ProcessRunner,
}

impl FfmpegTranscoder {
    pub fn new(binary: PathBuf, log_level: impl Into<String>, timeout: Duration) -> Self {
        Self {
            binary,
            log_level: log_level.into(),
            runner: ProcessRunner::new(timeout),
        }
    }

    pub fn from_config(config: &TranscoderConfig) -> Self {
        Self::new(
            config.ffmpeg_binary(),
            config.log_level.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    fn base_args(&self) -> Vec<String> {
        vec![
            "-y".to_string(),
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            self.log_level.clone(),
        ]
    }

    fn encode_audio_args(&self, output: &Path, bitrate_kbps: u32) -> Vec<String> {
        let mut args = self.base_args();
        args.extend([
            "-i".to_string(),
            "pipe:0".to_string(),
            "-vn".to_string(),
            "-c:a".to_string(),
            "libmp3lame".to_string(),
            "-b:a".to_string(),
            format!("{}k", bitrate_kbps),
            "-f".to_string(),
            "mp3".to_string(),
            output.to_string_lossy().to_string(),
        ]);
        args
    }

    fn mux_args(&self, video: &Path, audio: &Path, output: &Path) -> Vec<String> {
        let mut args = self.base_args();
        args.extend([
            "-i".to_string(),
            video.to_string_lossy().to_string(),
            "-i".to_string(),
            audio.to_string_lossy().to_string(),
            "-map".to_string(),
            "0:v:0".to_string(),
            "-map".to_string(),
            "1:a:0".to_string(),
            "-c:v".to_string(),
            "copy".to_string(),
            "-c:a".to_string(),
            "aac".to_string(),
            "-b:a".to_string(),
            format!("{}k", MUX_AUDIO_BITRATE_KBPS),
            "-movflags".to_string(),
            "+faststart".to_string(),
            "-f".to_string(),
            "mp4".to_string(),
            output.to_string_lossy().to_string(),
        ]);
        args
    }
}

fn check_outcome(outcome: ProcessOutcome) -> Result<(), FallbackError> {
    if outcome.timed_out {
        return Err(FallbackError::TranscodeTimeout {
            elapsed_secs: outcome.elapsed.as_secs(),
        });
    }
    if !outcome.success() {
        let reason = if outcome.stderr.is_empty() {
            format!("ffmpeg exited with code {}", outcome.exit_code)
        } else {
            outcome.stderr
        };
        return Err(FallbackError::Transcode {
            reason,
            exit_code: Some(outcome.exit_code),
        });
    }
    Ok(())
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn encode_audio(
        &self,
        input: ByteStream,
        output: &Path,
        bitrate_kbps: u32,
    ) -> Result<(), FallbackError> {
        let args = self.encode_audio_args(output, bitrate_kbps);
        tracing::debug!(args = ?args, "Encoding audio");
        check_outcome(self.runner.run_with_input(&self.binary, &args, input).await)
    }

    async fn mux(&self, video: &Path, audio: &Path, output: &Path) -> Result<(), FallbackError> {
        let args = self.mux_args(video, audio, output);
        tracing::debug!(args = ?args, "Muxing streams");
        check_outcome(self.runner.run(&self.binary, &args).await)
    }
}
