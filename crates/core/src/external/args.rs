//! Command-line construction for the extraction binary.

use std::path::{Path, PathBuf};

use crate::request::{AcquisitionRequest, OutputFormat};

/// Container every video alternative is normalized to.
const VIDEO_CONTAINER: &str = "mp4";

/// Audio container paired with mp4 video when streams are merged.
const AUDIO_CONTAINER: &str = "m4a";

/// Codec prefix accepted by practically every player (H.264).
const COMPATIBLE_VCODEC_PREFIX: &str = "avc1";

/// Builds the extraction binary's arguments. Pure and deterministic.
#[derive(Debug, Clone, Default)]
pub struct ArgumentBuilder {
    transcoder: Option<PathBuf>,
}

impl ArgumentBuilder {
    /// `transcoder` is passed explicitly instead of relying on `PATH`.
    pub fn new(transcoder: Option<PathBuf>) -> Self {
        Self { transcoder }
    }

    /// Arguments for fetching `request` into exactly `output_path`.
    pub fn build(&self, request: &AcquisitionRequest, output_path: &Path) -> Vec<String> {
        let mut args = vec![
            request.source_url().to_string(),
            "--no-playlist".to_string(),
            "--restrict-filenames".to_string(),
            "--no-part".to_string(),
            "-o".to_string(),
            output_path.to_string_lossy().to_string(),
        ];

        if let Some(transcoder) = &self.transcoder {
            args.extend([
                "--ffmpeg-location".to_string(),
                transcoder.to_string_lossy().to_string(),
            ]);
        }

        match request.output_format() {
            OutputFormat::Mp3 => {
                args.extend([
                    "-f".to_string(),
                    "bestaudio/bestaudio*".to_string(),
                    "-x".to_string(),
                    "--audio-format".to_string(),
                    "mp3".to_string(),
                    "--audio-quality".to_string(),
                    "0".to_string(),
                ]);
            }
            OutputFormat::Mp4 => {
                args.extend([
                    "-f".to_string(),
                    video_format_selector(request.quality().max_height()),
                    "--merge-output-format".to_string(),
                    VIDEO_CONTAINER.to_string(),
                    "--remux-video".to_string(),
                    VIDEO_CONTAINER.to_string(),
                ]);
            }
        }

        args
    }
}

/// Format-selection expression for audio+video output.
///
/// Alternatives, first non-empty match wins (resolved by the tool itself):
/// 1. height ≤ ceiling, mp4, H.264 (merged with m4a audio when video-only)
/// 2. height ≤ ceiling, any container
/// 3. mp4, any height
/// 4. anything
///
/// Without a ceiling alternative 2 would equal 4 and is omitted.
pub fn video_format_selector(max_height: Option<u32>) -> String {
    let height = max_height
        .map(|h| format!("[height<={}]", h))
        .unwrap_or_default();

    let mut alternatives = vec![format!(
        "bv*{height}[ext={VIDEO_CONTAINER}][vcodec^={COMPATIBLE_VCODEC_PREFIX}]+ba[ext={AUDIO_CONTAINER}]"
    )];
    if max_height.is_some() {
        alternatives.push(format!("b{height}"));
    }
    alternatives.push(format!("b[ext={VIDEO_CONTAINER}]"));
    alternatives.push("b".to_string());

    alternatives.join("/")
}
