//! Stream selection by codec, container and resolution predicates.
//!
//! Mirrors the alternatives handed to the external tool so both paths pick
//! comparable renditions.

use std::cmp::Reverse;

use super::types::SourceStream;
use crate::request::OutputFormat;

/// Tier of a video-only stream; lower is better.
fn video_tier(stream: &SourceStream, max_height: Option<u32>) -> u8 {
    let fits = stream.fits_height(max_height);
    if fits && stream.is_mp4_video() && stream.is_avc1() {
        0
    } else if fits {
        1
    } else if stream.is_mp4_video() {
        2
    } else {
        3
    }
}

/// Best video-only stream: lowest tier, then tallest, then highest bitrate.
pub fn select_video(streams: &[SourceStream], max_height: Option<u32>) -> Option<&SourceStream> {
    streams
        .iter()
        .filter(|s| s.is_video_only())
        .min_by_key(|s| {
            (
                video_tier(s, max_height),
                Reverse(s.height.unwrap_or(0)),
                Reverse(s.bitrate.unwrap_or(0)),
            )
        })
}

/// Best audio-only stream for `format`.
///
/// mp4 output prefers m4a/mp4 audio so the mux needs no container change;
/// otherwise the highest bitrate wins.
pub fn select_audio(streams: &[SourceStream], format: OutputFormat) -> Option<&SourceStream> {
    let prefer_mp4 = format == OutputFormat::Mp4;
    streams
        .iter()
        .filter(|s| s.is_audio_only())
        .min_by_key(|s| {
            (
                prefer_mp4 && !s.is_mp4_audio(),
                Reverse(s.bitrate.unwrap_or(0)),
            )
        })
}
