//! Source stream descriptors.

use serde::Serialize;

/// One downloadable rendition of a media source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceStream {
    pub url: String,
    /// `mp4`, `m4a`, `webm`, ...
    pub container: String,
    /// Codec list as advertised, e.g. `avc1.640028` or `mp4a.40.2`.
    pub codecs: String,
    pub has_video: bool,
    pub has_audio: bool,
    pub height: Option<u32>,
    /// Bits per second.
    pub bitrate: Option<u64>,
    pub content_length: Option<u64>,
}

impl SourceStream {
    pub fn is_video_only(&self) -> bool {
        self.has_video && !self.has_audio
    }

    pub fn is_audio_only(&self) -> bool {
        self.has_audio && !self.has_video
    }

    pub fn is_mp4_video(&self) -> bool {
        self.container == "mp4"
    }

    /// H.264, playable nearly everywhere.
    pub fn is_avc1(&self) -> bool {
        self.codecs.starts_with("avc1")
    }

    /// Audio that muxes into mp4 without a container change.
    pub fn is_mp4_audio(&self) -> bool {
        self.container == "m4a" || self.container == "mp4"
    }

    pub fn fits_height(&self, max_height: Option<u32>) -> bool {
        match max_height {
            None => true,
            Some(max) => self.height.map(|h| h <= max).unwrap_or(false),
        }
    }

    /// Parses a `type/subtype; codecs="..."` MIME string into
    /// `(container, codecs, has_video, has_audio)`.
    pub fn describe_mime(mime: &str) -> Option<(String, String, bool, bool)> {
        let (essence, params) = match mime.split_once(';') {
            Some((e, p)) => (e.trim(), p.trim()),
            None => (mime.trim(), ""),
        };
        let (kind, subtype) = essence.split_once('/')?;

        let codecs = params
            .strip_prefix("codecs=")
            .map(|c| c.trim_matches('"').trim().to_string())
            .unwrap_or_default();
        let codec_count = codecs.split(',').filter(|c| !c.trim().is_empty()).count();

        let (container, has_video, has_audio) = match kind {
            "video" => (subtype.to_string(), true, codec_count > 1),
            "audio" if subtype == "mp4" => ("m4a".to_string(), false, true),
            "audio" => (subtype.to_string(), false, true),
            _ => return None,
        };
        Some((container, codecs, has_video, has_audio))
    }
}
