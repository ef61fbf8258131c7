//! Acquisition request types and validation.

use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Output container requested by the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Audio + video in an MP4 container.
    #[default]
    Mp4,
    /// Audio only, MP3.
    Mp3,
}

impl OutputFormat {
    /// File extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::Mp3 => "mp3",
        }
    }

    /// Whether the output carries no video track.
    pub fn is_audio_only(&self) -> bool {
        matches!(self, Self::Mp3)
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Maximum vertical resolution for video output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QualityCeiling {
    /// No height bound.
    #[default]
    #[serde(rename = "auto")]
    Auto,
    #[serde(rename = "1080p")]
    P1080,
    #[serde(rename = "720p")]
    P720,
    #[serde(rename = "480p")]
    P480,
}

impl QualityCeiling {
    /// Height bound in pixels, `None` for `Auto`.
    pub fn max_height(&self) -> Option<u32> {
        match self {
            Self::Auto => None,
            Self::P1080 => Some(1080),
            Self::P720 => Some(720),
            Self::P480 => Some(480),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::P1080 => "1080p",
            Self::P720 => "720p",
            Self::P480 => "480p",
        }
    }
}

impl fmt::Display for QualityCeiling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reasons a request is rejected before any work starts.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("Missing 'url'")]
    MissingUrl,

    #[error("Invalid 'url': {0}")]
    MalformedUrl(String),

    #[error("Unsupported url scheme '{0}', expected http or https")]
    UnsupportedScheme(String),
}

/// A validated acquisition request. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquisitionRequest {
    source_url: Url,
    output_format: OutputFormat,
    quality: QualityCeiling,
}

impl AcquisitionRequest {
    /// Validates the source URL and builds a request.
    ///
    /// The URL is trimmed, must parse, must be http(s) and must carry a host.
    pub fn new(
        source_url: &str,
        output_format: OutputFormat,
        quality: QualityCeiling,
    ) -> Result<Self, RequestError> {
        let trimmed = source_url.trim();
        if trimmed.is_empty() {
            return Err(RequestError::MissingUrl);
        }

        let url = Url::parse(trimmed).map_err(|e| RequestError::MalformedUrl(e.to_string()))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(RequestError::UnsupportedScheme(url.scheme().to_string()));
        }

        if url.host_str().map(str::is_empty).unwrap_or(true) {
            return Err(RequestError::MalformedUrl("url has no host".to_string()));
        }

        Ok(Self {
            source_url: url,
            output_format,
            quality,
        })
    }

    pub fn source_url(&self) -> &Url {
        &self.source_url
    }

    pub fn output_format(&self) -> OutputFormat {
        self.output_format
    }

    pub fn quality(&self) -> QualityCeiling {
        self.quality
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_request() {
        let req = AcquisitionRequest::new(
            "  https://example.com/watch?v=abc  ",
            OutputFormat::Mp4,
            QualityCeiling::P720,
        )
        .unwrap();
        assert_eq!(req.source_url().as_str(), "https://example.com/watch?v=abc");
        assert_eq!(req.quality().max_height(), Some(720));
    }

    #[test]
    fn test_request_is_plain_value() {
        let req =
            AcquisitionRequest::new("https://youtu.be/abc", OutputFormat::Mp3, QualityCeiling::Auto)
                .unwrap();
        let copy = req.clone();
        assert_eq!(copy, req);
        assert!(format!("{:?}", copy).contains("youtu.be"));
    }

    #[test]
    fn test_empty_url_rejected() {
        let err = AcquisitionRequest::new("", OutputFormat::Mp4, QualityCeiling::Auto).unwrap_err();
        assert_eq!(err, RequestError::MissingUrl);

        let err =
            AcquisitionRequest::new("   ", OutputFormat::Mp3, QualityCeiling::Auto).unwrap_err();
        assert_eq!(err, RequestError::MissingUrl);
    }

    #[test]
    fn test_malformed_url_rejected() {
        let err = AcquisitionRequest::new("not a url", OutputFormat::Mp4, QualityCeiling::Auto)
            .unwrap_err();
        assert!(matches!(err, RequestError::MalformedUrl(_)));
    }

    #[test]
    fn test_non_http_scheme_rejected() {
        let err = AcquisitionRequest::new(
            "file:///etc/passwd",
            OutputFormat::Mp4,
            QualityCeiling::Auto,
        )
        .unwrap_err();
        assert_eq!(err, RequestError::UnsupportedScheme("file".to_string()));
    }

    #[test]
    fn test_format_and_quality_serde_names() {
        let format: OutputFormat = serde_json::from_str("\"mp3\"").unwrap();
        assert_eq!(format, OutputFormat::Mp3);
        assert!(format.is_audio_only());

        let quality: QualityCeiling = serde_json::from_str("\"1080p\"").unwrap();
        assert_eq!(quality, QualityCeiling::P1080);
        assert_eq!(QualityCeiling::Auto.max_height(), None);
        assert!(serde_json::from_str::<QualityCeiling>("\"4k\"").is_err());
    }
}
