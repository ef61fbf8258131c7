//! Media metadata resolution and stream opening.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use once_cell::sync::Lazy;
use regex_lite::Regex;
use reqwest::header::{CONTENT_TYPE, RANGE, USER_AGENT};
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use serde_json::json;
use std::io;
use std::time::Duration;
use tracing::{debug, warn};

use super::error::FallbackError;
use super::types::SourceStream;
use crate::config::FallbackConfig;
use crate::process::ByteStream;

/// Resolves a page URL into downloadable streams.
#[async_trait]
pub trait MediaSource: Send + Sync {
    fn name(&self) -> &str;

    /// Every rendition the source advertises for `url`.
    async fn streams(&self, url: &Url) -> Result<Vec<SourceStream>, FallbackError>;

    /// Opens `stream` for sequential reading.
    async fn open(&self, stream: &SourceStream) -> Result<ByteStream, FallbackError>;
}

const PLAYER_ENDPOINT: &str = "https://www.youtube.com/youtubei/v1/player";

/// Size of each ranged GET. Large single requests get throttled.
const RANGE_CHUNK: u64 = 10 * 1024 * 1024;

static VIDEO_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]{11}$").expect("static regex"));

/// Extracts the 11-character video id from the usual YouTube URL shapes.
pub fn video_id(url: &Url) -> Option<String> {
    let host = url.host_str()?.trim_start_matches("www.").trim_start_matches("m.");
    let segments: Vec<&str> = url.path_segments().map(|s| s.collect()).unwrap_or_default();

    let candidate = match host {
        "youtu.be" => segments.first().map(|s| s.to_string()),
        "youtube.com" | "music.youtube.com" | "youtube-nocookie.com" => {
            match segments.as_slice() {
                ["watch", ..] => url
                    .query_pairs()
                    .find(|(k, _)| k == "v")
                    .map(|(_, v)| v.to_string()),
                ["shorts" | "embed" | "live" | "v", id, ..] => Some(id.to_string()),
                _ => None,
            }
        }
        _ => None,
    }?;

    VIDEO_ID.is_match(&candidate).then_some(candidate)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlayerResponse {
    playability_status: Option<PlayabilityStatus>,
    streaming_data: Option<StreamingData>,
}

#[derive(Debug, Deserialize)]
struct PlayabilityStatus {
    status: String,
    reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StreamingData {
    #[serde(default)]
    formats: Vec<RawFormat>,
    #[serde(default)]
    adaptive_formats: Vec<RawFormat>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFormat {
    /// Absent when the format is signature-protected.
    url: Option<String>,
    mime_type: String,
    bitrate: Option<u64>,
    height: Option<u32>,
    content_length: Option<String>,
}

impl RawFormat {
    fn into_stream(self) -> Option<SourceStream> {
        let url = self.url?;
        let (container, codecs, has_video, has_audio) =
            SourceStream::describe_mime(&self.mime_type)?;
        Some(SourceStream {
            url,
            container,
            codecs,
            has_video,
            has_audio,
            height: if has_video { self.height } else { None },
            bitrate: self.bitrate,
            content_length: self.content_length.and_then(|l| l.parse().ok()),
        })
    }
}

/// Resolves YouTube URLs through the innertube player endpoint.
pub struct InnertubeResolver {
    client: Client,
    endpoint: String,
    client_name: String,
    client_version: String,
    user_agent: String,
}

impl InnertubeResolver {
    pub fn new(config: &FallbackConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Failed to configure HTTP client, using defaults");
                Client::new()
            });

        Self {
            client,
            endpoint: PLAYER_ENDPOINT.to_string(),
            client_name: config.client_name.clone(),
            client_version: config.client_version.clone(),
            user_agent: config.user_agent.clone(),
        }
    }

    /// Points metadata requests at another player endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn player_request(&self, video_id: &str) -> serde_json::Value {
        json!({
            "context": {
                "client": {
                    "clientName": self.client_name,
                    "clientVersion": self.client_version,
                    "hl": "en",
                    "gl": "US",
                }
            },
            "videoId": video_id,
            "contentCheckOk": true,
            "racyCheckOk": true,
        })
    }
}

#[async_trait]
impl MediaSource for InnertubeResolver {
    fn name(&self) -> &str {
        "innertube"
    }

    async fn streams(&self, url: &Url) -> Result<Vec<SourceStream>, FallbackError> {
        let id = video_id(url).ok_or_else(|| FallbackError::UnsupportedSource {
            url: url.to_string(),
        })?;
        debug!(video_id = %id, client = %self.client_name, "Resolving player metadata");

        let response = self
            .client
            .post(&self.endpoint)
            .header(USER_AGENT, &self.user_agent)
            .header(CONTENT_TYPE, "application/json")
            .json(&self.player_request(&id))
            .send()
            .await
            .map_err(|e| FallbackError::metadata(e.to_string()))?;

        if !response.status().is_success() {
            return Err(FallbackError::metadata(format!(
                "player endpoint returned HTTP {}",
                response.status().as_u16()
            )));
        }

        let player: PlayerResponse = response
            .json()
            .await
            .map_err(|e| FallbackError::metadata(format!("unreadable player response: {}", e)))?;

        if let Some(status) = &player.playability_status {
            if status.status != "OK" {
                return Err(FallbackError::metadata(format!(
                    "video not playable ({}): {}",
                    status.status,
                    status.reason.as_deref().unwrap_or("no reason given")
                )));
            }
        }

        let data = player.streaming_data.unwrap_or_default();
        let streams: Vec<SourceStream> = data
            .formats
            .into_iter()
            .chain(data.adaptive_formats)
            .filter_map(RawFormat::into_stream)
            .collect();

        if streams.is_empty() {
            return Err(FallbackError::metadata("no directly downloadable streams"));
        }
        debug!(count = streams.len(), "Resolved source streams");
        Ok(streams)
    }

    async fn open(&self, stream: &SourceStream) -> Result<ByteStream, FallbackError> {
        let cursor = RangeCursor {
            client: self.client.clone(),
            url: stream.url.clone(),
            user_agent: self.user_agent.clone(),
            offset: 0,
            total: stream.content_length,
            done: false,
        };
        Ok(ranged_stream(cursor))
    }
}

struct RangeCursor {
    client: Client,
    url: String,
    user_agent: String,
    offset: u64,
    total: Option<u64>,
    done: bool,
}

/// Sequential `Range` requests of [`RANGE_CHUNK`] bytes until the body ends.
fn ranged_stream(cursor: RangeCursor) -> ByteStream {
    stream::try_unfold(cursor, |mut c| async move {
        if c.done || c.total.map(|t| c.offset >= t).unwrap_or(false) {
            return Ok(None);
        }

        let end = c.offset + RANGE_CHUNK - 1;
        let response = c
            .client
            .get(&c.url)
            .header(USER_AGENT, &c.user_agent)
            .header(RANGE, format!("bytes={}-{}", c.offset, end))
            .send()
            .await
            .map_err(io::Error::other)?;

        match response.status() {
            StatusCode::PARTIAL_CONTENT => {}
            // range ignored: the whole body follows
            StatusCode::OK if c.offset == 0 => c.done = true,
            StatusCode::RANGE_NOT_SATISFIABLE => return Ok(None),
            status => {
                return Err(io::Error::other(format!(
                    "stream request returned HTTP {}",
                    status.as_u16()
                )))
            }
        }

        let bytes = response.bytes().await.map_err(io::Error::other)?;
        if bytes.is_empty() {
            return Ok(None);
        }
        c.offset += bytes.len() as u64;
        if (bytes.len() as u64) < RANGE_CHUNK {
            c.done = true;
        }
        Ok(Some((bytes.to_vec(), c)))
    })
    .boxed()
}
