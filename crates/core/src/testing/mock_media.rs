//! Mock media source and transcoder for testing.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::Url;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::fallback::{FallbackError, MediaSource, SourceStream, Transcoder};
use crate::process::ByteStream;

/// Mock implementation of the MediaSource trait.
///
/// Streams are fixed at construction. Opening a stream yields its configured
/// payload, or `payload:<url>` when none was set.
#[derive(Debug, Default)]
pub struct MockMediaSource {
    streams: Vec<SourceStream>,
    payloads: Mutex<HashMap<String, Vec<u8>>>,
    failure: Option<String>,
    opened: Mutex<Vec<String>>,
}

impl MockMediaSource {
    pub fn new(streams: Vec<SourceStream>) -> Self {
        Self {
            streams,
            ..Default::default()
        }
    }

    /// 1080p/720p H.264, 480p VP9, m4a and webm audio.
    pub fn with_default_streams() -> Self {
        Self::new(vec![
            video_stream("mp4", "avc1.640028", 1080, 3_000_000),
            video_stream("mp4", "avc1.4d401f", 720, 1_500_000),
            video_stream("webm", "vp9", 480, 700_000),
            audio_stream("m4a", "mp4a.40.2", 128_000),
            audio_stream("webm", "opus", 160_000),
        ])
    }

    /// Fails metadata resolution with `reason`.
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            failure: Some(reason.into()),
            ..Default::default()
        }
    }

    pub fn set_payload(&self, url: &str, payload: Vec<u8>) {
        self.payloads.lock().unwrap().insert(url.to_string(), payload);
    }

    /// URLs passed to `open`, in call order.
    pub fn opened_urls(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }
}

fn video_stream(container: &str, codecs: &str, height: u32, bitrate: u64) -> SourceStream {
    SourceStream {
        url: format!("https://cdn.example/video-{}", height),
        container: container.to_string(),
        codecs: codecs.to_string(),
        has_video: true,
        has_audio: false,
        height: Some(height),
        bitrate: Some(bitrate),
        content_length: None,
    }
}

fn audio_stream(container: &str, codecs: &str, bitrate: u64) -> SourceStream {
    SourceStream {
        url: format!("https://cdn.example/audio-{}", container),
        container: container.to_string(),
        codecs: codecs.to_string(),
        has_video: false,
        has_audio: true,
        height: None,
        bitrate: Some(bitrate),
        content_length: None,
    }
}

#[async_trait]
impl MediaSource for MockMediaSource {
    fn name(&self) -> &str {
        "mock"
    }

    async fn streams(&self, _url: &Url) -> Result<Vec<SourceStream>, FallbackError> {
        match &self.failure {
            Some(reason) => Err(FallbackError::metadata(reason.clone())),
            None => Ok(self.streams.clone()),
        }
    }

    async fn open(&self, stream: &SourceStream) -> Result<ByteStream, FallbackError> {
        self.opened.lock().unwrap().push(stream.url.clone());
        let payload = self
            .payloads
            .lock()
            .unwrap()
            .get(&stream.url)
            .cloned()
            .unwrap_or_else(|| format!("payload:{}", stream.url).into_bytes());

        // two chunks, so consumers see a real stream
        let mid = payload.len() / 2;
        let chunks = vec![Ok(payload[..mid].to_vec()), Ok(payload[mid..].to_vec())];
        Ok(stream::iter(chunks).boxed())
    }
}

/// Mock implementation of the Transcoder trait.
///
/// `encode_audio` writes `MP3@<bitrate>:` followed by the input bytes;
/// `mux` writes `MUX:<video bytes>|<audio bytes>`.
#[derive(Debug, Default)]
pub struct MockTranscoder {
    failure: Option<String>,
    encode_calls: AtomicUsize,
    mux_calls: AtomicUsize,
}

impl MockTranscoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call fails with `reason`, writing nothing.
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            failure: Some(reason.into()),
            ..Default::default()
        }
    }

    pub fn encode_calls(&self) -> usize {
        self.encode_calls.load(Ordering::SeqCst)
    }

    pub fn mux_calls(&self) -> usize {
        self.mux_calls.load(Ordering::SeqCst)
    }

    fn check_failure(&self) -> Result<(), FallbackError> {
        match &self.failure {
            Some(reason) => Err(FallbackError::Transcode {
                reason: reason.clone(),
                exit_code: Some(1),
            }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Transcoder for MockTranscoder {
    fn name(&self) -> &str {
        "mock"
    }

    async fn encode_audio(
        &self,
        mut input: ByteStream,
        output: &Path,
        bitrate_kbps: u32,
    ) -> Result<(), FallbackError> {
        self.encode_calls.fetch_add(1, Ordering::SeqCst);
        self.check_failure()?;

        let mut data = format!("MP3@{}:", bitrate_kbps).into_bytes();
        while let Some(chunk) = input.next().await {
            data.extend(chunk.map_err(|e| FallbackError::stream(e.to_string()))?);
        }
        tokio::fs::write(output, data).await?;
        Ok(())
    }

    async fn mux(&self, video: &Path, audio: &Path, output: &Path) -> Result<(), FallbackError> {
        self.mux_calls.fetch_add(1, Ordering::SeqCst);
        self.check_failure()?;

        let mut data = b"MUX:".to_vec();
        data.extend(tokio::fs::read(video).await?);
        data.push(b'|');
        data.extend(tokio::fs::read(audio).await?);
        tokio::fs::write(output, data).await?;
        Ok(())
    }
}
