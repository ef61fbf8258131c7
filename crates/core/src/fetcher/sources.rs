//! Remote sources for prebuilt extraction binaries.

use serde::Serialize;

use crate::config::FetcherConfig;
use crate::platform::{Arch, Os, Platform};

/// Release tried first; known to work with the argument set we build.
pub const PINNED_RELEASE: &str = "2025.06.30";

const RELEASE_BASE: &str = "https://github.com/yt-dlp/yt-dlp/releases";
const NIGHTLY_BASE: &str = "https://github.com/yt-dlp/yt-dlp-nightly-builds/releases";

/// One downloadable binary, optionally pinned to a SHA-256 digest (hex).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchSource {
    pub url: String,
    pub sha256: Option<String>,
}

impl FetchSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            sha256: None,
        }
    }

    pub fn with_sha256(mut self, digest: impl Into<String>) -> Self {
        self.sha256 = Some(digest.into().to_ascii_lowercase());
        self
    }
}

/// Release asset name for a platform, if upstream publishes one.
pub fn asset_name(platform: Platform) -> Option<&'static str> {
    match (platform.os, platform.arch) {
        (Os::Linux, Arch::X86_64) => Some("yt-dlp_linux"),
        (Os::Linux, Arch::Aarch64) => Some("yt-dlp_linux_aarch64"),
        (Os::MacOs, _) => Some("yt-dlp_macos"),
        (Os::Windows, _) => Some("yt-dlp.exe"),
        _ => None,
    }
}

/// Pinned release, then latest, then nightly.
pub fn default_sources(platform: Platform) -> Vec<FetchSource> {
    let Some(asset) = asset_name(platform) else {
        return Vec::new();
    };
    vec![
        FetchSource::new(format!("{RELEASE_BASE}/download/{PINNED_RELEASE}/{asset}")),
        FetchSource::new(format!("{RELEASE_BASE}/latest/download/{asset}")),
        FetchSource::new(format!("{NIGHTLY_BASE}/latest/download/{asset}")),
    ]
}

/// Configured sources replace the defaults entirely.
pub fn sources_from_config(config: &FetcherConfig, platform: Platform) -> Vec<FetchSource> {
    if config.sources.is_empty() {
        return default_sources(platform);
    }
    config
        .sources
        .iter()
        .map(|s| {
            let source = FetchSource::new(s.url.clone());
            match &s.sha256 {
                Some(digest) => source.with_sha256(digest.clone()),
                None => source,
            }
        })
        .collect()
}
