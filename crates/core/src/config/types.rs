use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub acquisition: AcquisitionConfig,
    #[serde(default)]
    pub locator: LocatorConfig,
    #[serde(default)]
    pub fetcher: FetcherConfig,
    #[serde(default)]
    pub transcoder: TranscoderConfig,
    #[serde(default)]
    pub fallback: FallbackConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

/// Per-request acquisition settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AcquisitionConfig {
    /// Root under which per-request scratch directories are created.
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,
    /// Wall-clock limit for one run of the extraction binary.
    #[serde(default = "default_acquisition_timeout")]
    pub timeout_secs: u64,
    /// File name (without extension) offered to the caller.
    #[serde(default = "default_download_basename")]
    pub download_basename: String,
    /// Scratch directories older than this are swept at startup.
    #[serde(default = "default_stale_scratch_secs")]
    pub stale_scratch_secs: u64,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            scratch_dir: default_scratch_dir(),
            timeout_secs: default_acquisition_timeout(),
            download_basename: default_download_basename(),
            stale_scratch_secs: default_stale_scratch_secs(),
        }
    }
}

fn default_scratch_dir() -> PathBuf {
    std::env::temp_dir().join("clipfetch")
}

fn default_acquisition_timeout() -> u64 {
    240
}

fn default_download_basename() -> String {
    "clipfetch-download".to_string()
}

fn default_stale_scratch_secs() -> u64 {
    3600
}

/// Binary locator configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LocatorConfig {
    /// Searched after the built-in roots.
    #[serde(default)]
    pub extra_dirs: Vec<PathBuf>,
    /// Whether the built-in roots (cwd, /var/task, build dirs, exe dir) are searched.
    #[serde(default = "default_true")]
    pub include_default_roots: bool,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            extra_dirs: Vec::new(),
            include_default_roots: true,
        }
    }
}

/// Runtime fetcher configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FetcherConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Timeout for a single download in seconds.
    #[serde(default = "default_fetch_timeout")]
    pub timeout_secs: u64,
    /// Timeout for the `--version` self-check.
    #[serde(default = "default_self_check_timeout")]
    pub self_check_timeout_secs: u64,
    /// Overrides the built-in source list for the current platform when non-empty.
    #[serde(default)]
    pub sources: Vec<FetchSourceConfig>,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_secs: default_fetch_timeout(),
            self_check_timeout_secs: default_self_check_timeout(),
            sources: Vec::new(),
        }
    }
}

/// A remote binary source
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct FetchSourceConfig {
    pub url: String,
    /// Expected hex SHA-256 of the payload.
    #[serde(default)]
    pub sha256: Option<String>,
}

fn default_fetch_timeout() -> u64 {
    120
}

fn default_self_check_timeout() -> u64 {
    30
}

/// Auxiliary transcoder (ffmpeg) configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TranscoderConfig {
    /// Explicit ffmpeg location. Passed to the extraction binary when set.
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,
    #[serde(default = "default_transcoder_timeout")]
    pub timeout_secs: u64,
    /// FFmpeg log level (quiet, panic, fatal, error, warning, info).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for TranscoderConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: None,
            timeout_secs: default_transcoder_timeout(),
            log_level: default_log_level(),
        }
    }
}

impl TranscoderConfig {
    /// The ffmpeg binary to invoke for in-process muxing.
    pub fn ffmpeg_binary(&self) -> PathBuf {
        self.ffmpeg_path
            .clone()
            .unwrap_or_else(|| PathBuf::from("ffmpeg"))
    }
}

fn default_transcoder_timeout() -> u64 {
    240
}

fn default_log_level() -> String {
    "error".to_string()
}

/// In-process fallback extractor configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FallbackConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate_kbps: u32,
    #[serde(default = "default_client_name")]
    pub client_name: String,
    #[serde(default = "default_client_version")]
    pub client_version: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Timeout for metadata requests and each ranged chunk.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            audio_bitrate_kbps: default_audio_bitrate(),
            client_name: default_client_name(),
            client_version: default_client_version(),
            user_agent: default_user_agent(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_audio_bitrate() -> u32 {
    192
}

fn default_client_name() -> String {
    "ANDROID_VR".to_string()
}

fn default_client_version() -> String {
    "1.60.19".to_string()
}

fn default_user_agent() -> String {
    "com.google.android.apps.youtube.vr.oculus/1.60.19 (Linux; U; Android 12L; eureka-user Build/SQ3A.220605.009.A1) gzip".to_string()
}

fn default_request_timeout() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host.to_string(), "0.0.0.0");
        assert_eq!(config.acquisition.timeout_secs, 240);
        assert!(config.fetcher.enabled);
        assert!(config.fallback.enabled);
        assert!(config.locator.include_default_roots);
        assert!(config.transcoder.ffmpeg_path.is_none());
    }

    #[test]
    fn test_deserialize_with_overrides() {
        let toml = r#"
[server]
host = "127.0.0.1"
port = 9000

[acquisition]
scratch_dir = "/data/scratch"
timeout_secs = 60

[locator]
extra_dirs = ["/opt/tools"]
include_default_roots = false

[transcoder]
ffmpeg_path = "/usr/bin/ffmpeg"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.acquisition.scratch_dir, PathBuf::from("/data/scratch"));
        assert_eq!(config.acquisition.timeout_secs, 60);
        assert_eq!(config.locator.extra_dirs, vec![PathBuf::from("/opt/tools")]);
        assert!(!config.locator.include_default_roots);
        assert_eq!(
            config.transcoder.ffmpeg_binary(),
            PathBuf::from("/usr/bin/ffmpeg")
        );
    }

    #[test]
    fn test_deserialize_fetch_sources() {
        let toml = r#"
[fetcher]
timeout_secs = 10

[[fetcher.sources]]
url = "https://mirror.example/yt-dlp"
sha256 = "abc123"

[[fetcher.sources]]
url = "https://other.example/yt-dlp"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.fetcher.timeout_secs, 10);
        assert_eq!(config.fetcher.sources.len(), 2);
        assert_eq!(config.fetcher.sources[0].sha256.as_deref(), Some("abc123"));
        assert!(config.fetcher.sources[1].sha256.is_none());
    }

    #[test]
    fn test_default_ffmpeg_binary() {
        let config = TranscoderConfig::default();
        assert_eq!(config.ffmpeg_binary(), PathBuf::from("ffmpeg"));
    }
}
