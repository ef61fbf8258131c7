use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Timeouts are non-zero
/// - Fallback audio bitrate is within what libmp3lame accepts
/// - Fetch source URLs parse
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    let timeouts = [
        ("acquisition.timeout_secs", config.acquisition.timeout_secs),
        ("fetcher.timeout_secs", config.fetcher.timeout_secs),
        (
            "fetcher.self_check_timeout_secs",
            config.fetcher.self_check_timeout_secs,
        ),
        ("transcoder.timeout_secs", config.transcoder.timeout_secs),
        (
            "fallback.request_timeout_secs",
            config.fallback.request_timeout_secs,
        ),
    ];
    for (name, value) in timeouts {
        if value == 0 {
            return Err(ConfigError::ValidationError(format!("{} cannot be 0", name)));
        }
    }

    if !(32..=320).contains(&config.fallback.audio_bitrate_kbps) {
        return Err(ConfigError::ValidationError(format!(
            "fallback.audio_bitrate_kbps must be between 32 and 320, got {}",
            config.fallback.audio_bitrate_kbps
        )));
    }

    if config.acquisition.download_basename.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "acquisition.download_basename cannot be empty".to_string(),
        ));
    }

    for source in &config.fetcher.sources {
        reqwest::Url::parse(&source.url).map_err(|e| {
            ConfigError::ValidationError(format!(
                "fetcher.sources: invalid url '{}': {}",
                source.url, e
            ))
        })?;
    }

    Ok(())
}
