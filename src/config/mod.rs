mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = [
        "./hlsrelay.toml",
        "./config.toml",
        "~/.config/hlsrelay/config.toml",
        "/etc/hlsrelay/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            tracing::debug!("Using config file {:?}", path);
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    if config.server.port == 0 {
        anyhow::bail!("Server port cannot be 0");
    }

    if config.streams.poll_interval_ms == 0 {
        anyhow::bail!("Stream poll interval must be at least 1ms");
    }

    config
        .transcoder
        .validate()
        .context("Invalid transcoder settings")?;

    if let Some(ref path) = config.tools.ffmpeg_path {
        if !path.exists() {
            tracing::warn!("Configured ffmpeg path does not exist: {:?}", path);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 5000);
        assert!(config.server.cors_allow_any);
        assert_eq!(config.streams.root, Path::new("./streams"));
        assert_eq!(config.streams.readiness_timeout_secs, 10);
        assert_eq!(config.streams.poll_interval_ms, 500);
        assert_eq!(config.transcoder.segment_duration_secs, 2);
        assert!(config.tools.ffmpeg_path.is_none());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[server]
port = 9000

[streams]
root = "/srv/hls"
readiness_timeout_secs = 20

[transcoder]
playlist_size = 8
"#
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.streams.root, Path::new("/srv/hls"));
        assert_eq!(config.streams.readiness_timeout().as_secs(), 20);
        assert_eq!(config.streams.poll_interval().as_millis(), 500);
        assert_eq!(config.transcoder.playlist_size, 8);
        assert_eq!(config.transcoder.video_codec, "libx264");
    }

    #[test]
    fn test_rejects_zero_port() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nport = 0").unwrap();
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn test_rejects_zero_segment_duration() {
        let mut config = Config::default();
        config.transcoder.segment_duration_secs = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_custom_path_missing() {
        assert!(load_config_or_default(Some(Path::new("/nonexistent/hlsrelay.toml"))).is_err());
    }
}
