use hlsrelay_av::SegmentOptions;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub streams: StreamsConfig,

    /// Segment and codec options passed to the engine.
    #[serde(default)]
    pub transcoder: SegmentOptions,

    #[serde(default)]
    pub tools: ToolsConfig,

    #[serde(default)]
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Allow cross-origin requests from any origin
    #[serde(default = "default_true")]
    pub cors_allow_any: bool,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    5000
}
fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_allow_any: true,
        }
    }
}

/// Where HLS output lives and how conversions are supervised.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StreamsConfig {
    /// Directory holding one subdirectory per stream
    #[serde(default = "default_streams_root")]
    pub root: PathBuf,

    /// Seconds a new conversion has to produce its manifest
    #[serde(default = "default_readiness_timeout")]
    pub readiness_timeout_secs: u64,

    /// Milliseconds between manifest checks
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Seconds a stopping engine gets between SIGTERM and kill
    #[serde(default = "default_grace_period")]
    pub stop_grace_period_secs: u64,
}

fn default_streams_root() -> PathBuf {
    PathBuf::from("./streams")
}
fn default_readiness_timeout() -> u64 {
    10
}
fn default_poll_interval() -> u64 {
    500
}
fn default_grace_period() -> u64 {
    5
}

impl Default for StreamsConfig {
    fn default() -> Self {
        Self {
            root: default_streams_root(),
            readiness_timeout_secs: default_readiness_timeout(),
            poll_interval_ms: default_poll_interval(),
            stop_grace_period_secs: default_grace_period(),
        }
    }
}

impl StreamsConfig {
    pub fn readiness_timeout(&self) -> Duration {
        Duration::from_secs(self.readiness_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn stop_grace_period(&self) -> Duration {
        Duration::from_secs(self.stop_grace_period_secs)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ToolsConfig {
    /// Explicit ffmpeg path; looked up on PATH when unset
    pub ffmpeg_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// SQLite file for overlays; defaults to hlsrelay.db in the data directory
    pub path: Option<PathBuf>,
}
