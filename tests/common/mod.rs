//! Shared test harness for integration tests.
//!
//! [`TestHarness`] builds a full [`AppContext`] over an in-memory overlay
//! store and a temporary streams root. On unix, [`write_engine`] creates
//! small shell scripts that stand in for ffmpeg.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::Response;
use axum::Router;
use http_body_util::BodyExt;
use tempfile::TempDir;

use hlsrelay::config::Config;
use hlsrelay::conversion::{Orchestrator, StreamRegistry};
use hlsrelay::server::{create_router, AppContext};
use hlsrelay_av::Transcoder;
use hlsrelay_db::pool::init_memory_pool;

/// Engine path that never exists.
pub const MISSING_ENGINE: &str = "/nonexistent/bin/ffmpeg";

/// Engine that never writes a manifest.
pub const SLEEPER: &str = "exec sleep 30";

/// Engine that writes a playlist to its last argument, then keeps running.
pub const MANIFEST_WRITER: &str =
    "for last; do :; done\nprintf '#EXTM3U\\n#EXT-X-VERSION:3\\n' > \"$last\"\nexec sleep 30";

/// Engine that writes a playlist shortly after starting, then exits cleanly.
pub const QUICK_WRITER: &str =
    "for last; do :; done\nsleep 0.1\nprintf '#EXTM3U\\n' > \"$last\"\nexit 0";

/// Engine that exits immediately without output.
pub const CRASHER: &str = "echo 'rtsp://cam/live: Connection refused' >&2\nexit 1";

/// Full application context over temporary storage.
pub struct TestHarness {
    pub ctx: AppContext,
    pub dir: TempDir,
}

impl TestHarness {
    /// Harness whose engine does not exist.
    pub fn new() -> Self {
        Self::with_engine(Path::new(MISSING_ENGINE), 5)
    }

    /// Harness using `engine` with a readiness deadline in seconds.
    pub fn with_engine(engine: &Path, readiness_timeout_secs: u64) -> Self {
        let dir = tempfile::tempdir().expect("failed to create temp dir");

        let mut config = Config::default();
        config.streams.root = dir.path().join("streams");
        config.streams.readiness_timeout_secs = readiness_timeout_secs;
        config.streams.poll_interval_ms = 20;
        config.streams.stop_grace_period_secs = 2;
        config.tools.ffmpeg_path = Some(engine.to_path_buf());

        let db = init_memory_pool().expect("failed to create in-memory pool");
        let ctx = AppContext::new(config, db);

        Self { ctx, dir }
    }

    pub fn router(&self) -> Router {
        create_router(self.ctx.clone())
    }

    pub fn streams_root(&self) -> PathBuf {
        self.dir.path().join("streams")
    }
}

/// Orchestrator over a fresh registry rooted in `root`.
pub fn orchestrator(root: &Path, engine: &Path, deadline: Duration) -> Arc<Orchestrator> {
    let registry = Arc::new(StreamRegistry::new(root.join("streams")));
    let transcoder = Transcoder::new(engine).with_grace_period(Duration::from_secs(2));
    Arc::new(
        Orchestrator::new(registry, transcoder)
            .with_readiness_timeout(deadline)
            .with_poll_interval(Duration::from_millis(20)),
    )
}

/// Write an executable shell script standing in for the engine.
#[cfg(unix)]
pub fn write_engine(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).expect("failed to write engine");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
        .expect("failed to make engine executable");
    path
}

/// Read a response body as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Read a response body as a string.
pub async fn body_string(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}
