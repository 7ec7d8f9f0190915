//! Manifest readiness polling.

use std::path::Path;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::time::Instant;

/// Poll interval used when none is configured.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// First line of every HLS playlist.
const PLAYLIST_TAG: &[u8] = b"#EXTM3U";

/// Outcome of [`await_ready`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    Timeout,
}

/// Whether `path` holds the start of an HLS playlist.
///
/// A missing, empty or partially written file is not playable.
pub async fn manifest_is_playable(path: &Path) -> bool {
    let Ok(mut file) = tokio::fs::File::open(path).await else {
        return false;
    };
    let mut head = [0u8; PLAYLIST_TAG.len()];
    match file.read_exact(&mut head).await {
        Ok(_) => head == PLAYLIST_TAG,
        Err(_) => false,
    }
}

/// Poll for a playable manifest until `deadline` elapses.
///
/// Returns as soon as the manifest is seen. A zero deadline checks exactly
/// once.
pub async fn await_ready(manifest_path: &Path, deadline: Duration, interval: Duration) -> Readiness {
    let started = Instant::now();
    let mut checks = 0u32;

    loop {
        checks += 1;
        if manifest_is_playable(manifest_path).await {
            tracing::debug!(path = ?manifest_path, checks, "Manifest is playable");
            return Readiness::Ready;
        }

        let elapsed = started.elapsed();
        if elapsed >= deadline {
            tracing::debug!(path = ?manifest_path, checks, "Manifest not ready before deadline");
            return Readiness::Timeout;
        }

        tokio::time::sleep(interval.min(deadline - elapsed)).await;
    }
}
