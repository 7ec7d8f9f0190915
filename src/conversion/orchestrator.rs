//! Conversion orchestration: allocate, spawn, wait for the first playlist.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use hlsrelay_av::{spawn_log_drain, ExitInfo, Transcoder};
use hlsrelay_common::StreamId;
use serde::Serialize;
use tokio::task::JoinSet;

use super::readiness::{await_ready, manifest_is_playable, Readiness, DEFAULT_POLL_INTERVAL};
use super::registry::{hls_url, Conversion, ConversionState, StreamRegistry};

/// Deadline for the first playlist when none is configured.
pub const DEFAULT_READINESS_TIMEOUT: Duration = Duration::from_secs(10);

/// Why a conversion could not be started or looked up.
#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    #[error("RTSP URL is required")]
    Validation,

    #[error("failed to allocate stream directory: {0}")]
    Allocation(#[source] io::Error),

    #[error("failed to start transcoder for stream {stream_id}: {source}")]
    Spawn {
        stream_id: StreamId,
        #[source]
        source: hlsrelay_av::Error,
    },

    #[error("stream {stream_id} produced no playlist within {}s", .deadline.as_secs_f64())]
    ReadinessTimeout { stream_id: StreamId, deadline: Duration },

    #[error("transcoder for stream {stream_id} exited before producing a playlist ({exit})")]
    ProcessExited { stream_id: StreamId, exit: String },

    #[error("stream not found: {0}")]
    NotFound(StreamId),

    #[error("stream {0} is still starting")]
    NotRunning(StreamId),

    #[error("failed to remove files of stream {stream_id}: {source}")]
    Purge {
        stream_id: StreamId,
        #[source]
        source: io::Error,
    },
}

impl ConversionError {
    /// HTTP status for this failure.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Validation => 400,
            Self::NotFound(_) => 404,
            Self::NotRunning(_) => 409,
            _ => 500,
        }
    }

    /// Short machine-readable code for API error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation => "validation_error",
            Self::Allocation(_) => "allocation_error",
            Self::Spawn { .. } => "spawn_error",
            Self::ReadinessTimeout { .. } => "readiness_timeout",
            Self::ProcessExited { .. } => "process_exited",
            Self::NotFound(_) => "not_found",
            Self::NotRunning(_) => "not_running",
            Self::Purge { .. } => "io_error",
        }
    }

    /// Stream the failure belongs to, once one was allocated.
    pub fn stream_id(&self) -> Option<StreamId> {
        match self {
            Self::Spawn { stream_id, .. }
            | Self::ReadinessTimeout { stream_id, .. }
            | Self::ProcessExited { stream_id, .. }
            | Self::Purge { stream_id, .. } => Some(*stream_id),
            Self::NotFound(id) | Self::NotRunning(id) => Some(*id),
            Self::Validation | Self::Allocation(_) => None,
        }
    }
}

/// A conversion that reached `Ready`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Converted {
    pub stream_id: StreamId,
    pub hls_url: String,
}

/// Entry point for starting and stopping conversions.
pub struct Orchestrator {
    registry: Arc<StreamRegistry>,
    transcoder: Transcoder,
    readiness_timeout: Duration,
    poll_interval: Duration,
}

impl Orchestrator {
    pub fn new(registry: Arc<StreamRegistry>, transcoder: Transcoder) -> Self {
        Self {
            registry,
            transcoder,
            readiness_timeout: DEFAULT_READINESS_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Set how long a new conversion has to produce its playlist.
    pub fn with_readiness_timeout(mut self, timeout: Duration) -> Self {
        self.readiness_timeout = timeout;
        self
    }

    /// Set the interval between playlist checks.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn registry(&self) -> &Arc<StreamRegistry> {
        &self.registry
    }

    pub fn transcoder(&self) -> &Transcoder {
        &self.transcoder
    }

    /// Start segmenting `source_url` and wait for its first playlist.
    ///
    /// On success the engine keeps running in the background. Every failure
    /// after allocation leaves a `Failed` registry entry behind.
    pub async fn convert(&self, source_url: &str) -> Result<Converted, ConversionError> {
        let source_url = source_url.trim();
        if source_url.is_empty() {
            return Err(ConversionError::Validation);
        }

        let (stream_id, output_dir) = self
            .registry
            .allocate()
            .map_err(ConversionError::Allocation)?;
        let conversion = Conversion::new(stream_id, source_url, output_dir);
        let manifest_path = conversion.manifest_path.clone();
        self.registry.register(conversion);

        tracing::info!(stream_id = %stream_id, source = %source_url, "Starting conversion");

        let handle = match self.transcoder.start(source_url, &manifest_path) {
            Ok(handle) => handle,
            Err(e) => {
                tracing::error!(stream_id = %stream_id, error = %e, "Failed to spawn transcoder");
                self.mark_failed(stream_id, e.to_string());
                self.registry.release(stream_id);
                return Err(ConversionError::Spawn {
                    stream_id,
                    source: e,
                });
            }
        };

        if let Err(e) = self.registry.attach_process(stream_id, handle.clone()) {
            tracing::warn!(stream_id = %stream_id, error = %e, "Conversion vanished during start");
        }

        // Detached; ends on its own when the engine closes stderr.
        drop(spawn_log_drain(&handle, stream_id.to_string()));

        let outcome = tokio::select! {
            biased;
            readiness = await_ready(&manifest_path, self.readiness_timeout, self.poll_interval) => {
                Ok(readiness)
            }
            exit = handle.wait() => Err(exit),
        };

        // The engine may write its playlist and exit between two polls.
        let outcome = match outcome {
            Err(exit) => {
                if manifest_is_playable(&manifest_path).await {
                    Ok(Readiness::Ready)
                } else {
                    Err(exit)
                }
            }
            ready => ready,
        };

        match outcome {
            Ok(Readiness::Ready) => {
                if let Err(e) = self.registry.mark_ready(stream_id) {
                    tracing::warn!(stream_id = %stream_id, error = %e, "Could not mark conversion ready");
                }
                tracing::info!(stream_id = %stream_id, "Conversion ready");
                Ok(Converted {
                    stream_id,
                    hls_url: hls_url(stream_id),
                })
            }
            Ok(Readiness::Timeout) => {
                tracing::warn!(
                    stream_id = %stream_id,
                    deadline_secs = self.readiness_timeout.as_secs_f64(),
                    "No playlist before deadline, stopping transcoder"
                );
                handle.terminate().await;
                let err = ConversionError::ReadinessTimeout {
                    stream_id,
                    deadline: self.readiness_timeout,
                };
                self.mark_failed(stream_id, err.to_string());
                Err(err)
            }
            Err(exit) => {
                let err = ConversionError::ProcessExited {
                    stream_id,
                    exit: describe_exit(&exit),
                };
                tracing::warn!(stream_id = %stream_id, error = %err, "Transcoder exited early");
                self.mark_failed(stream_id, err.to_string());
                Err(err)
            }
        }
    }

    /// Stop a conversion's engine.
    ///
    /// Ready conversions become `Stopped`; failed or already stopped ones
    /// are left as they are. A conversion still waiting for its first
    /// playlist cannot be stopped.
    pub async fn stop(&self, stream_id: StreamId) -> Result<Conversion, ConversionError> {
        let conversion = self.status(stream_id)?;
        if conversion.state == ConversionState::Starting {
            return Err(ConversionError::NotRunning(stream_id));
        }

        if let Some(ref process) = conversion.process {
            if process.is_running() {
                tracing::info!(stream_id = %stream_id, "Stopping conversion");
                process.terminate().await;
            }
        }

        if self.registry.mark_stopped(stream_id).unwrap_or(false) {
            tracing::info!(stream_id = %stream_id, "Conversion stopped");
        }
        self.status(stream_id)
    }

    /// Stop a conversion, forget it and delete its files.
    pub async fn purge(&self, stream_id: StreamId) -> Result<(), ConversionError> {
        self.stop(stream_id).await?;
        self.registry
            .purge(stream_id)
            .map_err(|source| ConversionError::Purge { stream_id, source })
    }

    /// Terminate every running engine. Returns how many were stopped.
    pub async fn shutdown(&self) -> usize {
        let running: Vec<_> = self
            .registry
            .list()
            .into_iter()
            .filter(Conversion::is_running)
            .filter_map(|c| c.process.map(|p| (c.id, p)))
            .collect();

        if running.is_empty() {
            return 0;
        }
        tracing::info!(count = running.len(), "Stopping running conversions");

        let mut tasks = JoinSet::new();
        for (id, process) in running {
            tasks.spawn(async move {
                process.terminate().await;
                id
            });
        }

        let mut stopped = 0;
        while let Some(result) = tasks.join_next().await {
            match result {
                Ok(id) => {
                    let _ = self.registry.mark_stopped(id);
                    stopped += 1;
                }
                Err(e) => tracing::warn!(error = %e, "Termination task failed"),
            }
        }
        stopped
    }

    /// Snapshot of one conversion.
    pub fn status(&self, stream_id: StreamId) -> Result<Conversion, ConversionError> {
        self.registry
            .get(stream_id)
            .map_err(|_| ConversionError::NotFound(stream_id))
    }

    /// Snapshot of every conversion.
    pub fn list(&self) -> Vec<Conversion> {
        self.registry.list()
    }

    /// Number of conversions in `state`.
    pub fn count_in(&self, state: ConversionState) -> usize {
        self.registry
            .list()
            .iter()
            .filter(|c| c.state == state)
            .count()
    }

    fn mark_failed(&self, stream_id: StreamId, reason: String) {
        if let Err(e) = self.registry.mark_failed(stream_id, reason) {
            tracing::warn!(stream_id = %stream_id, error = %e, "Could not mark conversion failed");
        }
    }
}

fn describe_exit(exit: &ExitInfo) -> String {
    match exit.status {
        Some(status) => status.to_string(),
        None => "exit status unavailable".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn orchestrator(engine: &str) -> (tempfile::TempDir, Orchestrator) {
        let dir = tempfile::tempdir().unwrap();
        let registry = Arc::new(StreamRegistry::new(dir.path().join("streams")));
        let orchestrator = Orchestrator::new(registry, Transcoder::new(engine));
        (dir, orchestrator)
    }

    #[tokio::test]
    async fn test_empty_url_rejected_before_allocation() {
        let (_tmp, orchestrator) = orchestrator("/nonexistent/bin/ffmpeg");

        assert_matches!(orchestrator.convert("").await, Err(ConversionError::Validation));
        assert_matches!(orchestrator.convert("   ").await, Err(ConversionError::Validation));
        assert_eq!(orchestrator.registry().allocated(), 0);
        assert!(orchestrator.list().is_empty());
    }

    #[tokio::test]
    async fn test_spawn_failure_marks_failed_and_releases_directory() {
        let (_tmp, orchestrator) = orchestrator("/nonexistent/bin/ffmpeg");

        let err = orchestrator.convert("rtsp://cam/live").await.unwrap_err();
        let stream_id = err.stream_id().unwrap();
        assert_matches!(err, ConversionError::Spawn { .. });
        assert_eq!(err.http_status(), 500);

        let conversion = orchestrator.status(stream_id).unwrap();
        assert_eq!(conversion.state, ConversionState::Failed);
        assert!(conversion.failure.is_some());
        assert!(!conversion.output_dir.exists());
        assert_eq!(orchestrator.count_in(ConversionState::Ready), 0);
    }

    #[tokio::test]
    async fn test_unknown_stream() {
        let (_tmp, orchestrator) = orchestrator("ffmpeg");
        let id = StreamId::new();

        assert_matches!(orchestrator.status(id), Err(ConversionError::NotFound(_)));
        assert_matches!(orchestrator.stop(id).await, Err(ConversionError::NotFound(_)));
        assert_matches!(orchestrator.purge(id).await, Err(ConversionError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_shutdown_with_nothing_running() {
        let (_tmp, orchestrator) = orchestrator("ffmpeg");
        assert_eq!(orchestrator.shutdown().await, 0);
    }

    #[test]
    fn test_error_mapping() {
        assert_eq!(ConversionError::Validation.http_status(), 400);
        assert_eq!(ConversionError::Validation.to_string(), "RTSP URL is required");
        assert_eq!(ConversionError::NotFound(StreamId::new()).http_status(), 404);

        let starting = ConversionError::NotRunning(StreamId::new());
        assert_eq!(starting.http_status(), 409);
        assert_eq!(starting.code(), "not_running");

        let err = ConversionError::ReadinessTimeout {
            stream_id: StreamId::new(),
            deadline: Duration::from_secs(10),
        };
        assert_eq!(err.http_status(), 500);
        assert_eq!(err.code(), "readiness_timeout");
        assert!(err.to_string().contains("within 10s"));
    }
}
