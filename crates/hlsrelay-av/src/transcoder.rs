//! Spawning and supervising the transcoding engine.
//!
//! [`Transcoder::start`] launches one engine process and hands back a
//! [`ProcessHandle`]. The child itself is owned by a reaper task which waits
//! for it to exit, or for a termination request, and publishes the outcome to
//! every clone of the handle.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::process::{Child, ChildStderr, Command};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;

use crate::{Error, Result, SegmentOptions};

/// Time the engine gets to exit after SIGTERM before it is killed.
const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// How a supervised process ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExitInfo {
    /// Exit status, if the OS reported one.
    pub status: Option<ExitStatus>,
    /// Whether the exit was caused by [`ProcessHandle::terminate`].
    pub terminated: bool,
}

/// Launcher for the transcoding engine.
#[derive(Debug, Clone)]
pub struct Transcoder {
    program: PathBuf,
    options: SegmentOptions,
    grace_period: Duration,
}

impl Transcoder {
    /// Create a launcher for the given engine executable.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            options: SegmentOptions::default(),
            grace_period: DEFAULT_GRACE_PERIOD,
        }
    }

    /// Set the segment options passed to every process.
    pub fn with_options(mut self, options: SegmentOptions) -> Self {
        self.options = options;
        self
    }

    /// Set the SIGTERM grace period.
    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    /// Path of the engine executable.
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Segment options in use.
    pub fn options(&self) -> &SegmentOptions {
        &self.options
    }

    /// Spawn the engine segmenting `source_url` into `manifest_path`.
    ///
    /// Must be called from within a tokio runtime. Returns as soon as the
    /// process is launched; it does not wait for any output.
    ///
    /// # Errors
    ///
    /// [`Error::ToolNotFound`] when the executable does not exist,
    /// [`Error::SpawnFailed`] for any other launch failure.
    pub fn start(&self, source_url: &str, manifest_path: &Path) -> Result<ProcessHandle> {
        let tool = self.program.display().to_string();
        let args = self.options.to_args(source_url, manifest_path);

        tracing::debug!(program = %tool, ?args, "Spawning transcoder");

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => Error::tool_not_found(tool.clone()),
                _ => Error::spawn_failed(tool.clone(), e.to_string()),
            })?;

        let pid = child.id();
        let stderr = child.stderr.take();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let (exit_tx, exit_rx) = watch::channel(None);

        tokio::spawn(reap(child, pid, shutdown_rx, exit_tx, self.grace_period));

        tracing::info!(program = %tool, pid = ?pid, "Transcoder started");

        Ok(ProcessHandle {
            inner: Arc::new(Inner {
                program: tool,
                pid,
                stderr: Mutex::new(stderr),
                shutdown: Mutex::new(Some(shutdown_tx)),
                exit: exit_rx,
            }),
        })
    }
}

/// Owns the child until it exits.
///
/// A dropped shutdown sender means every handle is gone, so the process is
/// killed without a grace period.
async fn reap(
    mut child: Child,
    pid: Option<u32>,
    shutdown_rx: oneshot::Receiver<()>,
    exit_tx: watch::Sender<Option<ExitInfo>>,
    grace_period: Duration,
) {
    let requested = tokio::select! {
        status = child.wait() => {
            let info = ExitInfo { status: status.ok(), terminated: false };
            tracing::debug!(pid = ?pid, status = ?info.status, "Transcoder exited");
            exit_tx.send_replace(Some(info));
            return;
        }
        request = shutdown_rx => request.is_ok(),
    };

    let info = if requested {
        stop_gracefully(&mut child, pid, grace_period).await
    } else {
        tracing::debug!(pid = ?pid, "All handles dropped, killing transcoder");
        kill(&mut child).await
    };
    exit_tx.send_replace(Some(info));
}

async fn stop_gracefully(child: &mut Child, pid: Option<u32>, grace_period: Duration) -> ExitInfo {
    if let Some(pid) = pid {
        if send_sigterm(pid) {
            if let Ok(Ok(status)) = tokio::time::timeout(grace_period, child.wait()).await {
                tracing::debug!(pid, ?status, "Transcoder stopped after SIGTERM");
                return ExitInfo {
                    status: Some(status),
                    terminated: true,
                };
            }
            tracing::warn!(pid, "Transcoder ignored SIGTERM, killing");
        }
    }
    kill(child).await
}

async fn kill(child: &mut Child) -> ExitInfo {
    if let Err(e) = child.kill().await {
        tracing::warn!(error = %e, "Failed to kill transcoder");
    }
    ExitInfo {
        status: child.wait().await.ok(),
        terminated: true,
    }
}

#[cfg(unix)]
fn send_sigterm(pid: u32) -> bool {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    kill(Pid::from_raw(raw), Signal::SIGTERM).is_ok()
}

#[cfg(not(unix))]
fn send_sigterm(_pid: u32) -> bool {
    false
}

struct Inner {
    program: String,
    pid: Option<u32>,
    stderr: Mutex<Option<ChildStderr>>,
    shutdown: Mutex<Option<oneshot::Sender<()>>>,
    exit: watch::Receiver<Option<ExitInfo>>,
}

/// Cloneable handle to a running engine process.
///
/// Dropping the last clone of a still-running process kills it.
#[derive(Clone)]
pub struct ProcessHandle {
    inner: Arc<Inner>,
}

impl ProcessHandle {
    /// OS process id, if the process was running when spawned.
    pub fn pid(&self) -> Option<u32> {
        self.inner.pid
    }

    /// Engine executable this process was started from.
    pub fn program(&self) -> &str {
        &self.inner.program
    }

    /// Whether the process has not yet been reaped.
    pub fn is_running(&self) -> bool {
        self.inner.exit.borrow().is_none()
    }

    /// Exit information once the process has ended.
    pub fn exit_status(&self) -> Option<ExitInfo> {
        *self.inner.exit.borrow()
    }

    /// Wait for the process to exit.
    pub async fn wait(&self) -> ExitInfo {
        let mut rx = self.inner.exit.clone();
        // A closed channel means the reaper is gone; report whatever it left.
        let _ = rx.wait_for(Option::is_some).await;
        let info = *rx.borrow();
        info.unwrap_or_default()
    }

    /// Ask the process to stop and wait until it has.
    ///
    /// Sends SIGTERM, then kills the process if it is still alive after the
    /// grace period. Calling this on an exited process, or a second time,
    /// only returns the recorded exit.
    pub async fn terminate(&self) -> ExitInfo {
        let sender = self.inner.shutdown.lock().take();
        if let Some(tx) = sender {
            if tx.send(()).is_ok() {
                tracing::debug!(pid = ?self.inner.pid, "Termination requested");
            }
        }
        self.wait().await
    }

    /// Take the process's log stream.
    ///
    /// The stream can be taken once; later calls return an empty sequence.
    pub fn observe_lines(&self) -> LogLines {
        let stderr = self.inner.stderr.lock().take();
        LogLines {
            lines: stderr.map(|s| BufReader::new(s).lines()),
        }
    }
}

impl fmt::Debug for ProcessHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessHandle")
            .field("program", &self.inner.program)
            .field("pid", &self.inner.pid)
            .field("running", &self.is_running())
            .finish()
    }
}

/// Lines written by the engine to stderr.
pub struct LogLines {
    lines: Option<Lines<BufReader<ChildStderr>>>,
}

impl LogLines {
    /// Next line, or `None` once the stream has closed.
    pub async fn next_line(&mut self) -> Option<String> {
        let lines = self.lines.as_mut()?;
        match lines.next_line().await {
            Ok(Some(line)) => Some(line),
            Ok(None) => {
                self.lines = None;
                None
            }
            Err(e) => {
                tracing::debug!(error = %e, "Transcoder log stream failed");
                self.lines = None;
                None
            }
        }
    }
}

/// Drain the engine's log stream on its own task.
///
/// Every line is logged at debug level. The task ends when the stream closes
/// and yields the number of lines seen.
pub fn spawn_log_drain(handle: &ProcessHandle, label: String) -> JoinHandle<usize> {
    let mut lines = handle.observe_lines();
    let pid = handle.pid();

    tokio::spawn(async move {
        let mut count = 0usize;
        while let Some(line) = lines.next_line().await {
            count += 1;
            tracing::debug!(stream = %label, pid = ?pid, "{}", line);
        }
        tracing::debug!(stream = %label, lines = count, "Transcoder log stream closed");
        count
    })
}
