//! In-memory registry of conversions and their output directories.
//!
//! Every stream gets its own directory `root/{stream_id}` created by
//! [`StreamRegistry::allocate`]. The registry never deletes files as a side
//! effect of a state change; only [`StreamRegistry::release`] (empty
//! directories) and [`StreamRegistry::purge`] touch the disk.

use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use hlsrelay_av::ProcessHandle;
use hlsrelay_common::{Error, Result, StreamId};
use parking_lot::Mutex;
use serde::Serialize;

/// File name of the rolling playlist inside a stream directory.
pub const MANIFEST_NAME: &str = "index.m3u8";

/// Lifecycle state of a conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversionState {
    Starting,
    Ready,
    Failed,
    Stopped,
}

impl std::fmt::Display for ConversionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Starting => write!(f, "starting"),
            Self::Ready => write!(f, "ready"),
            Self::Failed => write!(f, "failed"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// One RTSP source being segmented into one stream directory.
#[derive(Debug, Clone, Serialize)]
pub struct Conversion {
    pub id: StreamId,
    pub source_url: String,
    pub output_dir: PathBuf,
    pub manifest_path: PathBuf,
    pub state: ConversionState,
    #[serde(skip)]
    pub process: Option<ProcessHandle>,
    pub started_at: DateTime<Utc>,
    pub ready_at: Option<DateTime<Utc>>,
    /// Reason recorded when the conversion failed.
    pub failure: Option<String>,
}

impl Conversion {
    /// A conversion in `Starting` writing into `output_dir`.
    pub fn new(id: StreamId, source_url: impl Into<String>, output_dir: PathBuf) -> Self {
        Self {
            id,
            source_url: source_url.into(),
            manifest_path: output_dir.join(MANIFEST_NAME),
            output_dir,
            state: ConversionState::Starting,
            process: None,
            started_at: Utc::now(),
            ready_at: None,
            failure: None,
        }
    }

    /// Path the manifest is served under.
    pub fn hls_url(&self) -> String {
        hls_url(self.id)
    }

    /// Whether the engine process is still alive.
    pub fn is_running(&self) -> bool {
        self.process.as_ref().is_some_and(ProcessHandle::is_running)
    }
}

/// Path the manifest of `id` is served under.
pub fn hls_url(id: StreamId) -> String {
    format!("/streams/{}/{}", id, MANIFEST_NAME)
}

/// Create `dir` non-recursively, creating the streams root on first use.
fn create_stream_dir(root: &Path, dir: &Path) -> io::Result<()> {
    match std::fs::create_dir(dir) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            std::fs::create_dir_all(root)?;
            std::fs::create_dir(dir)
        }
        other => other,
    }
}

#[derive(Default)]
struct Inner {
    conversions: HashMap<StreamId, Conversion>,
    /// Ids handed out by `allocate` and not yet registered.
    reserved: HashSet<StreamId>,
    allocated: u64,
}

/// Registry of all conversions known to this process.
pub struct StreamRegistry {
    root: PathBuf,
    inner: Mutex<Inner>,
}

impl StreamRegistry {
    /// Create a registry whose stream directories live under `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Directory holding all stream directories.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Mint a fresh stream id and create its output directory.
    ///
    /// Ids colliding with a live entry, an outstanding reservation or an
    /// existing directory are discarded and re-minted. The id is reserved
    /// under the lock; the directory is created after it is released.
    pub fn allocate(&self) -> io::Result<(StreamId, PathBuf)> {
        loop {
            let id = self.reserve();
            let dir = self.root.join(id.to_string());

            match create_stream_dir(&self.root, &dir) {
                Ok(()) => {
                    self.inner.lock().allocated += 1;
                    tracing::debug!(stream_id = %id, dir = ?dir, "Allocated stream directory");
                    return Ok((id, dir));
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    self.inner.lock().reserved.remove(&id);
                    tracing::warn!(stream_id = %id, "Stream directory already exists, re-minting");
                }
                Err(e) => {
                    self.inner.lock().reserved.remove(&id);
                    return Err(e);
                }
            }
        }
    }

    fn reserve(&self) -> StreamId {
        let mut inner = self.inner.lock();
        loop {
            let id = StreamId::new();
            if inner.conversions.contains_key(&id) || !inner.reserved.insert(id) {
                tracing::warn!(stream_id = %id, "Stream id collision, re-minting");
                continue;
            }
            return id;
        }
    }

    /// Track a conversion, consuming its reservation.
    pub fn register(&self, conversion: Conversion) {
        let mut inner = self.inner.lock();
        inner.reserved.remove(&conversion.id);
        inner.conversions.insert(conversion.id, conversion);
    }

    /// Store the engine handle of a conversion.
    pub fn attach_process(&self, id: StreamId, handle: ProcessHandle) -> Result<()> {
        self.with_conversion(id, |c| c.process = Some(handle))
    }

    /// Snapshot of one conversion.
    pub fn get(&self, id: StreamId) -> Result<Conversion> {
        self.inner
            .lock()
            .conversions
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::not_found("stream", id))
    }

    /// Move `Starting -> Ready`. Returns false when the conversion was in
    /// any other state.
    pub fn mark_ready(&self, id: StreamId) -> Result<bool> {
        self.with_conversion(id, |c| {
            if c.state != ConversionState::Starting {
                return false;
            }
            c.state = ConversionState::Ready;
            c.ready_at = Some(Utc::now());
            true
        })
    }

    /// Move `Starting -> Failed`, recording the reason.
    pub fn mark_failed(&self, id: StreamId, reason: impl Into<String>) -> Result<bool> {
        let reason = reason.into();
        self.with_conversion(id, |c| {
            if c.state != ConversionState::Starting {
                return false;
            }
            c.state = ConversionState::Failed;
            c.failure = Some(reason);
            true
        })
    }

    /// Move `Ready -> Stopped`.
    pub fn mark_stopped(&self, id: StreamId) -> Result<bool> {
        self.with_conversion(id, |c| {
            if c.state != ConversionState::Ready {
                return false;
            }
            c.state = ConversionState::Stopped;
            true
        })
    }

    /// Forget a conversion. Files on disk are left alone.
    pub fn remove(&self, id: StreamId) -> Option<Conversion> {
        let mut inner = self.inner.lock();
        inner.reserved.remove(&id);
        inner.conversions.remove(&id)
    }

    /// All conversions, oldest first.
    pub fn list(&self) -> Vec<Conversion> {
        let mut all: Vec<_> = self.inner.lock().conversions.values().cloned().collect();
        all.sort_by_key(|c| c.started_at);
        all
    }

    /// Drop an allocation whose directory was never written to.
    ///
    /// The directory is removed only if it is still empty. Returns whether
    /// it was removed.
    pub fn release(&self, id: StreamId) -> bool {
        self.inner.lock().reserved.remove(&id);
        let dir = self.root.join(id.to_string());
        match std::fs::remove_dir(&dir) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(stream_id = %id, error = %e, "Keeping stream directory");
                false
            }
        }
    }

    /// Forget a conversion and delete its output directory.
    pub fn purge(&self, id: StreamId) -> io::Result<()> {
        let removed = self.remove(id);
        let dir = removed
            .map(|c| c.output_dir)
            .unwrap_or_else(|| self.root.join(id.to_string()));
        match std::fs::remove_dir_all(&dir) {
            Ok(()) => {
                tracing::info!(stream_id = %id, "Purged stream directory");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Number of tracked conversions.
    pub fn len(&self) -> usize {
        self.inner.lock().conversions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total ids handed out by `allocate`.
    pub fn allocated(&self) -> u64 {
        self.inner.lock().allocated
    }

    /// Stream directories under the root, tracked or not.
    pub fn count_directories(&self) -> io::Result<usize> {
        match std::fs::read_dir(&self.root) {
            Ok(entries) => Ok(entries
                .filter_map(|e| e.ok())
                .filter(|e| e.path().is_dir())
                .count()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(e),
        }
    }

    fn with_conversion<T>(&self, id: StreamId, f: impl FnOnce(&mut Conversion) -> T) -> Result<T> {
        let mut inner = self.inner.lock();
        let conversion = inner
            .conversions
            .get_mut(&id)
            .ok_or_else(|| Error::not_found("stream", id))?;
        Ok(f(conversion))
    }
}
