//! # hlsrelay-av
//!
//! Supervision of the external transcoding engine (ffmpeg) that turns an RTSP
//! source into a rolling HLS playlist.
//!
//! This crate provides:
//! - **Tool discovery** ([`tools`]) -- locate ffmpeg and report its version.
//! - **Segment options** ([`SegmentOptions`]) -- the HLS/codec knobs passed
//!   verbatim to the engine.
//! - **Process supervision** ([`Transcoder`], [`ProcessHandle`]) -- spawn the
//!   engine, observe its log lines, and terminate it gracefully.
//!
//! ## Example
//!
//! ```no_run
//! use hlsrelay_av::{SegmentOptions, Transcoder};
//! use std::path::Path;
//!
//! # async fn example() -> hlsrelay_av::Result<()> {
//! let transcoder = Transcoder::new("ffmpeg").with_options(SegmentOptions::default());
//! let handle = transcoder.start("rtsp://cam/live", Path::new("/tmp/streams/x/index.m3u8"))?;
//! let drain = hlsrelay_av::spawn_log_drain(&handle, "x".to_string());
//! handle.terminate().await;
//! let _ = drain.await;
//! # Ok(())
//! # }
//! ```

mod error;
pub mod options;
pub mod tools;
pub mod transcoder;

// Re-exports
pub use error::{Error, Result};
pub use options::SegmentOptions;
pub use tools::{check_tool_with_arg, check_tools, require_tool, resolve_tool, ToolInfo};
pub use transcoder::{spawn_log_drain, ExitInfo, LogLines, ProcessHandle, Transcoder};
