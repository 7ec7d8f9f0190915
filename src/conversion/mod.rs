//! RTSP to HLS conversion lifecycle.
//!
//! - [`registry`] tracks every conversion and owns its output directory.
//! - [`readiness`] waits for the first playable manifest.
//! - [`orchestrator`] ties them to the transcoding engine and is the entry
//!   point used by the HTTP layer.

pub mod orchestrator;
pub mod readiness;
pub mod registry;

pub use orchestrator::{ConversionError, Converted, Orchestrator};
pub use readiness::{await_ready, manifest_is_playable, Readiness};
pub use registry::{Conversion, ConversionState, StreamRegistry, MANIFEST_NAME};
