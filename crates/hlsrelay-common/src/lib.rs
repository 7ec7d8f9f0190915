//! hlsrelay-common: Shared types, identifiers, and errors.
//!
//! This crate provides functionality used across hlsrelay:
//!
//! - **Typed IDs**: UUID wrappers for streams and overlays
//! - **Overlay Types**: overlay kind, position and size with their defaults
//! - **Error Handling**: the shared error taxonomy and its HTTP status mapping
//!
//! # Examples
//!
//! ```
//! use hlsrelay_common::{Error, OverlayKind, Position, Result, StreamId};
//!
//! let stream_id = StreamId::new();
//! assert_eq!(stream_id.to_string().len(), 36);
//!
//! let kind: OverlayKind = "text".parse().unwrap();
//! assert_eq!(kind, OverlayKind::Text);
//! assert_eq!(Position::default(), Position { x: 10.0, y: 10.0 });
//!
//! fn lookup() -> Result<()> {
//!     Err(Error::not_found("overlay", "abc"))
//! }
//! assert_eq!(lookup().unwrap_err().http_status(), 404);
//! ```

pub mod error;
pub mod ids;
pub mod types;

pub use error::{Error, Result};
pub use ids::*;
pub use types::*;
