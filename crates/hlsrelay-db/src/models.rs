//! Rust models matching the database schema.

use chrono::{DateTime, Utc};
use hlsrelay_common::{OverlayId, OverlayKind, Position, Size};
use serde::{Deserialize, Serialize};

/// A stored overlay document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Overlay {
    pub id: OverlayId,
    /// Stream the overlay belongs to. Not checked against running streams.
    pub stream_id: String,
    #[serde(rename = "type")]
    pub kind: OverlayKind,
    pub content: String,
    pub position: Position,
    pub size: Size,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields required to insert an overlay.
#[derive(Debug, Clone, PartialEq)]
pub struct NewOverlay {
    pub stream_id: String,
    pub kind: OverlayKind,
    pub content: String,
    pub position: Position,
    pub size: Size,
}

impl NewOverlay {
    /// Overlay with default position and size.
    pub fn new(
        stream_id: impl Into<String>,
        kind: OverlayKind,
        content: impl Into<String>,
    ) -> Self {
        Self {
            stream_id: stream_id.into(),
            kind,
            content: content.into(),
            position: Position::default(),
            size: Size::default(),
        }
    }
}

/// Partial update of an overlay's writable fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverlayPatch {
    pub content: Option<String>,
    pub kind: Option<OverlayKind>,
    pub position: Option<Position>,
    pub size: Option<Size>,
}

impl OverlayPatch {
    /// True when the patch would change nothing.
    pub fn is_empty(&self) -> bool {
        self.content.is_none() && self.kind.is_none() && self.position.is_none() && self.size.is_none()
    }

    /// Apply the patch to a stored overlay.
    pub fn apply_to(&self, overlay: &mut Overlay) {
        if let Some(ref content) = self.content {
            overlay.content = content.clone();
        }
        if let Some(kind) = self.kind {
            overlay.kind = kind;
        }
        if let Some(position) = self.position {
            overlay.position = position;
        }
        if let Some(size) = self.size {
            overlay.size = size;
        }
    }
}
