//! Overlay store gateway.
//!
//! Validates overlay requests and maps them onto the SQLite store. Overlays
//! reference streams by id only; nothing here checks that the stream exists.

use hlsrelay_common::{Error, OverlayId, OverlayKind, Position, Result, Size};
use hlsrelay_db::models::{NewOverlay, Overlay, OverlayPatch};
use hlsrelay_db::pool::{get_conn, DbPool};
use hlsrelay_db::queries::overlays;
use serde::Deserialize;

/// Body of an overlay create request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateOverlay {
    pub stream_id: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub content: Option<String>,
    pub position: Option<Position>,
    pub size: Option<Size>,
}

/// Body of an overlay update request. Fields other than these are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateOverlay {
    pub content: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub position: Option<Position>,
    pub size: Option<Size>,
}

fn parse_id(id: &str) -> Result<OverlayId> {
    id.parse()
        .map_err(|_| Error::invalid_identifier(format!("'{}' is not a valid overlay id", id)))
}

fn parse_kind(kind: &str) -> Result<OverlayKind> {
    kind.parse()
        .map_err(|_| Error::validation("type must be 'text' or 'image'"))
}

fn required(value: Option<String>, field: &str) -> Result<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(Error::validation(format!("{} is required", field))),
    }
}

/// CRUD over overlay documents.
#[derive(Clone)]
pub struct OverlayGateway {
    pool: DbPool,
}

impl OverlayGateway {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Validate and store a new overlay, filling in default geometry.
    pub fn create(&self, request: CreateOverlay) -> Result<Overlay> {
        let stream_id = required(request.stream_id, "stream_id")?;
        let kind = parse_kind(&required(request.kind, "type")?)?;
        let content = required(request.content, "content")?;

        let new = NewOverlay {
            stream_id,
            kind,
            content,
            position: request.position.unwrap_or_default(),
            size: request.size.unwrap_or_default(),
        };

        let conn = get_conn(&self.pool)?;
        let overlay = overlays::create_overlay(&conn, &new)?;
        tracing::debug!(overlay_id = %overlay.id, stream_id = %overlay.stream_id, "Created overlay");
        Ok(overlay)
    }

    /// All overlays in creation order, optionally for one stream.
    pub fn list(&self, stream_id: Option<&str>) -> Result<Vec<Overlay>> {
        let conn = get_conn(&self.pool)?;
        overlays::list_overlays(&conn, stream_id)
    }

    pub fn get(&self, id: &str) -> Result<Overlay> {
        let id = parse_id(id)?;
        let conn = get_conn(&self.pool)?;
        overlays::get_overlay(&conn, id)
    }

    /// Apply a partial update.
    ///
    /// The id is checked first, then the patch; the store is only touched
    /// for a well-formed id and a non-empty patch.
    pub fn update(&self, id: &str, request: UpdateOverlay) -> Result<Overlay> {
        let id = parse_id(id)?;

        let patch = OverlayPatch {
            content: request.content,
            kind: request.kind.as_deref().map(parse_kind).transpose()?,
            position: request.position,
            size: request.size,
        };
        if patch.is_empty() {
            return Err(Error::validation(
                "update must set at least one of content, type, position, size",
            ));
        }

        let conn = get_conn(&self.pool)?;
        let overlay = overlays::update_overlay(&conn, id, &patch)?;
        tracing::debug!(overlay_id = %id, "Updated overlay");
        Ok(overlay)
    }

    /// Delete an overlay, returning its id.
    pub fn delete(&self, id: &str) -> Result<OverlayId> {
        let id = parse_id(id)?;
        let conn = get_conn(&self.pool)?;
        overlays::delete_overlay(&conn, id)?;
        tracing::debug!(overlay_id = %id, "Deleted overlay");
        Ok(id)
    }
}
