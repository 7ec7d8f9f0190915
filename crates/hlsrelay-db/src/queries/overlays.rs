//! Overlay query operations.

use chrono::{DateTime, Utc};
use hlsrelay_common::{Error, OverlayId, OverlayKind, Position, Result, Size};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::models::{NewOverlay, Overlay, OverlayPatch};

const COLUMNS: &str =
    "id, stream_id, type, content, pos_x, pos_y, width, height, created_at, updated_at";

fn conversion_error(
    idx: usize,
    e: impl Into<Box<dyn std::error::Error + Send + Sync>>,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into())
}

fn parse_timestamp(idx: usize, value: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

fn row_to_overlay(row: &Row) -> rusqlite::Result<Overlay> {
    let id = row
        .get::<_, String>(0)?
        .parse::<OverlayId>()
        .map_err(|e| conversion_error(0, e))?;
    let kind = row
        .get::<_, String>(2)?
        .parse::<OverlayKind>()
        .map_err(|e| conversion_error(2, e))?;

    Ok(Overlay {
        id,
        stream_id: row.get(1)?,
        kind,
        content: row.get(3)?,
        position: Position {
            x: row.get(4)?,
            y: row.get(5)?,
        },
        size: Size {
            w: row.get(6)?,
            h: row.get(7)?,
        },
        created_at: parse_timestamp(8, row.get(8)?)?,
        updated_at: parse_timestamp(9, row.get(9)?)?,
    })
}

/// Insert a new overlay with a fresh id.
pub fn create_overlay(conn: &Connection, new: &NewOverlay) -> Result<Overlay> {
    let id = OverlayId::new();
    let now = Utc::now();

    conn.execute(
        "INSERT INTO overlays (id, stream_id, type, content, pos_x, pos_y, width, height,
                               created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            id.to_string(),
            new.stream_id,
            new.kind.to_string(),
            new.content,
            new.position.x,
            new.position.y,
            new.size.w,
            new.size.h,
            now.to_rfc3339(),
            now.to_rfc3339(),
        ],
    )
    .map_err(|e| Error::database(e.to_string()))?;

    Ok(Overlay {
        id,
        stream_id: new.stream_id.clone(),
        kind: new.kind,
        content: new.content.clone(),
        position: new.position,
        size: new.size,
        created_at: now,
        updated_at: now,
    })
}

/// Get an overlay by id.
pub fn get_overlay(conn: &Connection, id: OverlayId) -> Result<Overlay> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM overlays WHERE id = ?"),
        [id.to_string()],
        row_to_overlay,
    )
    .optional()
    .map_err(|e| Error::database(e.to_string()))?
    .ok_or_else(|| Error::not_found("overlay", id))
}

/// List overlays in creation order, optionally only those for one stream.
pub fn list_overlays(conn: &Connection, stream_id: Option<&str>) -> Result<Vec<Overlay>> {
    let overlays = match stream_id {
        Some(stream_id) => {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {COLUMNS} FROM overlays WHERE stream_id = ? ORDER BY rowid"
                ))
                .map_err(|e| Error::database(e.to_string()))?;
            let rows = stmt
                .query_map([stream_id], row_to_overlay)
                .map_err(|e| Error::database(e.to_string()))?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
        }
        None => {
            let mut stmt = conn
                .prepare(&format!("SELECT {COLUMNS} FROM overlays ORDER BY rowid"))
                .map_err(|e| Error::database(e.to_string()))?;
            let rows = stmt
                .query_map([], row_to_overlay)
                .map_err(|e| Error::database(e.to_string()))?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
        }
    };

    overlays.map_err(|e| Error::database(e.to_string()))
}

/// Apply a partial update and return the stored result.
///
/// An empty patch is rejected before the store is read.
pub fn update_overlay(conn: &Connection, id: OverlayId, patch: &OverlayPatch) -> Result<Overlay> {
    if patch.is_empty() {
        return Err(Error::validation("no writable fields in update"));
    }

    let tx = conn
        .unchecked_transaction()
        .map_err(|e| Error::database(e.to_string()))?;

    let mut overlay = get_overlay(&tx, id)?;
    patch.apply_to(&mut overlay);
    overlay.updated_at = Utc::now();

    tx.execute(
        "UPDATE overlays
         SET type = ?, content = ?, pos_x = ?, pos_y = ?, width = ?, height = ?, updated_at = ?
         WHERE id = ?",
        params![
            overlay.kind.to_string(),
            overlay.content,
            overlay.position.x,
            overlay.position.y,
            overlay.size.w,
            overlay.size.h,
            overlay.updated_at.to_rfc3339(),
            id.to_string(),
        ],
    )
    .map_err(|e| Error::database(e.to_string()))?;

    tx.commit().map_err(|e| Error::database(e.to_string()))?;
    Ok(overlay)
}

/// Delete an overlay, failing with `NotFound` when nothing was deleted.
pub fn delete_overlay(conn: &Connection, id: OverlayId) -> Result<()> {
    let deleted = conn
        .execute("DELETE FROM overlays WHERE id = ?", [id.to_string()])
        .map_err(|e| Error::database(e.to_string()))?;

    if deleted == 0 {
        return Err(Error::not_found("overlay", id));
    }
    Ok(())
}
