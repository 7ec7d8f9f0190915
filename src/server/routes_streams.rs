//! Inspection and control of running conversions.

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use hlsrelay_av::ToolInfo;
use hlsrelay_common::{Error, StreamId};
use serde::Serialize;
use serde_json::{json, Value};

use super::error::AppError;
use super::AppContext;
use crate::conversion::{Conversion, ConversionState};

/// API view of a conversion.
#[derive(Debug, Serialize)]
pub struct StreamView {
    pub stream_id: StreamId,
    pub source_url: String,
    pub state: ConversionState,
    pub hls_url: String,
    pub running: bool,
    pub pid: Option<u32>,
    pub started_at: DateTime<Utc>,
    pub ready_at: Option<DateTime<Utc>>,
    pub failure: Option<String>,
}

impl From<&Conversion> for StreamView {
    fn from(c: &Conversion) -> Self {
        Self {
            stream_id: c.id,
            source_url: c.source_url.clone(),
            state: c.state,
            hls_url: c.hls_url(),
            running: c.is_running(),
            pid: c.process.as_ref().and_then(|p| p.pid()),
            started_at: c.started_at,
            ready_at: c.ready_at,
            failure: c.failure.clone(),
        }
    }
}

pub fn stream_routes() -> Router<AppContext> {
    Router::new()
        .route("/streams", get(list_streams))
        .route("/streams/:id", get(get_stream).delete(purge_stream))
        .route("/streams/:id/stop", post(stop_stream))
        .route("/tools", get(list_tools))
}

fn parse_stream_id(id: &str) -> Result<StreamId, AppError> {
    id.parse()
        .map_err(|_| Error::invalid_identifier(format!("'{}' is not a valid stream id", id)).into())
}

async fn list_streams(State(ctx): State<AppContext>) -> Json<Vec<StreamView>> {
    Json(ctx.orchestrator.list().iter().map(StreamView::from).collect())
}

async fn get_stream(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Result<Json<StreamView>, AppError> {
    let id = parse_stream_id(&id)?;
    let conversion = ctx.orchestrator.status(id)?;
    Ok(Json(StreamView::from(&conversion)))
}

async fn stop_stream(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Result<Json<StreamView>, AppError> {
    let id = parse_stream_id(&id)?;
    let conversion = ctx.orchestrator.stop(id).await?;
    Ok(Json(StreamView::from(&conversion)))
}

async fn purge_stream(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let id = parse_stream_id(&id)?;
    ctx.orchestrator.purge(id).await?;
    Ok(Json(json!({ "purged": id })))
}

/// Availability of the transcoding engine.
async fn list_tools(State(ctx): State<AppContext>) -> Result<Json<Vec<ToolInfo>>, AppError> {
    let program = ctx.orchestrator.transcoder().program().to_path_buf();
    let tools = tokio::task::spawn_blocking(move || hlsrelay_av::check_tools(Some(program.as_path())))
        .await
        .map_err(|e| Error::internal(format!("tool check failed: {e}")))?;
    Ok(Json(tools))
}
