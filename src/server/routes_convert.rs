//! RTSP conversion endpoint.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;

use super::error::AppError;
use super::AppContext;
use crate::conversion::Converted;

#[derive(Debug, Deserialize)]
pub struct ConvertRequest {
    pub rtsp_url: Option<String>,
}

pub fn convert_routes() -> Router<AppContext> {
    Router::new().route("/convert", post(convert))
}

/// Start a conversion and answer once its playlist is playable.
async fn convert(
    State(ctx): State<AppContext>,
    payload: Result<Json<ConvertRequest>, JsonRejection>,
) -> Result<Json<Converted>, AppError> {
    let Json(request) = payload?;
    let rtsp_url = request.rtsp_url.unwrap_or_default();

    let converted = ctx.orchestrator.convert(&rtsp_url).await?;
    Ok(Json(converted))
}
