//! Overlay CRUD endpoints.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use hlsrelay_db::models::Overlay;
use serde::Deserialize;
use serde_json::{json, Value};

use super::error::AppError;
use super::AppContext;
use crate::overlays::{CreateOverlay, UpdateOverlay};

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub stream_id: Option<String>,
}

pub fn overlay_routes() -> Router<AppContext> {
    Router::new()
        .route("/overlays", get(list_overlays).post(create_overlay))
        .route(
            "/overlays/:id",
            get(get_overlay).put(update_overlay).delete(delete_overlay),
        )
}

async fn list_overlays(
    State(ctx): State<AppContext>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Result<Json<Vec<Overlay>>, AppError> {
    let Query(query) = query?;
    Ok(Json(ctx.overlays.list(query.stream_id.as_deref())?))
}

async fn create_overlay(
    State(ctx): State<AppContext>,
    payload: Result<Json<CreateOverlay>, JsonRejection>,
) -> Result<(StatusCode, Json<Overlay>), AppError> {
    let Json(request) = payload?;
    let overlay = ctx.overlays.create(request)?;
    Ok((StatusCode::CREATED, Json(overlay)))
}

async fn get_overlay(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Result<Json<Overlay>, AppError> {
    Ok(Json(ctx.overlays.get(&id)?))
}

async fn update_overlay(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateOverlay>, JsonRejection>,
) -> Result<Json<Overlay>, AppError> {
    let Json(request) = payload?;
    Ok(Json(ctx.overlays.update(&id, request)?))
}

async fn delete_overlay(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let id = ctx.overlays.delete(&id)?;
    Ok(Json(json!({ "deleted": id })))
}
