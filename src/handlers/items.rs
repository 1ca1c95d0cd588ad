// handlers/items.rs - /api/items/*
//
// Reads are open to anonymous callers. Mutations receive the optional
// caller and let the gateway decide.

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::app::AppState;
use crate::auth::CallerContext;
use crate::database::{ItemInput, ItemPatch};
use crate::error::ApiError;
use crate::gateway::ItemView;
use crate::geo::{BoundingRegion, Point};
use crate::middleware::{ApiResponse, ApiResult};

/// Corners of a box, each given as `lat,lng`
#[derive(Debug, Deserialize)]
pub struct AreaQuery {
    pub top_right: String,
    pub bottom_left: String,
}

fn parse_id(id: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(id).map_err(|_| ApiError::bad_request(format!("invalid item id '{}'", id)))
}

fn parse_point(raw: &str) -> Result<Point, ApiError> {
    let invalid = || ApiError::InvalidRegion(format!("expected 'lat,lng', got '{}'", raw));
    let (lat, lng) = raw.split_once(',').ok_or_else(invalid)?;
    let lat = lat.trim().parse::<f64>().map_err(|_| invalid())?;
    let lng = lng.trim().parse::<f64>().map_err(|_| invalid())?;
    Ok(Point::new(lat, lng))
}

/// GET /api/items
pub async fn list(State(state): State<AppState>) -> ApiResult<Vec<ItemView>> {
    Ok(ApiResponse::success(state.gateway.list_items().await?))
}

/// GET /api/items/:id
pub async fn get(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<ItemView> {
    let id = parse_id(&id)?;
    Ok(ApiResponse::success(state.gateway.get_item(id).await?))
}

/// GET /api/items/owner/:owner_id
pub async fn list_by_owner(
    State(state): State<AppState>,
    Path(owner_id): Path<String>,
) -> ApiResult<Vec<ItemView>> {
    Ok(ApiResponse::success(
        state.gateway.list_items_by_owner(&owner_id).await?,
    ))
}

/// GET /api/items/mine
pub async fn list_mine(
    State(state): State<AppState>,
    caller: Option<Extension<CallerContext>>,
) -> ApiResult<Vec<ItemView>> {
    let caller = caller.map(|Extension(c)| c);
    Ok(ApiResponse::success(
        state.gateway.list_my_items(caller.as_ref()).await?,
    ))
}

/// GET /api/items/area?top_right=lat,lng&bottom_left=lat,lng
pub async fn list_in_box(
    State(state): State<AppState>,
    Query(query): Query<AreaQuery>,
) -> ApiResult<Vec<ItemView>> {
    let region = BoundingRegion::from_corners(
        parse_point(&query.top_right)?,
        parse_point(&query.bottom_left)?,
    );
    Ok(ApiResponse::success(
        state.gateway.list_items_by_region(&region).await?,
    ))
}

/// POST /api/items/area with a tagged box or polygon body
pub async fn list_in_region(
    State(state): State<AppState>,
    Json(region): Json<BoundingRegion>,
) -> ApiResult<Vec<ItemView>> {
    Ok(ApiResponse::success(
        state.gateway.list_items_by_region(&region).await?,
    ))
}

/// POST /api/items
pub async fn create(
    State(state): State<AppState>,
    caller: Option<Extension<CallerContext>>,
    Json(input): Json<ItemInput>,
) -> ApiResult<ItemView> {
    let caller = caller.map(|Extension(c)| c);
    let created = state.gateway.create_item(caller.as_ref(), input).await?;
    Ok(ApiResponse::created(created))
}

/// PUT /api/items/:id
pub async fn update(
    State(state): State<AppState>,
    caller: Option<Extension<CallerContext>>,
    Path(id): Path<String>,
    Json(patch): Json<ItemPatch>,
) -> ApiResult<ItemView> {
    let id = parse_id(&id)?;
    let caller = caller.map(|Extension(c)| c);
    Ok(ApiResponse::success(
        state.gateway.update_item(caller.as_ref(), id, patch).await?,
    ))
}

/// DELETE /api/items/:id
pub async fn delete(
    State(state): State<AppState>,
    caller: Option<Extension<CallerContext>>,
    Path(id): Path<String>,
) -> ApiResult<ItemView> {
    let id = parse_id(&id)?;
    let caller = caller.map(|Extension(c)| c);
    Ok(ApiResponse::success(
        state.gateway.delete_item(caller.as_ref(), id).await?,
    ))
}
