// handlers/users.rs - /api/users/* pass-through to the identity service

use axum::{
    extract::{Path, State},
    Extension, Json,
};

use crate::app::AppState;
use crate::auth::CallerContext;
use crate::identity::{Identity, UserInput};
use crate::middleware::{ApiResponse, ApiResult};

/// GET /api/users
pub async fn list(State(state): State<AppState>) -> ApiResult<Vec<Identity>> {
    Ok(ApiResponse::success(state.gateway.list_users().await?))
}

/// GET /api/users/:id
pub async fn get(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Identity> {
    Ok(ApiResponse::success(state.gateway.get_user(&id).await?))
}

/// POST /api/users
pub async fn register(
    State(state): State<AppState>,
    Json(input): Json<UserInput>,
) -> ApiResult<Identity> {
    Ok(ApiResponse::created(state.gateway.register(&input).await?))
}

/// PUT /api/users - update the caller's own identity
pub async fn update_self(
    State(state): State<AppState>,
    caller: Option<Extension<CallerContext>>,
    Json(input): Json<UserInput>,
) -> ApiResult<Identity> {
    let caller = caller.map(|Extension(c)| c);
    Ok(ApiResponse::success(
        state.gateway.update_user(caller.as_ref(), &input).await?,
    ))
}

/// DELETE /api/users - delete the caller's own identity
pub async fn delete_self(
    State(state): State<AppState>,
    caller: Option<Extension<CallerContext>>,
) -> ApiResult<Identity> {
    let caller = caller.map(|Extension(c)| c);
    Ok(ApiResponse::success(
        state.gateway.delete_user(caller.as_ref()).await?,
    ))
}

/// DELETE /api/users/:id - admin only
pub async fn delete(
    State(state): State<AppState>,
    caller: Option<Extension<CallerContext>>,
    Path(id): Path<String>,
) -> ApiResult<Identity> {
    let caller = caller.map(|Extension(c)| c);
    Ok(ApiResponse::success(
        state.gateway.delete_user_as_admin(caller.as_ref(), &id).await?,
    ))
}
