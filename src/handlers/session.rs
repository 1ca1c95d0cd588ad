// handlers/session.rs - login and token check

use axum::{extract::State, Extension, Json};

use crate::app::AppState;
use crate::auth::CallerContext;
use crate::identity::{Credentials, Identity, Session};
use crate::middleware::{ApiResponse, ApiResult};

/**
 * POST /api/auth/login - Exchange credentials for a token
 *
 * Input: `{ "username": "...", "password": "..." }`
 * Output: `{ "success": true, "data": { "token": "...", "user": {...} } }`
 *
 * The identity service issues the token; 401 on bad credentials.
 */
pub async fn login(
    State(state): State<AppState>,
    Json(credentials): Json<Credentials>,
) -> ApiResult<Session> {
    Ok(ApiResponse::success(state.gateway.login(&credentials).await?))
}

/// GET /api/auth/whoami
pub async fn whoami(
    State(state): State<AppState>,
    caller: Option<Extension<CallerContext>>,
) -> ApiResult<Identity> {
    let caller = caller.map(|Extension(c)| c);
    Ok(ApiResponse::success(
        state.gateway.check_token(caller.as_ref()).await?,
    ))
}
