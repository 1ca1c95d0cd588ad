use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::app::AppState;
use crate::auth::verify_token;
use crate::error::ApiError;

/// Resolve the caller from the bearer token, if any.
///
/// No Authorization header means an anonymous request; handlers decide
/// whether that is acceptable. A header that is present but does not verify
/// is rejected here with 401.
pub async fn caller_context_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Response {
    let token = match extract_jwt_from_headers(&headers) {
        Ok(Some(token)) => token,
        Ok(None) => return next.run(request).await,
        Err(msg) => return ApiError::unauthorized(msg).into_response(),
    };

    match verify_token(&token, &state.jwt_secret) {
        Ok(caller) => {
            tracing::debug!("Request authenticated as {}", caller.id);
            request.extensions_mut().insert(caller);
            next.run(request).await
        }
        Err(e) => ApiError::from(e).into_response(),
    }
}

/// Extract JWT token from Authorization header
fn extract_jwt_from_headers(headers: &HeaderMap) -> Result<Option<String>, String> {
    let Some(auth_header) = headers.get(axum::http::header::AUTHORIZATION) else {
        return Ok(None);
    };

    let auth_str = auth_header
        .to_str()
        .map_err(|_| "Invalid Authorization header format".to_string())?;

    if let Some(token) = auth_str.strip_prefix("Bearer ") {
        if token.trim().is_empty() {
            return Err("Empty JWT token".to_string());
        }
        Ok(Some(token.trim().to_string()))
    } else {
        Err("Authorization header must use Bearer token format".to_string())
    }
}
