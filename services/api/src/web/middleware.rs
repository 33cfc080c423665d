//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::error;

use crate::web::{state::AppState, token};

/// Middleware that validates the bearer token and loads the calling user.
///
/// If valid, inserts the `User` into request extensions for handlers to use.
/// If missing, malformed, expired, or pointing at a user that no longer
/// exists, returns 401 Unauthorized.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    // 1. Extract the Authorization header
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    // 2. Parse the bearer token out of it
    let bearer_token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(StatusCode::UNAUTHORIZED)?;

    // 3. Verify signature and expiry, yielding the embedded user id
    let user_id = token::verify(bearer_token, &state.config.jwt_secret)
        .ok_or(StatusCode::UNAUTHORIZED)?;

    // 4. A valid token for a vanished user is still unauthorized
    let user = state.db.get_user_by_id(user_id).await.map_err(|e| {
        error!("Failed to resolve authenticated user: {:?}", e);
        StatusCode::UNAUTHORIZED
    })?;

    // 5. Insert the user into request extensions
    req.extensions_mut().insert(user);

    // 6. Continue to the handler
    Ok(next.run(req).await)
}
