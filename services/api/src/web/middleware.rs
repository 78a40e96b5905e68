//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use crate::error::ApiError;
use crate::web::state::AppState;

/// Middleware that resolves the signed-in user from the session provider.
///
/// If there is one, the notes store is handed to that user and the `User` is
/// inserted into request extensions for handlers to use. Otherwise the request
/// is rejected with 401 Unauthorized.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user = state
        .session
        .current_user()
        .await
        .ok_or(ApiError::Unauthorized)?;

    // The cache must belong to this user before any handler reads it.
    state.store.follow(Some(&user));
    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}
