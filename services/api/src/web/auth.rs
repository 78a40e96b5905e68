//! services/api/src/web/auth.rs
//!
//! Authentication endpoints for user signup, login, and logout.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use notes_core::User;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct AuthResponse {
    pub user_id: Uuid,
    pub email: Option<String>,
}

impl From<&User> for AuthResponse {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id.0,
            email: user.email.clone(),
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct SignupResponse {
    /// Present when the account is usable right away.
    pub user: Option<AuthResponse>,
    /// True when the backend wants the email confirmed before sign-in.
    pub confirmation_required: bool,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /auth/signup - Create a new user account
#[utoipa::path(
    post,
    path = "/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "User created", body = SignupResponse),
        (status = 400, description = "Rejected by the auth service"),
        (status = 502, description = "Auth service unavailable")
    )
)]
pub async fn signup_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignupRequest>,
) -> ApiResult<impl IntoResponse> {
    let email = required_field(&req.email, "email")?;
    let user = state.session.sign_up(email, &req.password).await?;
    if let Some(user) = &user {
        state.store.follow(Some(user));
    }

    let response = SignupResponse {
        confirmation_required: user.is_none(),
        user: user.as_ref().map(AuthResponse::from),
    };
    Ok((StatusCode::CREATED, Json(response)))
}

/// POST /auth/login - Login with existing account
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 400, description = "Invalid credentials"),
        (status = 502, description = "Auth service unavailable")
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let email = required_field(&req.email, "email")?;
    let user = state.session.sign_in(email, &req.password).await?;
    state.store.follow(Some(&user));
    info!(user_id = %user.id, "User logged in");
    Ok(Json(AuthResponse::from(&user)))
}

/// POST /auth/logout - Logout and end the session
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 204, description = "Logout successful")
    )
)]
pub async fn logout_handler(State(state): State<Arc<AppState>>) -> ApiResult<StatusCode> {
    state.session.sign_out().await?;
    state.store.follow(None);
    Ok(StatusCode::NO_CONTENT)
}

/// GET /auth/user - The signed-in user, if any
#[utoipa::path(
    get,
    path = "/auth/user",
    responses(
        (status = 200, description = "Signed in", body = AuthResponse),
        (status = 401, description = "No signed-in user")
    )
)]
pub async fn current_user_handler(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<AuthResponse>> {
    let user = state
        .session
        .current_user()
        .await
        .ok_or(ApiError::Unauthorized)?;
    Ok(Json(AuthResponse::from(&user)))
}

fn required_field<'a>(value: &'a str, name: &str) -> ApiResult<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ApiError::BadRequest(format!("{} is required", name)));
    }
    Ok(value)
}
