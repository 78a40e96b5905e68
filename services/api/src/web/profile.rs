//! services/api/src/web/profile.rs
//!
//! Profile and avatar endpoints for the signed-in user.

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    Extension, Json,
};
use notes_core::{AvatarFile, ProfileError, User};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::error::{ApiError, ApiResult};
use crate::web::state::AppState;

/// Multipart field carrying the image.
const AVATAR_FIELD: &str = "avatar";

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProfileResponse {
    pub email: Option<String>,
    pub full_name: String,
    pub username: String,
    /// Storage path of the avatar, not a URL.
    pub avatar_url: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateProfileRequest {
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub username: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AvatarResponse {
    pub avatar_url: Option<String>,
    /// A `data:` URL ready to be used as an image source.
    pub display_url: Option<String>,
}

/// The signed-in user's profile. A user who never saved one gets empty fields.
#[utoipa::path(
    get,
    path = "/profile",
    responses(
        (status = 200, description = "Profile", body = ProfileResponse),
        (status = 401, description = "Not signed in")
    )
)]
pub async fn get_profile_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> ApiResult<Json<ProfileResponse>> {
    let profile = state.profiles.load(user.id).await?;
    let response = match profile {
        Some(p) => ProfileResponse {
            email: user.email,
            full_name: p.full_name.unwrap_or_default(),
            username: p.username.unwrap_or_default(),
            avatar_url: p.avatar_url,
        },
        None => ProfileResponse {
            email: user.email,
            full_name: String::new(),
            username: String::new(),
            avatar_url: None,
        },
    };
    Ok(Json(response))
}

/// Saves the name fields.
#[utoipa::path(
    put,
    path = "/profile",
    request_body = UpdateProfileRequest,
    responses(
        (status = 204, description = "Profile saved"),
        (status = 400, description = "Rejected by the backend"),
        (status = 401, description = "Not signed in")
    )
)]
pub async fn update_profile_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(req): Json<UpdateProfileRequest>,
) -> ApiResult<StatusCode> {
    state
        .profiles
        .save(&user, req.full_name, req.username)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Uploads a new avatar and records it on the profile.
///
/// A failed upload leaves the profile without an avatar and still answers 200
/// with `avatar_url: null`.
#[utoipa::path(
    post,
    path = "/profile/avatar",
    request_body(content_type = "multipart/form-data", description = "Image in the `avatar` field."),
    responses(
        (status = 200, description = "Avatar saved", body = AvatarResponse),
        (status = 400, description = "No file or no file extension"),
        (status = 401, description = "Not signed in")
    )
)]
pub async fn upload_avatar_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    mut multipart: Multipart,
) -> ApiResult<Json<AvatarResponse>> {
    let mut file = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Failed to read multipart data: {}", e)))?
    {
        if field.name() != Some(AVATAR_FIELD) {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read file bytes: {}", e)))?;
        if !bytes.is_empty() {
            file = Some(AvatarFile {
                file_name,
                bytes: bytes.to_vec(),
            });
        }
        break;
    }

    let file = file.ok_or(ProfileError::NoFileSelected)?;
    let avatar_url = state.profiles.save_avatar(&user, file).await?;
    let display_url = match &avatar_url {
        Some(path) => state.profiles.resolve_display_url(path).await,
        None => None,
    };
    Ok(Json(AvatarResponse {
        avatar_url,
        display_url,
    }))
}

/// The current avatar as a displayable URL.
#[utoipa::path(
    get,
    path = "/profile/avatar",
    responses(
        (status = 200, description = "Avatar, if any", body = AvatarResponse),
        (status = 401, description = "Not signed in")
    )
)]
pub async fn avatar_url_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> ApiResult<Json<AvatarResponse>> {
    let avatar_url = state
        .profiles
        .load(user.id)
        .await?
        .and_then(|p| p.avatar_url)
        .filter(|path| !path.is_empty());
    let display_url = match &avatar_url {
        Some(path) => state.profiles.resolve_display_url(path).await,
        None => None,
    };
    Ok(Json(AvatarResponse {
        avatar_url,
        display_url,
    }))
}
