//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the notes endpoints and the master
//! definition for the OpenAPI specification.

use crate::error::ApiResult;
use crate::web::{auth, profile, state::AppState};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use chrono::{DateTime, Utc};
use notes_core::{Category, Note, NoteDraft, NoteId, NoteUpdate, StoreSnapshot, User};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::{OpenApi, ToSchema};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        health_handler,
        auth::signup_handler,
        auth::login_handler,
        auth::logout_handler,
        auth::current_user_handler,
        list_notes_handler,
        create_note_handler,
        refresh_notes_handler,
        update_note_handler,
        delete_note_handler,
        profile::get_profile_handler,
        profile::update_profile_handler,
        profile::upload_avatar_handler,
        profile::avatar_url_handler,
    ),
    components(
        schemas(
            auth::SignupRequest,
            auth::LoginRequest,
            auth::AuthResponse,
            auth::SignupResponse,
            NoteView,
            CategoryView,
            NotesResponse,
            CreateNoteRequest,
            UpdateNoteRequest,
            profile::ProfileResponse,
            profile::UpdateProfileRequest,
            profile::AvatarResponse,
        )
    ),
    tags(
        (name = "Notes API", description = "Notes, categories and profile for the signed-in user.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// A note as shown to the client, with its category name resolved.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct NoteView {
    pub id: NoteId,
    pub title: String,
    pub content: String,
    pub category_id: Option<i64>,
    /// `None` for uncategorized notes and for categories that no longer exist.
    pub category_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl NoteView {
    fn new(note: &Note, snapshot: &StoreSnapshot) -> Self {
        Self {
            id: note.id,
            title: note.title.clone(),
            content: note.content.clone(),
            category_id: note.category_id,
            category_name: snapshot.category_name(note).map(str::to_string),
            created_at: note.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CategoryView {
    pub id: i64,
    pub name: String,
}

impl From<&Category> for CategoryView {
    fn from(category: &Category) -> Self {
        Self {
            id: category.id,
            name: category.name.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct NotesResponse {
    pub loading: bool,
    /// Newest first.
    pub notes: Vec<NoteView>,
    /// Ordered by name.
    pub categories: Vec<CategoryView>,
}

impl From<&StoreSnapshot> for NotesResponse {
    fn from(snapshot: &StoreSnapshot) -> Self {
        Self {
            loading: snapshot.loading,
            notes: snapshot
                .notes
                .iter()
                .map(|n| NoteView::new(n, snapshot))
                .collect(),
            categories: snapshot.categories.iter().map(CategoryView::from).collect(),
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateNoteRequest {
    pub title: String,
    #[serde(default)]
    pub content: String,
    /// Category id as entered; blank for no category.
    #[serde(default)]
    pub category_id: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateNoteRequest {
    pub title: String,
    #[serde(default)]
    pub content: String,
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Liveness probe.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up"))
)]
pub async fn health_handler() -> &'static str {
    "ok"
}

/// The cached notes and categories of the signed-in user.
#[utoipa::path(
    get,
    path = "/notes",
    responses(
        (status = 200, description = "Current cache", body = NotesResponse),
        (status = 401, description = "Not signed in")
    )
)]
pub async fn list_notes_handler(State(state): State<Arc<AppState>>) -> Json<NotesResponse> {
    Json(NotesResponse::from(&state.store.snapshot()))
}

/// Re-fetches notes and categories from the backend.
#[utoipa::path(
    post,
    path = "/notes/refresh",
    responses(
        (status = 200, description = "Freshly loaded cache", body = NotesResponse),
        (status = 401, description = "Not signed in")
    )
)]
pub async fn refresh_notes_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> Json<NotesResponse> {
    state.store.load(&user).await;
    Json(NotesResponse::from(&state.store.snapshot()))
}

/// Creates a note for the signed-in user.
#[utoipa::path(
    post,
    path = "/notes",
    request_body = CreateNoteRequest,
    responses(
        (status = 201, description = "Note created", body = NoteView),
        (status = 400, description = "Rejected by the backend"),
        (status = 401, description = "Not signed in"),
        (status = 422, description = "Missing title or invalid category")
    )
)]
pub async fn create_note_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(req): Json<CreateNoteRequest>,
) -> ApiResult<impl IntoResponse> {
    let draft = NoteDraft {
        title: req.title,
        content: req.content,
        category_id: req.category_id,
        user_id: user.id,
    };
    let note = state.store.create(draft).await?;
    info!(user_id = %user.id, note_id = note.id, "Note created");

    let view = NoteView::new(&note, &state.store.snapshot());
    Ok((StatusCode::CREATED, Json(view)))
}

/// Replaces a note's title and content.
#[utoipa::path(
    put,
    path = "/notes/{id}",
    request_body = UpdateNoteRequest,
    params(("id" = i64, Path, description = "Note id")),
    responses(
        (status = 200, description = "Note updated", body = NoteView),
        (status = 409, description = "Another change to this note is in progress"),
        (status = 422, description = "Missing title")
    )
)]
pub async fn update_note_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<NoteId>,
    Json(req): Json<UpdateNoteRequest>,
) -> ApiResult<Json<NoteView>> {
    let update = NoteUpdate {
        title: req.title,
        content: req.content,
    };
    let note = state.store.update(id, update).await?;
    Ok(Json(NoteView::new(&note, &state.store.snapshot())))
}

/// Deletes a note.
#[utoipa::path(
    delete,
    path = "/notes/{id}",
    params(("id" = i64, Path, description = "Note id")),
    responses(
        (status = 204, description = "Note deleted"),
        (status = 409, description = "Another change to this note is in progress")
    )
)]
pub async fn delete_note_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<NoteId>,
) -> ApiResult<StatusCode> {
    state.store.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
