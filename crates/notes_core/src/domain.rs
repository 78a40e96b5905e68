//! crates/notes_core/src/domain.rs
//!
//! Defines the core data structures for the application.
//! The serde derives mirror the row shapes the hosted backend returns, so the
//! adapters can decode straight into these types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier the backend assigns to an authenticated user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub Uuid);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Service-assigned note identifier.
pub type NoteId = i64;

/// Service-assigned category identifier.
pub type CategoryId = i64;

// Represents the signed-in user - used throughout app
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: Option<String>,
}

/// A note as persisted by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,
    pub title: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub content: String,
    pub category_id: Option<CategoryId>,
    pub created_at: DateTime<Utc>,
    pub user_id: UserId,
}

/// What the create form submits. `category_id` is still in its textual form.
#[derive(Debug, Clone)]
pub struct NoteDraft {
    pub title: String,
    pub content: String,
    pub category_id: String,
    pub user_id: UserId,
}

/// A validated insert payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewNote {
    pub title: String,
    pub content: String,
    pub category_id: Option<CategoryId>,
    pub user_id: UserId,
}

/// The only fields an edit may touch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteUpdate {
    pub title: String,
    pub content: String,
}

/// A category. Read-only from this application's point of view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub user_id: UserId,
}

/// One-to-one with [`User`]. `avatar_url` is a storage path, not a browsable URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: UserId,
    pub full_name: Option<String>,
    pub username: Option<String>,
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Insert-or-replace payload for a profile row.
///
/// Unset fields are left out of the request body so the backend keeps the
/// stored value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileChanges {
    pub id: UserId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// An image picked for upload.
#[derive(Debug, Clone)]
pub struct AvatarFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Sign-in/sign-out transitions published by the session provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn(User),
    SignedOut,
    TokenRefreshed(User),
}

impl AuthEvent {
    /// The user this event leaves signed in, if any.
    pub fn user(&self) -> Option<&User> {
        match self {
            AuthEvent::SignedIn(user) | AuthEvent::TokenRefreshed(user) => Some(user),
            AuthEvent::SignedOut => None,
        }
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}
