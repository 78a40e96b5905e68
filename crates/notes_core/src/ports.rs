//! crates/notes_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture: the hosted
//! backend (auth, tables, object storage) sits behind them, so the store and
//! the session/profile flows never depend on a concrete client.
//!
//! Authorization is enforced by the backend (row-level security). The
//! `user_id` filters used here only narrow what is fetched.

use async_trait::async_trait;

use crate::domain::{
    Category, NewNote, Note, NoteId, NoteUpdate, Profile, ProfileChanges, User, UserId,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., network, backend).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Unauthorized")]
    Unauthorized,
    /// The service refused the request; carries its message verbatim.
    #[error("{0}")]
    Rejected(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait AuthService: Send + Sync {
    /// Registers a new account. Returns `None` when the backend wants the
    /// e-mail confirmed before it hands out a session.
    async fn sign_up(&self, email: &str, password: &str) -> PortResult<Option<User>>;

    async fn sign_in_with_password(&self, email: &str, password: &str) -> PortResult<User>;

    async fn sign_out(&self) -> PortResult<()>;

    /// Resolves the user behind the current session, if there is one.
    async fn current_user(&self) -> PortResult<Option<User>>;

    /// Exchanges the refresh token for a new session.
    async fn refresh_session(&self) -> PortResult<Option<User>>;
}

#[async_trait]
pub trait DataService: Send + Sync {
    // --- Notes ---
    /// Notes owned by `user_id`, newest first.
    async fn list_notes(&self, user_id: UserId) -> PortResult<Vec<Note>>;

    /// Inserts a note and returns the persisted row.
    async fn insert_note(&self, note: &NewNote) -> PortResult<Note>;

    /// Updates title/content and returns the persisted row.
    async fn update_note(&self, note_id: NoteId, update: &NoteUpdate) -> PortResult<Note>;

    /// Deletes by id. Deleting an id that does not exist is not an error.
    async fn delete_note(&self, note_id: NoteId) -> PortResult<()>;

    // --- Categories ---
    /// Categories owned by `user_id`, ordered by name.
    async fn list_categories(&self, user_id: UserId) -> PortResult<Vec<Category>>;

    // --- Profiles ---
    async fn get_profile(&self, user_id: UserId) -> PortResult<Option<Profile>>;

    async fn upsert_profile(&self, changes: &ProfileChanges) -> PortResult<()>;
}

#[async_trait]
pub trait StorageService: Send + Sync {
    /// Stores `bytes` at `path`, replacing whatever was there.
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> PortResult<()>;

    async fn download(&self, bucket: &str, path: &str) -> PortResult<Vec<u8>>;
}
