//! services/api/src/adapters/db.rs
//!
//! This module contains the table adapter, which is the concrete implementation
//! of the `DataService` port from the `core` crate. It talks to the hosted
//! backend's PostgREST endpoint (`/rest/v1`).

use async_trait::async_trait;
use notes_core::domain::{Category, NewNote, Note, NoteId, NoteUpdate, Profile, ProfileChanges, UserId};
use notes_core::ports::{DataService, PortResult};
use reqwest::RequestBuilder;

use super::supabase::SupabaseClient;

const NOTES: &str = "notes";
const CATEGORIES: &str = "categories";
const PROFILES: &str = "profiles";

/// Makes PostgREST answer with a single object instead of an array.
const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A table adapter that implements the `DataService` port.
#[derive(Clone)]
pub struct DbAdapter {
    client: SupabaseClient,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(client: SupabaseClient) -> Self {
        Self { client }
    }

    fn table(&self, table: &str) -> String {
        self.client.url(&format!("/rest/v1/{}", table))
    }

    /// Asks for the written row back as one JSON object.
    fn echo_single(request: RequestBuilder) -> RequestBuilder {
        request
            .header("Prefer", "return=representation")
            .header("Accept", SINGLE_OBJECT)
    }
}

/// PostgREST equality filter value.
fn eq(value: impl std::fmt::Display) -> String {
    format!("eq.{}", value)
}

//=========================================================================================
// `DataService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DataService for DbAdapter {
    async fn list_notes(&self, user_id: UserId) -> PortResult<Vec<Note>> {
        let request = self.client.http().get(self.table(NOTES)).query(&[
            ("select", "*".to_string()),
            ("user_id", eq(user_id)),
            ("order", "created_at.desc".to_string()),
        ]);
        let request = self.client.authorize(request).await;
        self.client.send_json(request).await
    }

    async fn insert_note(&self, note: &NewNote) -> PortResult<Note> {
        let request = Self::echo_single(self.client.http().post(self.table(NOTES)).json(note));
        let request = self.client.authorize(request).await;
        self.client.send_json(request).await
    }

    async fn update_note(&self, note_id: NoteId, update: &NoteUpdate) -> PortResult<Note> {
        let request = self
            .client
            .http()
            .patch(self.table(NOTES))
            .query(&[("id", eq(note_id))])
            .json(update);
        let request = self.client.authorize(Self::echo_single(request)).await;
        self.client.send_json(request).await
    }

    async fn delete_note(&self, note_id: NoteId) -> PortResult<()> {
        let request = self
            .client
            .http()
            .delete(self.table(NOTES))
            .query(&[("id", eq(note_id))]);
        let request = self.client.authorize(request).await;
        self.client.send(request).await?;
        Ok(())
    }

    async fn list_categories(&self, user_id: UserId) -> PortResult<Vec<Category>> {
        let request = self.client.http().get(self.table(CATEGORIES)).query(&[
            ("select", "*".to_string()),
            ("user_id", eq(user_id)),
            ("order", "name.asc".to_string()),
        ]);
        let request = self.client.authorize(request).await;
        self.client.send_json(request).await
    }

    async fn get_profile(&self, user_id: UserId) -> PortResult<Option<Profile>> {
        let request = self
            .client
            .http()
            .get(self.table(PROFILES))
            .query(&[("select", "*".to_string()), ("id", eq(user_id))]);
        let request = self.client.authorize(request).await;
        let rows: Vec<Profile> = self.client.send_json(request).await?;
        Ok(rows.into_iter().next())
    }

    async fn upsert_profile(&self, changes: &ProfileChanges) -> PortResult<()> {
        // Only the columns present in the body are overwritten on conflict.
        let request = self
            .client
            .http()
            .post(self.table(PROFILES))
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(changes);
        let request = self.client.authorize(request).await;
        self.client.send(request).await?;
        Ok(())
    }
}
