//! services/api/src/adapters/auth.rs
//!
//! This module contains the adapter for the hosted backend's auth endpoints.
//! It implements the `AuthService` port from the `core` crate and keeps the
//! resulting session on the shared [`SupabaseClient`].

use async_trait::async_trait;
use chrono::Utc;
use notes_core::ports::{AuthService, PortResult};
use notes_core::User;
use reqwest::RequestBuilder;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use super::supabase::{SupabaseClient, TokenResponse, UserRecord};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the `AuthService` port over the `/auth/v1` API.
#[derive(Clone)]
pub struct SupabaseAuthAdapter {
    client: SupabaseClient,
}

impl SupabaseAuthAdapter {
    /// Creates a new `SupabaseAuthAdapter`.
    pub fn new(client: SupabaseClient) -> Self {
        Self { client }
    }

    fn token_request(&self, grant_type: &str, body: serde_json::Value) -> RequestBuilder {
        let request = self
            .client
            .http()
            .post(self.client.url("/auth/v1/token"))
            .query(&[("grant_type", grant_type)])
            .json(&body);
        self.client.anonymous(request)
    }

    async fn start_session(&self, tokens: TokenResponse) -> User {
        let session = tokens.into_session();
        let user = session.user.clone();
        self.client.set_session(Some(session)).await;
        user
    }
}

/// Sign-up answers with a full session when e-mail confirmation is off, and
/// with just the user record when it is on.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SignUpResponse {
    Session(TokenResponse),
    Pending(UserRecord),
}

//=========================================================================================
// `AuthService` Trait Implementation
//=========================================================================================

#[async_trait]
impl AuthService for SupabaseAuthAdapter {
    async fn sign_up(&self, email: &str, password: &str) -> PortResult<Option<User>> {
        let request = self
            .client
            .http()
            .post(self.client.url("/auth/v1/signup"))
            .json(&json!({ "email": email, "password": password }));
        let request = self.client.anonymous(request);

        match self.client.send_json::<SignUpResponse>(request).await? {
            SignUpResponse::Session(tokens) => Ok(Some(self.start_session(tokens).await)),
            SignUpResponse::Pending(record) => {
                debug!(user_id = %record.id, "Sign-up pending confirmation");
                Ok(None)
            }
        }
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> PortResult<User> {
        let request = self.token_request("password", json!({ "email": email, "password": password }));
        let tokens: TokenResponse = self.client.send_json(request).await?;
        Ok(self.start_session(tokens).await)
    }

    async fn sign_out(&self) -> PortResult<()> {
        // The local session goes first so a failed revoke still signs out here.
        let Some(session) = self.client.take_session().await else {
            return Ok(());
        };
        let request = self.client.with_token(
            self.client.http().post(self.client.url("/auth/v1/logout")),
            &session.access_token,
        );

        if let Err(e) = self.client.send_for_session(request).await {
            warn!(error = %e, "Failed to revoke the session on the backend");
        }
        Ok(())
    }

    async fn current_user(&self) -> PortResult<Option<User>> {
        let Some(session) = self.client.session().await else {
            return Ok(None);
        };
        if session.expires_at <= Utc::now() {
            debug!("Access token expired; refreshing before lookup");
            return self.refresh_session().await;
        }
        let request = self.client.http().get(self.client.url("/auth/v1/user"));
        let request = self.client.authorize(request).await;

        let Some(response) = self.client.send_for_session(request).await? else {
            warn!("Session rejected by the backend; clearing it");
            self.client.set_session(None).await;
            return Ok(None);
        };
        let record: UserRecord = SupabaseClient::decode(response).await?;
        Ok(Some(record.to_domain()))
    }

    async fn refresh_session(&self) -> PortResult<Option<User>> {
        let Some(session) = self.client.session().await else {
            return Ok(None);
        };
        let request = self.token_request(
            "refresh_token",
            json!({ "refresh_token": session.refresh_token }),
        );
        let Some(response) = self.client.send_for_session(request).await? else {
            warn!("Refresh token rejected; session lost");
            self.client.set_session(None).await;
            return Ok(None);
        };
        let tokens: TokenResponse = SupabaseClient::decode(response).await?;
        Ok(Some(self.start_session(tokens).await))
    }
}
