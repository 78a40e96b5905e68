//! services/api/src/adapters/supabase.rs
//!
//! The HTTP client shared by every hosted-backend adapter. It carries the
//! project URL, the public API key and the current auth session, so table
//! and storage calls go out with the signed-in user's token.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use notes_core::{PortError, PortResult, User, UserId};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use uuid::Uuid;

//=========================================================================================
// Session State
//=========================================================================================

/// Tokens for the signed-in user. Never leaves this crate.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub user: User,
}

/// The user object the auth endpoints return.
#[derive(Debug, Deserialize)]
pub struct UserRecord {
    pub id: Uuid,
    pub email: Option<String>,
}

impl UserRecord {
    pub fn to_domain(self) -> User {
        User {
            id: UserId(self.id),
            email: self.email,
        }
    }
}

/// Body of a successful password or refresh-token grant.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    pub user: UserRecord,
}

impl TokenResponse {
    pub fn into_session(self) -> AuthSession {
        AuthSession {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at: Utc::now() + ChronoDuration::seconds(self.expires_in),
            user: self.user.to_domain(),
        }
    }
}

//=========================================================================================
// The Shared Client
//=========================================================================================

#[derive(Clone)]
pub struct SupabaseClient {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
    session: Arc<RwLock<Option<AuthSession>>>,
}

impl SupabaseClient {
    /// Creates a client whose every request is bounded by `timeout`.
    pub fn new(base_url: &str, anon_key: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
            session: Arc::new(RwLock::new(None)),
        })
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn session(&self) -> Option<AuthSession> {
        self.session.read().await.clone()
    }

    pub async fn set_session(&self, session: Option<AuthSession>) {
        *self.session.write().await = session;
    }

    pub async fn take_session(&self) -> Option<AuthSession> {
        self.session.write().await.take()
    }

    /// Adds the API key and a bearer token: the user's access token when
    /// signed in, the public key otherwise.
    pub async fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let token = match self.session.read().await.as_ref() {
            Some(session) => session.access_token.clone(),
            None => self.anon_key.clone(),
        };
        self.with_token(request, &token)
    }

    /// Adds the API key and the public key as bearer, ignoring any session.
    pub fn anonymous(&self, request: RequestBuilder) -> RequestBuilder {
        self.with_token(request, &self.anon_key)
    }

    pub fn with_token(&self, request: RequestBuilder, token: &str) -> RequestBuilder {
        request.header("apikey", &self.anon_key).bearer_auth(token)
    }

    /// Sends the request and turns a non-success status into a `PortError`.
    pub async fn send(&self, request: RequestBuilder) -> PortResult<Response> {
        let response = request
            .send()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        check_response(response).await
    }

    /// Like [`send`](Self::send), but a response saying the session itself is
    /// no longer valid comes back as `Ok(None)` instead of an error.
    pub async fn send_for_session(&self, request: RequestBuilder) -> PortResult<Option<Response>> {
        let response = request
            .send()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        let status = response.status();
        if status.is_success() {
            return Ok(Some(response));
        }
        let body = response.text().await.unwrap_or_default();
        if session_gone(status, &body) {
            return Ok(None);
        }
        Err(map_error(status, &body))
    }

    /// Sends the request and decodes a JSON body.
    pub async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> PortResult<T> {
        let response = self.send(request).await?;
        Self::decode(response).await
    }

    /// Decodes a JSON body.
    pub async fn decode<T: DeserializeOwned>(response: Response) -> PortResult<T> {
        response
            .json::<T>()
            .await
            .map_err(|e| PortError::Unexpected(format!("Failed to decode response: {}", e)))
    }
}

//=========================================================================================
// Error Mapping
//=========================================================================================

/// The error shapes of the auth, table and storage endpoints.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    msg: Option<String>,
    error_description: Option<String>,
    error: Option<String>,
    error_code: Option<String>,
}

impl ErrorBody {
    fn into_message(self) -> Option<String> {
        self.message
            .or(self.msg)
            .or(self.error_description)
            .or(self.error)
            .filter(|m| !m.trim().is_empty())
    }
}

async fn check_response(response: Response) -> PortResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(map_error(status, &body))
}

/// Auth error codes meaning the tokens cannot be used again.
const SESSION_GONE_CODES: &[&str] = &[
    "session_not_found",
    "session_expired",
    "refresh_token_not_found",
    "refresh_token_already_used",
    "bad_jwt",
    "user_not_found",
];

/// Whether an auth response means the session is over, as opposed to a
/// transient failure such as rate limiting.
pub(crate) fn session_gone(status: StatusCode, body: &str) -> bool {
    if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
        return true;
    }
    let Ok(body) = serde_json::from_str::<ErrorBody>(body) else {
        return false;
    };
    // Refresh-token grants report a dead token as `invalid_grant`.
    body.error_code
        .iter()
        .chain(body.error.iter())
        .any(|code| code == "invalid_grant" || SESSION_GONE_CODES.contains(&code.as_str()))
}

/// A message from the service wins; otherwise fall back on the status.
pub(crate) fn map_error(status: StatusCode, body: &str) -> PortError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(ErrorBody::into_message);
    match (message, status) {
        (Some(message), _) => PortError::Rejected(message),
        (None, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) => PortError::Unauthorized,
        (None, StatusCode::NOT_FOUND) => PortError::NotFound("Resource not found".to_string()),
        (None, status) => PortError::Unexpected(format!("Backend returned {}", status)),
    }
}
