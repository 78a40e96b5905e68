//! Shared test helpers: an in-memory backend behind every port and a router
//! wired the same way the `api` binary wires it.

use api_lib::{
    config::Config,
    web::{create_router, AppState},
};
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use notes_core::{
    AuthService, Category, DataService, NewNote, Note, NoteId, NoteUpdate, PortError, PortResult,
    Profile, ProfileChanges, StorageService, Subscription, User, UserId,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt;
use uuid::Uuid;

pub const EMAIL: &str = "ada@example.com";
pub const PASSWORD: &str = "correct horse";

pub fn test_config() -> Config {
    Config::from_lookup(|key| match key {
        "SUPABASE_URL" => Some("https://test.supabase.co".to_string()),
        "SUPABASE_ANON_KEY" => Some("anon".to_string()),
        "REQUEST_TIMEOUT_SECS" => Some("2".to_string()),
        _ => None,
    })
    .unwrap()
}

pub fn test_user() -> User {
    User {
        id: UserId(Uuid::from_u128(7)),
        email: Some(EMAIL.to_string()),
    }
}

#[allow(dead_code)]
pub fn at(minutes: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + ChronoDuration::minutes(minutes)
}

//=========================================================================================
// Fake backend
//=========================================================================================

#[derive(Default)]
pub struct FakeBackend {
    pub notes: Mutex<Vec<Note>>,
    pub categories: Mutex<Vec<Category>>,
    pub profiles: Mutex<HashMap<UserId, Profile>>,
    pub objects: Mutex<HashMap<String, Vec<u8>>>,
    accounts: Mutex<HashMap<String, (String, User)>>,
    session: Mutex<Option<User>>,
    failures: Mutex<HashMap<&'static str, String>>,
    next_id: AtomicI64,
}

#[allow(dead_code)]
impl FakeBackend {
    pub fn new() -> Self {
        let backend = Self::default();
        backend.next_id.store(100, Ordering::SeqCst);
        backend
            .accounts
            .lock()
            .unwrap()
            .insert(EMAIL.to_string(), (PASSWORD.to_string(), test_user()));
        backend
    }

    pub fn seed_note(&self, id: NoteId, title: &str, minutes: i64, category_id: Option<i64>) {
        self.notes.lock().unwrap().push(Note {
            id,
            title: title.to_string(),
            content: String::new(),
            category_id,
            created_at: at(minutes),
            user_id: test_user().id,
        });
    }

    pub fn seed_category(&self, id: i64, name: &str) {
        self.categories.lock().unwrap().push(Category {
            id,
            name: name.to_string(),
            user_id: test_user().id,
        });
    }

    /// The backend forgets the session, as when its refresh token expires.
    pub fn drop_session(&self) {
        *self.session.lock().unwrap() = None;
    }

    /// Every later call to `op` fails with `message`.
    pub fn fail(&self, op: &'static str, message: &str) {
        self.failures.lock().unwrap().insert(op, message.to_string());
    }

    fn check(&self, op: &'static str) -> PortResult<()> {
        match self.failures.lock().unwrap().get(op) {
            Some(message) => Err(PortError::Rejected(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl DataService for FakeBackend {
    async fn list_notes(&self, user_id: UserId) -> PortResult<Vec<Note>> {
        self.check("list_notes")?;
        let mut notes: Vec<Note> = self
            .notes
            .lock()
            .unwrap()
            .iter()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect();
        notes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(notes)
    }

    async fn insert_note(&self, new_note: &NewNote) -> PortResult<Note> {
        self.check("insert_note")?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let note = Note {
            id,
            title: new_note.title.clone(),
            content: new_note.content.clone(),
            category_id: new_note.category_id,
            created_at: at(10_000 + id),
            user_id: new_note.user_id,
        };
        self.notes.lock().unwrap().push(note.clone());
        Ok(note)
    }

    async fn update_note(&self, note_id: NoteId, update: &NoteUpdate) -> PortResult<Note> {
        self.check("update_note")?;
        let mut notes = self.notes.lock().unwrap();
        let note = notes
            .iter_mut()
            .find(|n| n.id == note_id)
            .ok_or_else(|| PortError::NotFound(format!("Note {} not found", note_id)))?;
        note.title = update.title.clone();
        note.content = update.content.clone();
        Ok(note.clone())
    }

    async fn delete_note(&self, note_id: NoteId) -> PortResult<()> {
        self.check("delete_note")?;
        self.notes.lock().unwrap().retain(|n| n.id != note_id);
        Ok(())
    }

    async fn list_categories(&self, user_id: UserId) -> PortResult<Vec<Category>> {
        self.check("list_categories")?;
        let mut categories: Vec<Category> = self
            .categories
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn get_profile(&self, user_id: UserId) -> PortResult<Option<Profile>> {
        self.check("get_profile")?;
        Ok(self.profiles.lock().unwrap().get(&user_id).cloned())
    }

    async fn upsert_profile(&self, changes: &ProfileChanges) -> PortResult<()> {
        self.check("upsert_profile")?;
        let mut profiles = self.profiles.lock().unwrap();
        let profile = profiles.entry(changes.id).or_insert_with(|| Profile {
            id: changes.id,
            full_name: None,
            username: None,
            avatar_url: None,
            updated_at: None,
        });
        if let Some(full_name) = &changes.full_name {
            profile.full_name = Some(full_name.clone());
        }
        if let Some(username) = &changes.username {
            profile.username = Some(username.clone());
        }
        if let Some(avatar_url) = &changes.avatar_url {
            profile.avatar_url = Some(avatar_url.clone());
        }
        profile.updated_at = Some(changes.updated_at);
        Ok(())
    }
}

#[async_trait]
impl StorageService for FakeBackend {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> PortResult<()> {
        self.check("upload")?;
        self.objects
            .lock()
            .unwrap()
            .insert(format!("{}/{}", bucket, path), bytes);
        Ok(())
    }

    async fn download(&self, bucket: &str, path: &str) -> PortResult<Vec<u8>> {
        self.check("download")?;
        self.objects
            .lock()
            .unwrap()
            .get(&format!("{}/{}", bucket, path))
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Object {} not found", path)))
    }
}

#[async_trait]
impl AuthService for FakeBackend {
    async fn sign_up(&self, email: &str, password: &str) -> PortResult<Option<User>> {
        self.check("sign_up")?;
        let mut accounts = self.accounts.lock().unwrap();
        if accounts.contains_key(email) {
            return Err(PortError::Rejected("User already registered".to_string()));
        }
        let user = User {
            id: UserId(Uuid::new_v4()),
            email: Some(email.to_string()),
        };
        accounts.insert(email.to_string(), (password.to_string(), user.clone()));
        *self.session.lock().unwrap() = Some(user.clone());
        Ok(Some(user))
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> PortResult<User> {
        self.check("sign_in")?;
        let accounts = self.accounts.lock().unwrap();
        match accounts.get(email) {
            Some((expected, user)) if expected == password => {
                *self.session.lock().unwrap() = Some(user.clone());
                Ok(user.clone())
            }
            _ => Err(PortError::Rejected("Invalid login credentials".to_string())),
        }
    }

    async fn sign_out(&self) -> PortResult<()> {
        *self.session.lock().unwrap() = None;
        Ok(())
    }

    async fn current_user(&self) -> PortResult<Option<User>> {
        Ok(self.session.lock().unwrap().clone())
    }

    async fn refresh_session(&self) -> PortResult<Option<User>> {
        Ok(self.session.lock().unwrap().clone())
    }
}

//=========================================================================================
// Test app
//=========================================================================================

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub backend: Arc<FakeBackend>,
    _subscription: Subscription,
}

/// Create a test app over a fresh fake backend.
pub fn create_test_app() -> TestApp {
    let backend = Arc::new(FakeBackend::new());
    let state = Arc::new(AppState::new(
        Arc::new(test_config()),
        backend.clone(),
        backend.clone(),
        backend.clone(),
    ));
    let subscription = state.sync_store_with_session();
    TestApp {
        router: create_router(state.clone()),
        state,
        backend,
        _subscription: subscription,
    }
}

#[allow(dead_code)]
impl TestApp {
    /// Sends a request and returns the status and the raw body.
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, body.to_vec())
    }

    /// Sends a request and parses the body as JSON (`Null` when empty).
    pub async fn send_json(&self, request: Request<Body>) -> (StatusCode, Value) {
        let (status, body) = self.send(request).await;
        let value = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap()
        };
        (status, value)
    }

    /// Signs in as the seeded user and waits for the sign-in reload of the
    /// cache to finish.
    pub async fn login(&self) {
        let mut updates = self.state.store.subscribe();
        let (status, _) = self
            .send_json(json_request(
                "POST",
                "/auth/login",
                serde_json::json!({ "email": EMAIL, "password": PASSWORD }),
            ))
            .await;
        assert_eq!(status, StatusCode::OK);
        tokio::time::timeout(Duration::from_secs(2), updates.wait_for(|s| !s.loading))
            .await
            .expect("cache should load after sign-in")
            .unwrap();
    }
}

pub fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

/// A `multipart/form-data` request with a single file part.
#[allow(dead_code)]
pub fn multipart_request(uri: &str, field: &str, file_name: &str, bytes: &[u8]) -> Request<Body> {
    let boundary = "notes-test-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            field, file_name
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(body))
        .unwrap()
}
