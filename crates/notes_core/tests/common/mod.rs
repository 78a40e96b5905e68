//! In-memory stand-in for the hosted backend, implementing every port.
//!
//! Operations can be made to fail (with a service message) or to stall, and
//! every call is recorded so tests can assert what reached the "network".

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use notes_core::{
    AuthService, Category, DataService, NewNote, Note, NoteId, NoteUpdate, PortError, PortResult,
    Profile, ProfileChanges, StorageService, User, UserId,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;

#[allow(dead_code)]
pub fn user(n: u128) -> User {
    User {
        id: UserId(Uuid::from_u128(n)),
        email: Some(format!("user{}@example.com", n)),
    }
}

#[allow(dead_code)]
pub fn at(minutes: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + ChronoDuration::minutes(minutes)
}

#[allow(dead_code)]
pub fn note(id: NoteId, title: &str, minutes: i64, owner: &User) -> Note {
    Note {
        id,
        title: title.to_string(),
        content: format!("{} body", title),
        category_id: None,
        created_at: at(minutes),
        user_id: owner.id,
    }
}

#[allow(dead_code)]
pub fn category(id: i64, name: &str, owner: &User) -> Category {
    Category {
        id,
        name: name.to_string(),
        user_id: owner.id,
    }
}

#[derive(Default)]
pub struct FakeBackend {
    pub notes: Mutex<Vec<Note>>,
    pub categories: Mutex<Vec<Category>>,
    pub profiles: Mutex<HashMap<UserId, Profile>>,
    pub objects: Mutex<HashMap<String, Vec<u8>>>,
    accounts: Mutex<HashMap<String, (String, User)>>,
    session: Mutex<Option<User>>,
    failures: Mutex<HashMap<&'static str, String>>,
    delays: Mutex<HashMap<&'static str, Duration>>,
    calls: Mutex<Vec<&'static str>>,
    next_id: AtomicI64,
}

#[allow(dead_code)]
impl FakeBackend {
    pub fn new() -> Self {
        let backend = Self::default();
        backend.next_id.store(100, Ordering::SeqCst);
        backend
    }

    pub fn seed_notes(&self, notes: Vec<Note>) {
        self.notes.lock().unwrap().extend(notes);
    }

    pub fn seed_categories(&self, categories: Vec<Category>) {
        self.categories.lock().unwrap().extend(categories);
    }

    pub fn register(&self, email: &str, password: &str, user: User) {
        self.accounts
            .lock()
            .unwrap()
            .insert(email.to_string(), (password.to_string(), user));
    }

    /// The backend forgets the session, as when its refresh token expires.
    pub fn drop_session(&self) {
        *self.session.lock().unwrap() = None;
    }

    /// Every later call to `op` fails with `message` until cleared.
    pub fn fail(&self, op: &'static str, message: &str) {
        self.failures.lock().unwrap().insert(op, message.to_string());
    }

    pub fn clear_failures(&self) {
        self.failures.lock().unwrap().clear();
    }

    /// Every later call to `op` stalls for `delay` before answering.
    pub fn delay(&self, op: &'static str, delay: Duration) {
        self.delays.lock().unwrap().insert(op, delay);
    }

    pub fn clear_delays(&self) {
        self.delays.lock().unwrap().clear();
    }

    pub fn calls(&self, op: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| **c == op).count()
    }

    async fn enter(&self, op: &'static str) -> PortResult<()> {
        self.calls.lock().unwrap().push(op);
        let delay = self.delays.lock().unwrap().get(op).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match self.failures.lock().unwrap().get(op) {
            Some(message) => Err(PortError::Rejected(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl DataService for FakeBackend {
    async fn list_notes(&self, user_id: UserId) -> PortResult<Vec<Note>> {
        self.enter("list_notes").await?;
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
        self.enter("insert_note").await?;
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
        self.enter("update_note").await?;
        let mut notes = self.notes.lock().unwrap();
        let note = notes
            .iter_mut()
            .find(|n| n.id == note_id)
            .ok_or_else(|| PortError::Rejected("JSON object requested, multiple (or no) rows returned".to_string()))?;
        note.title = update.title.clone();
        note.content = update.content.clone();
        Ok(note.clone())
    }

    async fn delete_note(&self, note_id: NoteId) -> PortResult<()> {
        self.enter("delete_note").await?;
        self.notes.lock().unwrap().retain(|n| n.id != note_id);
        Ok(())
    }

    async fn list_categories(&self, user_id: UserId) -> PortResult<Vec<Category>> {
        self.enter("list_categories").await?;
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
        self.enter("get_profile").await?;
        Ok(self.profiles.lock().unwrap().get(&user_id).cloned())
    }

    async fn upsert_profile(&self, changes: &ProfileChanges) -> PortResult<()> {
        self.enter("upsert_profile").await?;
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
        self.enter("upload").await?;
        self.objects
            .lock()
            .unwrap()
            .insert(format!("{}/{}", bucket, path), bytes);
        Ok(())
    }

    async fn download(&self, bucket: &str, path: &str) -> PortResult<Vec<u8>> {
        self.enter("download").await?;
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
        self.enter("sign_up").await?;
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
        self.enter("sign_in").await?;
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
        self.enter("sign_out").await?;
        *self.session.lock().unwrap() = None;
        Ok(())
    }

    async fn current_user(&self) -> PortResult<Option<User>> {
        self.enter("current_user").await?;
        Ok(self.session.lock().unwrap().clone())
    }

    async fn refresh_session(&self) -> PortResult<Option<User>> {
        self.enter("refresh_session").await?;
        Ok(self.session.lock().unwrap().clone())
    }
}
