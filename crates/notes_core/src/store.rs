//! crates/notes_core/src/store.rs
//!
//! The notes/categories store: an in-memory mirror of the signed-in user's
//! notes and categories, kept in line with what the backend acknowledges.
//!
//! The store is the only writer of the cache. Readers take a [`StoreSnapshot`]
//! or subscribe to a `watch` channel that sees every committed snapshot.
//! Nothing is written optimistically: each mutation waits for the backend's
//! echoed row (or confirmation) before the cache changes.

use dashmap::{mapref::entry::Entry, DashMap};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::{Category, CategoryId, NewNote, Note, NoteDraft, NoteId, NoteUpdate, User, UserId};
use crate::ports::{DataService, PortError, PortResult};

/// Default bound on a single backend call.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(15);

//=========================================================================================
// Errors
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("{0}")]
    Validation(String),
    /// The backend call failed; displays the service's own message.
    #[error(transparent)]
    Remote(#[from] PortError),
    #[error("The request timed out after {0:?}")]
    Timeout(Duration),
    #[error("The request was cancelled")]
    Cancelled,
    #[error("Note {0} already has a change in progress")]
    MutationInFlight(NoteId),
}

//=========================================================================================
// Snapshot
//=========================================================================================

/// A consistent view of the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSnapshot {
    /// Newest first.
    pub notes: Vec<Note>,
    /// Ordered by name.
    pub categories: Vec<Category>,
    pub loading: bool,
}

impl Default for StoreSnapshot {
    /// Nothing has been fetched yet, so the first render shows a loading state.
    fn default() -> Self {
        Self {
            notes: Vec::new(),
            categories: Vec::new(),
            loading: true,
        }
    }
}

impl StoreSnapshot {
    pub fn note(&self, note_id: NoteId) -> Option<&Note> {
        self.notes.iter().find(|n| n.id == note_id)
    }

    /// The display name of a note's category. A reference to a category that
    /// is no longer cached resolves to `None`.
    pub fn category_name(&self, note: &Note) -> Option<&str> {
        let category_id = note.category_id?;
        self.categories
            .iter()
            .find(|c| c.id == category_id)
            .map(|c| c.name.as_str())
    }
}

//=========================================================================================
// Store
//=========================================================================================

#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub call_timeout: Duration,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }
}

/// Who the cache currently belongs to.
#[derive(Debug, Default)]
struct Ownership {
    owner: Option<UserId>,
    /// Bumped on every identity change; mutation results from an older epoch
    /// are dropped.
    epoch: u64,
    /// Bumped by every `load`/`clear`; only the latest load may commit.
    load_seq: u64,
}

pub struct NotesStore {
    data: Arc<dyn DataService>,
    options: StoreOptions,
    state: watch::Sender<StoreSnapshot>,
    ownership: Mutex<Ownership>,
    in_flight: DashMap<NoteId, ()>,
    shutdown: CancellationToken,
}

impl NotesStore {
    pub fn new(data: Arc<dyn DataService>, options: StoreOptions) -> Self {
        let (state, _) = watch::channel(StoreSnapshot::default());
        Self {
            data,
            options,
            state,
            ownership: Mutex::new(Ownership::default()),
            in_flight: DashMap::new(),
            shutdown: CancellationToken::new(),
        }
    }

    /// A copy of the current cache.
    pub fn snapshot(&self) -> StoreSnapshot {
        self.state.borrow().clone()
    }

    /// Receives every committed snapshot.
    pub fn subscribe(&self) -> watch::Receiver<StoreSnapshot> {
        self.state.subscribe()
    }

    /// Cancels every in-flight backend call. Later calls fail immediately
    /// with [`StoreError::Cancelled`].
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Replaces the cache with `user`'s notes and categories.
    ///
    /// Both lists are fetched concurrently. A failed list degrades to an empty
    /// sequence; `loading` is cleared whatever happens. If another `load` or
    /// `clear` starts while this one is in flight, this result is discarded.
    pub async fn load(&self, user: &User) {
        let seq = self.begin_load(user);
        self.finish_load(user, seq).await;
    }

    /// Like [`load`](Self::load), but marks the cache as loading before
    /// returning, so a `clear` issued afterwards always wins.
    pub fn spawn_load(self: &Arc<Self>, user: User) -> JoinHandle<()> {
        let seq = self.begin_load(&user);
        let store = Arc::clone(self);
        tokio::spawn(async move { store.finish_load(&user, seq).await })
    }

    fn begin_load(&self, user: &User) -> u64 {
        let mut ownership = self.ownership();
        ownership.load_seq += 1;
        let switched = ownership.owner != Some(user.id);
        if switched {
            ownership.owner = Some(user.id);
            ownership.epoch += 1;
        }
        self.state.send_modify(|snapshot| {
            snapshot.loading = true;
            if switched {
                snapshot.notes.clear();
                snapshot.categories.clear();
            }
        });
        ownership.load_seq
    }

    async fn finish_load(&self, user: &User, seq: u64) {
        info!(user_id = %user.id, "Loading notes and categories");
        let (notes, categories) = tokio::join!(
            self.call(self.data.list_notes(user.id)),
            self.call(self.data.list_categories(user.id)),
        );

        let notes = notes.unwrap_or_else(|e| {
            warn!(user_id = %user.id, error = %e, "Failed to load notes");
            Vec::new()
        });
        let categories = categories.unwrap_or_else(|e| {
            warn!(user_id = %user.id, error = %e, "Failed to load categories");
            Vec::new()
        });

        let ownership = self.ownership();
        if ownership.load_seq != seq {
            debug!(user_id = %user.id, "Discarding superseded load");
            return;
        }
        info!(
            user_id = %user.id,
            notes = notes.len(),
            categories = categories.len(),
            "Notes and categories loaded"
        );
        self.state.send_replace(StoreSnapshot {
            notes,
            categories,
            loading: false,
        });
    }

    /// The user the cache currently belongs to.
    pub fn owner(&self) -> Option<UserId> {
        self.ownership().owner
    }

    /// Hands the cache to `user` before returning: a load starts when it
    /// belongs to someone else, and it is cleared when nobody is signed in.
    /// Calling it again for the current owner does nothing.
    pub fn follow(self: &Arc<Self>, user: Option<&User>) {
        match user {
            Some(user) if self.owner() != Some(user.id) => {
                self.spawn_load(user.clone());
            }
            Some(_) => {}
            None => {
                if self.owner().is_some() {
                    self.clear();
                }
            }
        }
    }

    /// Drops everything cached, e.g. after sign-out.
    pub fn clear(&self) {
        let mut ownership = self.ownership();
        ownership.load_seq += 1;
        if ownership.owner.take().is_some() {
            ownership.epoch += 1;
        }
        self.state.send_replace(StoreSnapshot {
            notes: Vec::new(),
            categories: Vec::new(),
            loading: false,
        });
    }

    /// Creates a note and puts the persisted row at the head of the cache.
    pub async fn create(&self, draft: NoteDraft) -> Result<Note, StoreError> {
        let new_note = validate_draft(draft)?;
        let epoch = {
            let ownership = self.ownership();
            if ownership.owner != Some(new_note.user_id) {
                warn!(user_id = %new_note.user_id, "Rejecting note for a user who does not own the cache");
                return Err(StoreError::Validation(
                    "Notes are loaded for a different user".to_string(),
                ));
            }
            ownership.epoch
        };

        let note = self.call(self.data.insert_note(&new_note)).await?;
        info!(note_id = note.id, "Note created");

        self.commit(epoch, |snapshot| snapshot.notes.insert(0, note.clone()));
        Ok(note)
    }

    /// Deletes a note; the cache entry goes only once the backend confirms.
    pub async fn delete(&self, note_id: NoteId) -> Result<(), StoreError> {
        let _guard = self.begin_mutation(note_id)?;
        let epoch = self.epoch();

        self.call(self.data.delete_note(note_id)).await?;
        info!(note_id, "Note deleted");

        self.commit(epoch, |snapshot| snapshot.notes.retain(|n| n.id != note_id));
        Ok(())
    }

    /// Updates title and content, replacing the cached entry where it sits.
    pub async fn update(&self, note_id: NoteId, update: NoteUpdate) -> Result<Note, StoreError> {
        validate_title(&update.title)?;
        let _guard = self.begin_mutation(note_id)?;
        let epoch = self.epoch();

        let note = self.call(self.data.update_note(note_id, &update)).await?;
        info!(note_id, "Note updated");

        self.commit(epoch, |snapshot| {
            if let Some(slot) = snapshot.notes.iter_mut().find(|n| n.id == note_id) {
                *slot = note.clone();
            }
        });
        Ok(note)
    }

    //-------------------------------------------------------------------------------------
    // Helpers
    //-------------------------------------------------------------------------------------

    /// Runs one backend call under the configured timeout and the shutdown token.
    async fn call<T>(&self, fut: impl Future<Output = PortResult<T>>) -> Result<T, StoreError> {
        let timeout = self.options.call_timeout;
        tokio::select! {
            _ = self.shutdown.cancelled() => Err(StoreError::Cancelled),
            res = tokio::time::timeout(timeout, fut) => match res {
                Ok(inner) => inner.map_err(StoreError::from),
                Err(_) => Err(StoreError::Timeout(timeout)),
            },
        }
    }

    fn begin_mutation(&self, note_id: NoteId) -> Result<MutationGuard<'_>, StoreError> {
        match self.in_flight.entry(note_id) {
            Entry::Occupied(_) => {
                warn!(note_id, "Rejecting concurrent change to note");
                Err(StoreError::MutationInFlight(note_id))
            }
            Entry::Vacant(slot) => {
                slot.insert(());
                Ok(MutationGuard {
                    in_flight: &self.in_flight,
                    note_id,
                })
            }
        }
    }

    fn commit(&self, epoch: u64, apply: impl FnOnce(&mut StoreSnapshot)) {
        let ownership = self.ownership();
        if ownership.epoch != epoch {
            debug!("Signed-in user changed mid-request; leaving cache untouched");
            return;
        }
        self.state.send_modify(apply);
    }

    fn epoch(&self) -> u64 {
        self.ownership().epoch
    }

    fn ownership(&self) -> MutexGuard<'_, Ownership> {
        self.ownership
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Releases a note's in-flight slot when the mutation ends, however it ends.
struct MutationGuard<'a> {
    in_flight: &'a DashMap<NoteId, ()>,
    note_id: NoteId,
}

impl Drop for MutationGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.remove(&self.note_id);
    }
}

//=========================================================================================
// Validation
//=========================================================================================

fn validate_title(title: &str) -> Result<(), StoreError> {
    if title.trim().is_empty() {
        return Err(StoreError::Validation("Title is required".to_string()));
    }
    Ok(())
}

/// Blank means "no category"; anything else must be an integer id.
fn parse_category_id(raw: &str) -> Result<Option<CategoryId>, StoreError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse::<CategoryId>()
        .map(Some)
        .map_err(|_| StoreError::Validation(format!("Invalid category: '{}'", raw)))
}

fn validate_draft(draft: NoteDraft) -> Result<NewNote, StoreError> {
    validate_title(&draft.title)?;
    let category_id = parse_category_id(&draft.category_id)?;
    Ok(NewNote {
        title: draft.title,
        content: draft.content,
        category_id,
        user_id: draft.user_id,
    })
}
