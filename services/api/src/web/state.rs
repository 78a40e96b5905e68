//! services/api/src/web/state.rs
//!
//! Defines the application's shared state and keeps the notes cache in step
//! with the signed-in identity.

use crate::config::Config;
use notes_core::{
    ports::{AuthService, DataService, StorageService},
    NotesStore, ProfileService, SessionProvider, StoreOptions, Subscription,
};
use std::sync::Arc;
use tracing::info;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
///
/// One process serves one signed-in session, so the store and the session
/// provider are singletons here.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub session: Arc<SessionProvider>,
    pub store: Arc<NotesStore>,
    pub profiles: Arc<ProfileService>,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        auth: Arc<dyn AuthService>,
        data: Arc<dyn DataService>,
        storage: Arc<dyn StorageService>,
    ) -> Self {
        let options = StoreOptions {
            call_timeout: config.request_timeout,
        };
        Self {
            session: Arc::new(SessionProvider::new(auth)),
            store: Arc::new(NotesStore::new(data.clone(), options)),
            profiles: Arc::new(ProfileService::new(
                data,
                storage,
                config.avatar_bucket.clone(),
            )),
            config,
        }
    }

    /// Keeps the store on whoever the session provider announces: a new user
    /// gets a reload, a sign-out clears the cache. A token refresh for the
    /// current owner leaves the cache alone.
    ///
    /// The returned subscription must be kept alive for as long as the cache
    /// should follow the session.
    pub fn sync_store_with_session(&self) -> Subscription {
        let store = Arc::clone(&self.store);
        self.session.on_auth_state_change(move |user| {
            if store.owner() != user.as_ref().map(|u| u.id) {
                info!(signed_in = user.is_some(), "Auth state changed; syncing notes");
            }
            store.follow(user.as_ref());
        })
    }
}
