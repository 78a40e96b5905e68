//! crates/notes_core/src/session.rs
//!
//! Resolves who is signed in and tells subscribers when that changes.

use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::domain::{AuthEvent, User, UserId};
use crate::ports::{AuthService, PortResult};

const EVENT_CAPACITY: usize = 16;

/// Wraps the auth port and publishes an [`AuthEvent`] for every transition
/// that goes through it.
pub struct SessionProvider {
    auth: Arc<dyn AuthService>,
    events: broadcast::Sender<AuthEvent>,
    /// The user named by the last published event.
    known: Mutex<Option<UserId>>,
}

impl SessionProvider {
    pub fn new(auth: Arc<dyn AuthService>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            auth,
            events,
            known: Mutex::new(None),
        }
    }

    /// One-shot resolution of the current user. A failed lookup is treated as
    /// signed out.
    ///
    /// The backend may drop or replace the session between calls (an expired
    /// refresh token, a revoked session). When the resolved user differs from
    /// the last one announced, the matching event is published here.
    pub async fn current_user(&self) -> Option<User> {
        match self.auth.current_user().await {
            Ok(user) => {
                self.observe(user.as_ref());
                user
            }
            Err(e) => {
                warn!(error = %e, "Failed to resolve current user");
                None
            }
        }
    }

    /// Registers an account. When the backend signs the user straight in, a
    /// `SignedIn` event follows.
    pub async fn sign_up(&self, email: &str, password: &str) -> PortResult<Option<User>> {
        let user = self.auth.sign_up(email, password).await?;
        match &user {
            Some(user) => {
                info!(user_id = %user.id, "Account created and signed in");
                self.publish(AuthEvent::SignedIn(user.clone()));
            }
            None => info!("Account created; awaiting e-mail confirmation"),
        }
        Ok(user)
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> PortResult<User> {
        let user = self.auth.sign_in_with_password(email, password).await?;
        info!(user_id = %user.id, "Signed in");
        self.publish(AuthEvent::SignedIn(user.clone()));
        Ok(user)
    }

    pub async fn sign_out(&self) -> PortResult<()> {
        self.auth.sign_out().await?;
        info!("Signed out");
        self.publish(AuthEvent::SignedOut);
        Ok(())
    }

    /// Refreshes the session tokens. Losing the session on refresh is reported
    /// as a sign-out.
    pub async fn refresh(&self) -> PortResult<Option<User>> {
        let user = self.auth.refresh_session().await?;
        match &user {
            Some(user) => self.publish(AuthEvent::TokenRefreshed(user.clone())),
            None => self.publish(AuthEvent::SignedOut),
        }
        Ok(user)
    }

    /// Calls `callback` with the signed-in user (or `None`) after every auth
    /// transition, until the returned [`Subscription`] is released.
    ///
    /// Must be called from within a tokio runtime.
    pub fn on_auth_state_change<F>(&self, callback: F) -> Subscription
    where
        F: Fn(Option<User>) + Send + 'static,
    {
        let mut events = self.events.subscribe();
        let token = CancellationToken::new();
        let cancelled = token.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = cancelled.cancelled() => break,
                    event = events.recv() => match event {
                        Ok(event) => callback(event.user().cloned()),
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(skipped, "Auth subscriber fell behind");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
        });

        Subscription { token }
    }

    fn observe(&self, user: Option<&User>) {
        let event = {
            let previous = *self.known();
            match (previous, user) {
                (Some(_), None) => Some(AuthEvent::SignedOut),
                (_, Some(user)) if previous != Some(user.id) => {
                    Some(AuthEvent::SignedIn(user.clone()))
                }
                _ => None,
            }
        };
        if let Some(event) = event {
            info!(signed_in = event.user().is_some(), "Session changed on the backend");
            self.publish(event);
        }
    }

    fn known(&self) -> MutexGuard<'_, Option<UserId>> {
        self.known.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn publish(&self, event: AuthEvent) {
        *self.known() = event.user().map(|u| u.id);
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

/// Handle for an auth-state subscription. Dropping it stops delivery.
#[must_use = "dropping the subscription stops delivery immediately"]
pub struct Subscription {
    token: CancellationToken,
}

impl Subscription {
    pub fn unsubscribe(self) {
        self.token.cancel();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
