//! Explicit session context holding the signed-in identity.
//!
//! Services receive an `Arc<SessionContext>` instead of reading an ambient
//! global. The identity lives in a `tokio::sync::watch` channel so background
//! listeners can follow sign-in and sign-out.

use tokio::sync::watch;
use tracing::info;

use super::error::Error;
use super::user::User;

/// Holder of at most one current [`User`].
#[derive(Debug)]
pub struct SessionContext {
    current: watch::Sender<Option<User>>,
}

impl SessionContext {
    /// Empty context; nobody is signed in.
    pub fn new() -> Self {
        let (current, _) = watch::channel(None);
        Self { current }
    }

    /// Context already holding `user`.
    pub fn with_user(user: User) -> Self {
        let (current, _) = watch::channel(Some(user));
        Self { current }
    }

    /// Snapshot of the signed-in user.
    pub fn current(&self) -> Option<User> {
        self.current.borrow().clone()
    }

    /// Signed-in user, or `Unauthorized` when nobody is.
    pub fn require_user(&self) -> Result<User, Error> {
        self.current()
            .ok_or_else(|| Error::unauthorized("sign in to continue"))
    }

    /// Replace the identity.
    pub fn establish(&self, user: User) {
        info!(user_id = %user.id(), role = %user.role(), "session established");
        self.current.send_replace(Some(user));
    }

    /// Drop the identity.
    pub fn clear(&self) {
        if self.current.send_replace(None).is_some() {
            info!("session cleared");
        }
    }

    /// Receiver that observes every identity change.
    pub fn subscribe(&self) -> watch::Receiver<Option<User>> {
        self.current.subscribe()
    }
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}
