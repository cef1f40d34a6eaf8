//! Session lifecycle: bootstrap, login and logout.

use std::sync::Arc;

use tracing::{info, warn};

use super::port_errors::{map_auth_error, map_user_error};
use super::ports::{AuthGateway, UserRepository};
use super::{Error, LoginCredentials, SessionContext, User};

/// Populates and clears a [`SessionContext`] through the auth backend.
#[derive(Clone)]
pub struct SessionService<A, U> {
    auth: Arc<A>,
    users: Arc<U>,
    context: Arc<SessionContext>,
}

impl<A, U> SessionService<A, U> {
    /// Service that signs users in and out of `context`.
    pub fn new(auth: Arc<A>, users: Arc<U>, context: Arc<SessionContext>) -> Self {
        Self {
            auth,
            users,
            context,
        }
    }

    /// Context this service populates.
    pub fn context(&self) -> &Arc<SessionContext> {
        &self.context
    }
}

impl<A, U> SessionService<A, U>
where
    A: AuthGateway,
    U: UserRepository,
{
    /// Resolve an existing backend session at startup.
    ///
    /// A session whose profile row is missing or inactive leaves the context
    /// empty; only transport failures are returned as errors.
    pub async fn bootstrap(&self) -> Result<Option<User>, Error> {
        let Some(session) = self.auth.current_session().await.map_err(map_auth_error)? else {
            self.context.clear();
            return Ok(None);
        };

        let profile = self
            .users
            .find_by_id(session.user_id())
            .await
            .map_err(map_user_error)?;
        match profile {
            Some(user) if user.is_active() => {
                self.context.establish(user.clone());
                Ok(Some(user))
            }
            Some(user) => {
                warn!(user_id = %user.id(), "session belongs to a deactivated account");
                self.context.clear();
                Ok(None)
            }
            None => {
                warn!(user_id = %session.user_id(), "no profile row for active session");
                self.context.clear();
                Ok(None)
            }
        }
    }

    /// Sign in and establish the matching profile.
    pub async fn login(&self, credentials: &LoginCredentials) -> Result<User, Error> {
        self.auth
            .sign_in_with_password(credentials)
            .await
            .map_err(map_auth_error)?;

        let profile = self
            .users
            .find_by_email(credentials.email())
            .await
            .map_err(map_user_error)?;
        let user = match profile {
            Some(user) if user.is_active() => user,
            Some(user) => {
                warn!(user_id = %user.id(), "deactivated account attempted to sign in");
                self.sign_out_quietly().await;
                return Err(Error::forbidden("this account has been deactivated"));
            }
            None => {
                warn!(email = %credentials.email(), "signed in but no profile row matches");
                self.sign_out_quietly().await;
                return Err(Error::not_found("user profile not found"));
            }
        };

        self.context.establish(user.clone());
        Ok(user)
    }

    /// Sign out at the backend and clear the context. A failed backend sign
    /// out is logged; the local identity is dropped either way.
    pub async fn logout(&self) {
        self.sign_out_quietly().await;
        self.context.clear();
        info!("signed out");
    }

    async fn sign_out_quietly(&self) {
        if let Err(err) = self.auth.sign_out().await {
            warn!(error = %err, "backend sign out failed");
        }
    }
}
