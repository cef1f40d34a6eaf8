//! Port for the backend's password authentication endpoints.

use async_trait::async_trait;

use crate::domain::{AuthSession, LoginCredentials, UserId};

use super::define_port_error;

define_port_error! {
    /// Errors raised by auth gateway adapters.
    pub enum AuthGatewayError {
        /// Email and password did not match an account.
        InvalidCredentials => "invalid email or password",
        /// The backend refused the request (duplicate account, weak password).
        Rejected { message: String } => "auth request rejected: {message}",
        /// The backend could not be reached.
        Connection { message: String } => "auth backend unreachable: {message}",
    }
}

/// Sign-in, sign-up and session lookup against the auth backend.
///
/// Adapters keep the access token of the most recent sign-in so later data
/// requests run as the signed-in account.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuthGateway: Send + Sync {
    /// Exchange credentials for a session.
    async fn sign_in_with_password(
        &self,
        credentials: &LoginCredentials,
    ) -> Result<AuthSession, AuthGatewayError>;

    /// Register a new auth account and return its id. The caller's own
    /// session is left untouched.
    async fn sign_up(&self, credentials: &LoginCredentials) -> Result<UserId, AuthGatewayError>;

    /// Session currently held by the adapter, if still valid.
    async fn current_session(&self) -> Result<Option<AuthSession>, AuthGatewayError>;

    /// Revoke the current session.
    async fn sign_out(&self) -> Result<(), AuthGatewayError>;
}
