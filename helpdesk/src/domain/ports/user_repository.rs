//! Port abstraction for the `users` profile table.
use async_trait::async_trait;

use crate::domain::{EmailAddress, Role, User, UserId};

use super::define_port_error;

define_port_error! {
    /// Persistence errors raised by user repository adapters.
    pub enum UserRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } => "user repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } => "user repository query failed: {message}",
        /// The backend rejected the session token.
        Unauthorized { message: String } => "user repository rejected credentials: {message}",
        /// No row has the given id.
        NotFound { id: String } => "user {id} not found",
    }
}

/// Storage for user profiles.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fetch a profile by id, active or not.
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, UserRepositoryError>;

    /// Fetch a profile by sign-in email.
    async fn find_by_email(&self, email: &EmailAddress)
    -> Result<Option<User>, UserRepositoryError>;

    /// Active profiles ordered by name.
    async fn list_active(&self) -> Result<Vec<User>, UserRepositoryError>;

    /// Active profiles with `role`, ordered by name.
    async fn list_by_role(&self, role: Role) -> Result<Vec<User>, UserRepositoryError>;

    /// Insert a new profile row.
    async fn insert(&self, user: &User) -> Result<(), UserRepositoryError>;

    /// Overwrite name, role and active flag of an existing row.
    async fn update(&self, user: &User) -> Result<(), UserRepositoryError>;

    /// Flip the soft-delete flag.
    async fn set_active(&self, id: &UserId, active: bool) -> Result<(), UserRepositoryError>;
}
