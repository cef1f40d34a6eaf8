//! Port for the append-only `comments` table.
use async_trait::async_trait;

use crate::domain::{Comment, NewComment, TicketId};

use super::define_port_error;

define_port_error! {
    /// Errors raised by comment repository adapters.
    pub enum CommentRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } => "comment repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } => "comment repository query failed: {message}",
        /// The backend rejected the session token.
        Unauthorized { message: String } => "comment repository rejected credentials: {message}",
    }
}

/// Storage for ticket comments.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommentRepository: Send + Sync {
    /// Comments on `ticket`, oldest first, with author names joined.
    async fn list_for_ticket(&self, ticket: TicketId)
    -> Result<Vec<Comment>, CommentRepositoryError>;

    /// Append a comment and return the stored row.
    async fn insert(&self, comment: &NewComment) -> Result<Comment, CommentRepositoryError>;
}
