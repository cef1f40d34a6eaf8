//! Append-only ticket comments.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ticket::{PartyRef, TicketId, TicketStatus};
use super::user::UserId;

/// Maximum comment length, in characters.
pub const COMMENT_MAX: usize = 5000;

/// Validation errors raised while building a comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommentValidationError {
    EmptyContent,
    ContentTooLong { max: usize },
}

impl fmt::Display for CommentValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyContent => write!(f, "comment must not be empty"),
            Self::ContentTooLong { max } => {
                write!(f, "comment must be at most {max} characters")
            }
        }
    }
}

impl std::error::Error for CommentValidationError {}

/// Stable comment identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommentId(Uuid);

impl CommentId {
    /// Fresh random identifier.
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl fmt::Display for CommentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Stored comment with its author's name joined in when available.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: CommentId,
    pub ticket_id: TicketId,
    pub author_id: UserId,
    pub author: Option<PartyRef>,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Validated comment awaiting insertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewComment {
    ticket_id: TicketId,
    author_id: UserId,
    content: String,
    created_at: DateTime<Utc>,
}

impl NewComment {
    /// Validate user-supplied content; surrounding whitespace is trimmed.
    pub fn new(
        ticket_id: TicketId,
        author_id: UserId,
        content: &str,
        created_at: DateTime<Utc>,
    ) -> Result<Self, CommentValidationError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(CommentValidationError::EmptyContent);
        }
        if content.chars().count() > COMMENT_MAX {
            return Err(CommentValidationError::ContentTooLong { max: COMMENT_MAX });
        }
        Ok(Self {
            ticket_id,
            author_id,
            content: content.to_owned(),
            created_at,
        })
    }

    /// System comment recording a status transition, authored by the actor
    /// who changed it.
    pub fn status_change(
        ticket_id: TicketId,
        author_id: UserId,
        from: TicketStatus,
        to: TicketStatus,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            ticket_id,
            author_id,
            content: format!("Status changed from {} to {}", from.label(), to.label()),
            created_at,
        }
    }

    /// Ticket commented on.
    pub const fn ticket_id(&self) -> TicketId {
        self.ticket_id
    }

    /// User who wrote the comment.
    pub fn author_id(&self) -> &UserId {
        &self.author_id
    }

    /// Comment text.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Time the comment was written.
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Materialise the stored row.
    pub fn into_comment(self, id: CommentId, author: Option<PartyRef>) -> Comment {
        Comment {
            id,
            ticket_id: self.ticket_id,
            author_id: self.author_id,
            author,
            content: self.content,
            created_at: self.created_at,
        }
    }
}
