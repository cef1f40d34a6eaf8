//! `comments` table adapter.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;

use super::client::{RestClient, first_row};
use super::dto::{CommentRow, NewCommentRow};
use super::errors::comment_error;
use super::query::RowQuery;
use crate::domain::ports::{CommentRepository, CommentRepositoryError};
use crate::domain::{Comment, NewComment, TicketId};

const TABLE: &str = "comments";
const COMMENT_SELECT: &str = "*,author:user_id(name,email)";

/// REST-backed [`CommentRepository`].
#[derive(Clone)]
pub struct RestCommentRepository {
    client: Arc<RestClient>,
}

impl RestCommentRepository {
    /// Repository over the `comments` table.
    pub fn new(client: Arc<RestClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CommentRepository for RestCommentRepository {
    async fn list_for_ticket(
        &self,
        ticket: TicketId,
    ) -> Result<Vec<Comment>, CommentRepositoryError> {
        let url = self.client.table_url(TABLE).map_err(comment_error)?;
        let query = RowQuery::select(COMMENT_SELECT)
            .eq("ticket_id", ticket.to_string())
            .order_asc("created_at");
        let request = self
            .client
            .request(Method::GET, url)
            .query(query.pairs());
        let response = self.client.send(request).await.map_err(comment_error)?;
        let rows: Vec<CommentRow> = response.json().map_err(comment_error)?;
        rows.into_iter()
            .map(|row| row.into_domain().map_err(CommentRepositoryError::query))
            .collect()
    }

    async fn insert(&self, comment: &NewComment) -> Result<Comment, CommentRepositoryError> {
        let url = self.client.table_url(TABLE).map_err(comment_error)?;
        let row = NewCommentRow {
            ticket_id: *comment.ticket_id().as_uuid(),
            user_id: comment.author_id().as_ref(),
            content: comment.content(),
            created_at: comment.created_at(),
        };
        let request = self
            .client
            .request(Method::POST, url)
            .query(RowQuery::select(COMMENT_SELECT).pairs())
            .header("Prefer", "return=representation")
            .json(&[row]);
        let response = self.client.send(request).await.map_err(comment_error)?;
        let rows: Vec<CommentRow> = response.json().map_err(comment_error)?;
        first_row(rows, "comment")
            .map_err(comment_error)?
            .into_domain()
            .map_err(CommentRepositoryError::query)
    }
}
