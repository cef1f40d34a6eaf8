//! Port for ticket reads and conditional writes.
//!
//! Writes carry the `updated_at` value the caller read. Adapters apply the
//! write only when the stored row still has that value and report
//! [`TicketRepositoryError::StaleWrite`] otherwise.

use async_trait::async_trait;
use pagination::Page;

use crate::domain::{
    DateWindow, NewTicket, Reassignment, StatusUpdate, Ticket, TicketId, TicketPageQuery,
    TicketSummary,
};

use super::define_port_error;

define_port_error! {
    /// Errors raised by ticket repository adapters.
    pub enum TicketRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } => "ticket repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } => "ticket repository query failed: {message}",
        /// The backend rejected the session token.
        Unauthorized { message: String } => "ticket repository rejected credentials: {message}",
        /// No ticket has the given id.
        NotFound { id: String } => "ticket {id} not found",
        /// The row changed since it was read.
        StaleWrite { id: String } => "ticket {id} was modified concurrently",
    }
}

/// Storage for tickets.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TicketRepository: Send + Sync {
    /// One page, newest first, with requester and technician joined and the
    /// exact count of rows matching the window.
    async fn fetch_page(
        &self,
        query: &TicketPageQuery,
    ) -> Result<Page<TicketSummary>, TicketRepositoryError>;

    /// Every ticket, newest first.
    async fn list_all(&self) -> Result<Vec<TicketSummary>, TicketRepositoryError>;

    /// Every ticket created inside `window`, newest first.
    async fn list_in_window(
        &self,
        window: &DateWindow,
    ) -> Result<Vec<TicketSummary>, TicketRepositoryError>;

    async fn find_by_id(&self, id: TicketId)
    -> Result<Option<TicketSummary>, TicketRepositoryError>;

    /// Insert and return the stored row.
    async fn insert(&self, ticket: &NewTicket) -> Result<Ticket, TicketRepositoryError>;

    /// Conditional status write; returns the updated row.
    async fn update_status(
        &self,
        id: TicketId,
        update: &StatusUpdate,
    ) -> Result<Ticket, TicketRepositoryError>;

    /// Conditional technician change; returns the updated row.
    async fn reassign(
        &self,
        id: TicketId,
        reassignment: &Reassignment,
    ) -> Result<Ticket, TicketRepositoryError>;
}
