//! Triage queue: every ticket still awaiting resolution, oldest first.

use std::sync::Arc;

use super::port_errors::map_ticket_error;
use super::ports::TicketRepository;
use super::{Error, Role, SessionContext, TicketSummary};

/// One queue row with its 1-based position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry {
    pub position: usize,
    pub summary: TicketSummary,
}

/// Drop closed tickets, order by creation time (ties by id) and number the
/// rows from 1.
pub fn build_queue(tickets: impl IntoIterator<Item = TicketSummary>) -> Vec<QueueEntry> {
    let mut open: Vec<TicketSummary> = tickets
        .into_iter()
        .filter(|summary| summary.ticket.status.is_queued())
        .collect();
    open.sort_by(|left, right| {
        left.ticket
            .created_at
            .cmp(&right.ticket.created_at)
            .then_with(|| left.ticket.id.cmp(&right.ticket.id))
    });
    open.into_iter()
        .enumerate()
        .map(|(index, summary)| QueueEntry {
            position: index + 1,
            summary,
        })
        .collect()
}

/// Whether a viewer with `role` may open a ticket from the queue.
pub const fn can_open_from_queue(role: Role) -> bool {
    role.is_staff()
}

/// Reads the full ticket list and derives the queue.
#[derive(Clone)]
pub struct QueueService<T> {
    tickets: Arc<T>,
    context: Arc<SessionContext>,
}

impl<T> QueueService<T> {
    /// Queue service for the session in `context`.
    pub fn new(tickets: Arc<T>, context: Arc<SessionContext>) -> Self {
        Self { tickets, context }
    }
}

impl<T> QueueService<T>
where
    T: TicketRepository,
{
    /// Queued tickets, oldest first, numbered from 1.
    pub async fn queue(&self) -> Result<Vec<QueueEntry>, Error> {
        self.context.require_user()?;
        let tickets = self.tickets.list_all().await.map_err(map_ticket_error)?;
        Ok(build_queue(tickets))
    }
}
