//! Per-status ticket counts for a single local day.

use std::sync::Arc;

use chrono::{FixedOffset, NaiveDate};
use mockable::Clock;
use serde::Serialize;

use super::port_errors::map_ticket_error;
use super::ports::TicketRepository;
use super::report::local_day_window;
use super::{Error, SessionContext, TicketStatus, TicketSummary};

/// Tickets created on one day, by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCounts {
    pub open: u64,
    pub in_progress: u64,
    pub closed: u64,
    pub reopened: u64,
}

impl StatusCounts {
    /// Tally `tickets` by status.
    pub fn tally<'a>(tickets: impl IntoIterator<Item = &'a TicketSummary>) -> Self {
        tickets
            .into_iter()
            .fold(Self::default(), |mut counts, summary| {
                match summary.ticket.status {
                    TicketStatus::Open => counts.open += 1,
                    TicketStatus::InProgress => counts.in_progress += 1,
                    TicketStatus::Closed => counts.closed += 1,
                    TicketStatus::Reopened => counts.reopened += 1,
                }
                counts
            })
    }

    /// Tickets across every status.
    pub const fn total(&self) -> u64 {
        self.open + self.in_progress + self.closed + self.reopened
    }
}

/// Dashboard counts for the signed-in user.
#[derive(Clone)]
pub struct DashboardService<T> {
    tickets: Arc<T>,
    context: Arc<SessionContext>,
    clock: Arc<dyn Clock>,
    offset: FixedOffset,
}

impl<T> DashboardService<T> {
    /// `offset` defines where local days start and end.
    pub fn new(
        tickets: Arc<T>,
        context: Arc<SessionContext>,
        clock: Arc<dyn Clock>,
        offset: FixedOffset,
    ) -> Self {
        Self {
            tickets,
            context,
            clock,
            offset,
        }
    }

    /// Today's date in the configured offset.
    pub fn today(&self) -> NaiveDate {
        self.clock.utc().with_timezone(&self.offset).date_naive()
    }
}

impl<T> DashboardService<T>
where
    T: TicketRepository,
{
    /// Counts for tickets created on `day`, from 00:00:00.000 to
    /// 23:59:59.999 local time.
    pub async fn counts_for_day(&self, day: NaiveDate) -> Result<StatusCounts, Error> {
        self.context.require_user()?;
        let window = local_day_window(day, day, self.offset)?;
        let tickets = self
            .tickets
            .list_in_window(&window)
            .await
            .map_err(map_ticket_error)?;
        Ok(StatusCounts::tally(&tickets))
    }

    /// Counts for today.
    pub async fn counts_for_today(&self) -> Result<StatusCounts, Error> {
        self.counts_for_day(self.today()).await
    }
}
