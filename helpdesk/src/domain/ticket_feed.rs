//! Paginated ticket feed that follows realtime changes.
//!
//! [`TicketFeed`] owns the listing state a view renders: the current page of
//! tickets, the exact match count and a loading flag. Every refetch is
//! stamped with a sequence number and only the newest result is applied, so a
//! slow superseded read can never overwrite fresher state. Each applied page
//! is also published on a watch channel for views that redraw on change.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use pagination::{PageRequest, total_pages};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::port_errors::{map_change_feed_error, map_ticket_error};
use super::ports::{ChangeFeed, Notifier, TicketRepository};
use super::{
    ChangeFilter, DateWindow, Error, Notification, Role, Table, TicketPageQuery, TicketSummary,
    User,
};

/// Point-in-time view of the feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedSnapshot {
    pub tickets: Vec<TicketSummary>,
    pub loading: bool,
    pub total_count: u64,
    pub total_pages: u64,
    pub current_page: u32,
}

#[derive(Debug)]
struct FeedState {
    query: TicketPageQuery,
    tickets: Vec<TicketSummary>,
    loading: bool,
    total_count: u64,
    issued: u64,
    applied: u64,
}

impl FeedState {
    fn snapshot(&self) -> FeedSnapshot {
        FeedSnapshot {
            tickets: self.tickets.clone(),
            loading: self.loading,
            total_count: self.total_count,
            total_pages: total_pages(self.total_count, self.query.request.size()),
            current_page: self.query.request.page(),
        }
    }
}

/// Listing state for one page of tickets.
pub struct TicketFeed<R> {
    repo: Arc<R>,
    state: Mutex<FeedState>,
    published: watch::Sender<FeedSnapshot>,
}

impl<R> TicketFeed<R> {
    /// Empty feed over `query`; nothing is read until the first refetch.
    pub fn new(repo: Arc<R>, query: TicketPageQuery) -> Self {
        let state = FeedState {
            query,
            tickets: Vec::new(),
            loading: false,
            total_count: 0,
            issued: 0,
            applied: 0,
        };
        let (published, _) = watch::channel(state.snapshot());
        Self {
            repo,
            state: Mutex::new(state),
            published,
        }
    }

    fn lock(&self) -> MutexGuard<'_, FeedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current state. The count reads as zero until the first fetch lands.
    pub fn snapshot(&self) -> FeedSnapshot {
        self.lock().snapshot()
    }

    /// Receiver that changes whenever a refetch applies a new page.
    ///
    /// The value present at subscription time counts as already seen.
    pub fn pages(&self) -> watch::Receiver<FeedSnapshot> {
        self.published.subscribe()
    }

    /// Query used by the next refetch.
    pub fn query(&self) -> TicketPageQuery {
        self.lock().query
    }

    /// Move to another page; takes effect on the next refetch.
    pub fn set_page(&self, request: PageRequest) {
        self.lock().query.request = request;
    }

    /// Change the date filter and go back to the first page.
    pub fn set_window(&self, window: DateWindow) {
        let mut state = self.lock();
        state.query.window = window;
        if let Ok(first) = state.query.request.with_page(1) {
            state.query.request = first;
        }
    }
}

impl<R> TicketFeed<R>
where
    R: TicketRepository,
{
    /// Re-read the current page.
    ///
    /// Safe to call concurrently with itself: the newest issued request wins.
    /// On failure the previous tickets and count stay in place.
    pub async fn refetch(&self) -> Result<FeedSnapshot, Error> {
        let (sequence, query) = {
            let mut state = self.lock();
            state.issued += 1;
            state.loading = true;
            (state.issued, state.query)
        };

        let result = self.repo.fetch_page(&query).await;

        let mut state = self.lock();
        if sequence == state.issued {
            state.loading = false;
        }
        match result {
            Ok(page) => {
                if sequence > state.applied {
                    state.applied = sequence;
                    state.total_count = page.total_count();
                    state.tickets = page.into_items();
                    self.published.send_replace(state.snapshot());
                } else {
                    debug!(sequence, applied = state.applied, "discarded superseded ticket page");
                }
                Ok(state.snapshot())
            }
            Err(err) => {
                warn!(error = %err, "ticket page fetch failed");
                Err(map_ticket_error(err))
            }
        }
    }
}

impl<R> TicketFeed<R>
where
    R: TicketRepository + 'static,
{
    /// Refetch once for every insert, update or delete on the ticket table,
    /// whether or not the change touches the visible page.
    ///
    /// Refetch failures go to `notifier`; the watch keeps running.
    pub async fn watch<C, N>(
        self: &Arc<Self>,
        changes: &C,
        notifier: Arc<N>,
    ) -> Result<FeedWatch, Error>
    where
        C: ChangeFeed + ?Sized,
        N: Notifier + ?Sized + 'static,
    {
        let mut subscription = changes
            .watch(ChangeFilter::table(Table::Tickets))
            .await
            .map_err(map_change_feed_error)?;
        debug!("ticket feed subscribed to ticket changes");

        let feed = Arc::clone(self);
        let task = tokio::spawn(async move {
            while let Some(event) = subscription.next().await {
                debug!(kind = event.kind.as_str(), "ticket change received; refetching");
                if let Err(err) = feed.refetch().await {
                    notifier.notify(Notification::from(&err));
                }
            }
            debug!("ticket change subscription ended");
        });
        Ok(FeedWatch { task })
    }
}

/// Running realtime watch for a [`TicketFeed`]. Stops on drop.
#[derive(Debug)]
pub struct FeedWatch {
    task: JoinHandle<()>,
}

impl FeedWatch {
    /// Stop watching and release the subscription.
    pub fn stop(self) {
        self.task.abort();
    }

    /// Whether the watch task has ended.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for FeedWatch {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// "My tickets": requesters see what they opened, technicians and
/// administrators see what is assigned to them.
pub fn owned_by<'a>(
    user: &User,
    tickets: impl IntoIterator<Item = &'a TicketSummary>,
) -> Vec<&'a TicketSummary> {
    tickets
        .into_iter()
        .filter(|summary| match user.role() {
            Role::Requester => summary.ticket.is_opened_by(user.id()),
            Role::Technician | Role::Admin => summary.ticket.is_assigned_to(user.id()),
        })
        .collect()
}
