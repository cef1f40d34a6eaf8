//! Process-wide listener turning ticket changes into notifications.
//!
//! While someone is signed in the listener holds two subscriptions: inserts
//! assigned to them as technician and updates on tickets they opened. Both are
//! dropped when the identity goes away and reopened for the next one.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::port_errors::map_change_feed_error;
use super::ports::{ChangeFeed, Notifier};
use super::{
    ChangeEvent, ChangeFilter, ChangeKind, ChangeSubscription, ColumnFilter, Error, Notification,
    SessionContext, Table, TicketStatus, User,
};

/// Message raised when a ticket is assigned to the signed-in technician.
pub fn assignment_message(event: &ChangeEvent) -> String {
    let title = event.text("title").unwrap_or("untitled");
    format!("New ticket assigned: {title}")
}

/// Message raised when a ticket the signed-in user opened changes.
pub fn status_message(event: &ChangeEvent) -> String {
    let status = event.text("status").unwrap_or("unknown");
    let label = status
        .parse::<TicketStatus>()
        .map_or(status, |parsed| parsed.label());
    format!("Ticket status updated: {label}")
}

/// Builder for the background listener.
pub struct NotificationListener<C: ?Sized, N: ?Sized> {
    context: Arc<SessionContext>,
    changes: Arc<C>,
    notifier: Arc<N>,
}

impl<C, N> NotificationListener<C, N>
where
    C: ChangeFeed + ?Sized + 'static,
    N: Notifier + ?Sized + 'static,
{
    /// Listener for the user signed in to `context`.
    pub fn new(context: Arc<SessionContext>, changes: Arc<C>, notifier: Arc<N>) -> Self {
        Self {
            context,
            changes,
            notifier,
        }
    }

    /// Start following the session. The task runs until the handle is
    /// stopped or dropped.
    pub fn spawn(self) -> ListenerHandle {
        let identity = self.context.subscribe();
        let task = tokio::spawn(self.run(identity));
        ListenerHandle { task }
    }

    async fn run(self, mut identity: watch::Receiver<Option<User>>) {
        loop {
            let current = identity.borrow_and_update().clone();
            if let Some(user) = current {
                match self.open(&user).await {
                    Ok((assigned, updated)) => {
                        debug!(user_id = %user.id(), "notification subscriptions opened");
                        if !self.relay(&mut identity, assigned, updated).await {
                            return;
                        }
                        debug!(user_id = %user.id(), "notification subscriptions released");
                        continue;
                    }
                    Err(err) => {
                        warn!(error = %err, "notification subscriptions failed");
                        self.notifier.notify(Notification::from(&err));
                    }
                }
            }
            if identity.changed().await.is_err() {
                return;
            }
        }
    }

    async fn open(&self, user: &User) -> Result<(ChangeSubscription, ChangeSubscription), Error> {
        let me = user.id().as_ref();
        let assigned = self
            .changes
            .watch(
                ChangeFilter::kind(Table::Tickets, ChangeKind::Insert)
                    .with_column(ColumnFilter::eq("ti_id", me)),
            )
            .await
            .map_err(map_change_feed_error)?;
        let updated = self
            .changes
            .watch(
                ChangeFilter::kind(Table::Tickets, ChangeKind::Update)
                    .with_column(ColumnFilter::eq("user_id", me)),
            )
            .await
            .map_err(map_change_feed_error)?;
        Ok((assigned, updated))
    }

    /// Forward events until the identity changes. Returns `false` when the
    /// session context itself is gone.
    async fn relay(
        &self,
        identity: &mut watch::Receiver<Option<User>>,
        mut assigned: ChangeSubscription,
        mut updated: ChangeSubscription,
    ) -> bool {
        loop {
            tokio::select! {
                changed = identity.changed() => return changed.is_ok(),
                Some(event) = assigned.next() => {
                    self.notifier.notify(Notification::success(assignment_message(&event)));
                }
                Some(event) = updated.next() => {
                    self.notifier.notify(Notification::info(status_message(&event)));
                }
            }
        }
    }
}

/// Running listener. Stops on drop.
#[derive(Debug)]
pub struct ListenerHandle {
    task: JoinHandle<()>,
}

impl ListenerHandle {
    /// Stop listening and release both subscriptions.
    pub fn stop(self) {
        self.task.abort();
    }

    /// Whether the listener task has ended.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
