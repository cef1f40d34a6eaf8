//! Port for surfacing transient notifications to the user.

use crate::domain::Notification;

/// Sink for toast-style notifications. Delivery is fire-and-forget.
#[cfg_attr(test, mockall::automock)]
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Notifier that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureNotifier;

impl Notifier for FixtureNotifier {
    fn notify(&self, _notification: Notification) {}
}
