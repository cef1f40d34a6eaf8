//! Notification sinks for headless front ends.
//!
//! [`TracingNotifier`] writes each notification to the log at a level that
//! matches its severity. [`ChannelNotifier`] hands them to whoever drains
//! the receiving end, such as a terminal renderer.

use tokio::sync::mpsc;
use tracing::{error, info};

use crate::domain::ports::Notifier;
use crate::domain::{Notification, NotificationLevel};

/// Notifier that logs through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: Notification) {
        match notification.level {
            NotificationLevel::Error => error!(message = %notification.message, "notification"),
            level => info!(%level, message = %notification.message, "notification"),
        }
    }
}

/// Notifier that forwards into an unbounded channel.
///
/// Notifications sent after the receiver is dropped are discarded.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    sender: mpsc::UnboundedSender<Notification>,
}

impl ChannelNotifier {
    /// Notifier plus the receiving end of its queue.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, notification: Notification) {
        if self.sender.send(notification).is_err() {
            tracing::debug!("notification dropped: no receiver");
        }
    }
}
