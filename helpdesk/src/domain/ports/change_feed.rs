//! Port for realtime change subscriptions.

use async_trait::async_trait;

use crate::domain::{ChangeFilter, ChangeSubscription};

use super::define_port_error;

define_port_error! {
    /// Errors raised while opening a change subscription.
    pub enum ChangeFeedError {
        /// The realtime endpoint could not be reached.
        Connection { message: String } => "realtime connection failed: {message}",
        /// The backend refused the channel join.
        Rejected { message: String } => "realtime subscription rejected: {message}",
    }
}

/// Source of realtime row changes.
///
/// Each call returns an independent handle; events on the handle already
/// satisfy `filter`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChangeFeed: Send + Sync {
    async fn watch(&self, filter: ChangeFilter) -> Result<ChangeSubscription, ChangeFeedError>;
}
