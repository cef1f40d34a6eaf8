//! Helpdesk client library.
//!
//! The domain layer holds tickets, users, status rules and the services a
//! front end composes; outbound adapters talk to the managed backend over
//! REST and its realtime websocket, and to the WhatsApp messaging gateway.

pub mod config;
pub mod domain;
pub mod outbound;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use config::{HelpdeskSettings, SettingsError};
