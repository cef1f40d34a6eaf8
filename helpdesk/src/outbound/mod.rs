//! Outbound adapters implementing domain ports for external infrastructure.
//!
//! This module follows the hexagonal architecture pattern, providing concrete
//! implementations of domain port traits:
//!
//! - **rest**: auth and table access over the backend's REST gateway
//! - **realtime**: row-change subscriptions over the websocket channel service
//! - **evolution**: WhatsApp gateway health and instance listing
//! - **notify**: log- and channel-backed notification sinks
//! - **report_file**: saving rendered reports to disk
//!
//! Adapters are thin translators that convert between domain types and
//! wire representations. They contain no business logic.

pub mod evolution;
pub mod notify;
pub mod realtime;
pub mod report_file;
pub mod rest;
