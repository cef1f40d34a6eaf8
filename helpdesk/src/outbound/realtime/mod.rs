//! Realtime change feed over the backend's Phoenix-channel websocket.

mod protocol;
mod socket;

pub use socket::RealtimeFeed;
