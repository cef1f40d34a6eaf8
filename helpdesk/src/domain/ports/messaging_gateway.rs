//! Port for the external messaging gateway's HTTP API.

use async_trait::async_trait;

use crate::domain::{GatewayCredentials, GatewayInstance};

use super::define_port_error;

define_port_error! {
    /// Errors raised by messaging gateway adapters.
    pub enum MessagingGatewayError {
        /// The server answered 404.
        NotFound => "server not found",
        /// The server answered 401.
        Unauthorized => "invalid API key",
        /// No response arrived.
        Unreachable { message: String } => "server is not responding: {message}",
        /// Any other non-success status.
        Status { status: u16, message: String } => "error {status}: {message}",
        /// The response body could not be decoded.
        Decode { message: String } => "failed to decode gateway response: {message}",
    }
}

/// Outbound messaging gateway.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessagingGateway: Send + Sync {
    /// Connectivity probe; `true` when the server reports itself healthy.
    async fn probe(&self, credentials: &GatewayCredentials) -> Result<bool, MessagingGatewayError>;

    /// Instances registered on the server. A non-list body yields an empty
    /// list.
    async fn list_instances(
        &self,
        credentials: &GatewayCredentials,
    ) -> Result<Vec<GatewayInstance>, MessagingGatewayError>;
}
