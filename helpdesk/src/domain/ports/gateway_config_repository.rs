//! Port for the singleton messaging-gateway configuration row.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{GatewayConfig, GatewayCredentials};

use super::define_port_error;

define_port_error! {
    /// Errors raised by gateway configuration adapters.
    pub enum GatewayConfigRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } => "gateway config connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } => "gateway config query failed: {message}",
        /// The backend rejected the session token.
        Unauthorized { message: String } => "gateway config rejected credentials: {message}",
    }
}

/// Storage for the messaging gateway configuration.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GatewayConfigRepository: Send + Sync {
    /// The first stored row, if any.
    async fn find_first(&self) -> Result<Option<GatewayConfig>, GatewayConfigRepositoryError>;

    async fn insert(
        &self,
        credentials: &GatewayCredentials,
        now: DateTime<Utc>,
    ) -> Result<GatewayConfig, GatewayConfigRepositoryError>;

    async fn update(
        &self,
        id: Uuid,
        credentials: &GatewayCredentials,
        now: DateTime<Utc>,
    ) -> Result<GatewayConfig, GatewayConfigRepositoryError>;
}
