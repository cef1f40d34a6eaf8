//! Domain ports and supporting types for the hexagonal boundary.
//!
//! Every external collaborator (auth backend, tables, realtime feed,
//! messaging gateway, notification surface) sits behind one of these traits.
//! Each exposes a typed error so adapters map their failures into predictable
//! variants.

mod macros;
pub(crate) use macros::define_port_error;

mod auth_gateway;
mod change_feed;
mod comment_repository;
mod gateway_config_repository;
mod messaging_gateway;
mod notifier;
mod ticket_repository;
mod user_repository;

#[cfg(test)]
pub use auth_gateway::MockAuthGateway;
pub use auth_gateway::{AuthGateway, AuthGatewayError};
#[cfg(test)]
pub use change_feed::MockChangeFeed;
pub use change_feed::{ChangeFeed, ChangeFeedError};
#[cfg(test)]
pub use comment_repository::MockCommentRepository;
pub use comment_repository::{CommentRepository, CommentRepositoryError};
#[cfg(test)]
pub use gateway_config_repository::MockGatewayConfigRepository;
pub use gateway_config_repository::{GatewayConfigRepository, GatewayConfigRepositoryError};
#[cfg(test)]
pub use messaging_gateway::MockMessagingGateway;
pub use messaging_gateway::{MessagingGateway, MessagingGatewayError};
#[cfg(test)]
pub use notifier::MockNotifier;
pub use notifier::{FixtureNotifier, Notifier};
#[cfg(test)]
pub use ticket_repository::MockTicketRepository;
pub use ticket_repository::{TicketRepository, TicketRepositoryError};
#[cfg(test)]
pub use user_repository::MockUserRepository;
pub use user_repository::{UserRepository, UserRepositoryError};
