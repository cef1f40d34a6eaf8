//! Adapters for the managed backend's REST surface.
//!
//! Tables are reached through PostgREST-style endpoints under `rest/v1`; the
//! auth service lives under `auth/v1`. All adapters share one [`RestClient`]
//! so the signed-in session's token flows to every request.

mod auth;
mod client;
mod comments;
mod dto;
mod errors;
mod gateway_config;
mod query;
mod tickets;
mod users;

pub use auth::RestAuthGateway;
pub use client::{RestClient, RestError};
pub use comments::RestCommentRepository;
pub use gateway_config::RestGatewayConfigRepository;
pub use tickets::RestTicketRepository;
pub use users::RestUserRepository;
