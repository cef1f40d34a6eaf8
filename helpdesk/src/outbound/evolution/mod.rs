//! Messaging gateway adapter.
//!
//! Thin HTTP implementation of the `MessagingGateway` port for an
//! Evolution-compatible WhatsApp server.

mod dto;
mod http_gateway;

pub use http_gateway::EvolutionHttpGateway;
