//! Translation of [`RestError`] into each port's error type.

use super::client::RestError;
use crate::domain::ports::{
    CommentRepositoryError, GatewayConfigRepositoryError, TicketRepositoryError,
    UserRepositoryError,
};

pub(super) fn user_error(error: RestError) -> UserRepositoryError {
    match error {
        RestError::Transport { message } | RestError::Endpoint { message } => {
            UserRepositoryError::connection(message)
        }
        ref status if status.is_auth_failure() => {
            UserRepositoryError::unauthorized(status.to_string())
        }
        other => UserRepositoryError::query(other.to_string()),
    }
}

pub(super) fn ticket_error(error: RestError) -> TicketRepositoryError {
    match error {
        RestError::Transport { message } | RestError::Endpoint { message } => {
            TicketRepositoryError::connection(message)
        }
        ref status if status.is_auth_failure() => {
            TicketRepositoryError::unauthorized(status.to_string())
        }
        other => TicketRepositoryError::query(other.to_string()),
    }
}

pub(super) fn comment_error(error: RestError) -> CommentRepositoryError {
    match error {
        RestError::Transport { message } | RestError::Endpoint { message } => {
            CommentRepositoryError::connection(message)
        }
        ref status if status.is_auth_failure() => {
            CommentRepositoryError::unauthorized(status.to_string())
        }
        other => CommentRepositoryError::query(other.to_string()),
    }
}

pub(super) fn gateway_config_error(error: RestError) -> GatewayConfigRepositoryError {
    match error {
        RestError::Transport { message } | RestError::Endpoint { message } => {
            GatewayConfigRepositoryError::connection(message)
        }
        ref status if status.is_auth_failure() => {
            GatewayConfigRepositoryError::unauthorized(status.to_string())
        }
        other => GatewayConfigRepositoryError::query(other.to_string()),
    }
}
