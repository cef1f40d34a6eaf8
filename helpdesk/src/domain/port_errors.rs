//! Mapping from port errors to domain errors, shared by the services.

use serde_json::json;

use super::Error;
use super::ports::{
    AuthGatewayError, ChangeFeedError, CommentRepositoryError, GatewayConfigRepositoryError,
    MessagingGatewayError, TicketRepositoryError, UserRepositoryError,
};

pub(crate) fn map_auth_error(error: AuthGatewayError) -> Error {
    match error {
        AuthGatewayError::InvalidCredentials => Error::unauthorized("invalid email or password"),
        AuthGatewayError::Rejected { message } => Error::invalid_request(message),
        AuthGatewayError::Connection { message } => {
            Error::service_unavailable(format!("auth backend unavailable: {message}"))
        }
    }
}

pub(crate) fn map_user_error(error: UserRepositoryError) -> Error {
    match error {
        UserRepositoryError::Connection { message } => {
            Error::service_unavailable(format!("user repository unavailable: {message}"))
        }
        UserRepositoryError::Query { message } => {
            Error::internal(format!("user repository error: {message}"))
        }
        UserRepositoryError::Unauthorized { message } => Error::unauthorized(message),
        UserRepositoryError::NotFound { id } => Error::not_found(format!("user {id} not found")),
    }
}

pub(crate) fn map_ticket_error(error: TicketRepositoryError) -> Error {
    match error {
        TicketRepositoryError::Connection { message } => {
            Error::service_unavailable(format!("ticket repository unavailable: {message}"))
        }
        TicketRepositoryError::Query { message } => {
            Error::internal(format!("ticket repository error: {message}"))
        }
        TicketRepositoryError::Unauthorized { message } => Error::unauthorized(message),
        TicketRepositoryError::NotFound { id } => {
            Error::not_found(format!("ticket {id} not found"))
        }
        TicketRepositoryError::StaleWrite { id } => {
            Error::conflict("ticket was changed by someone else; reload and try again")
                .with_details(json!({ "ticketId": id, "code": "stale_write" }))
        }
    }
}

pub(crate) fn map_comment_error(error: CommentRepositoryError) -> Error {
    match error {
        CommentRepositoryError::Connection { message } => {
            Error::service_unavailable(format!("comment repository unavailable: {message}"))
        }
        CommentRepositoryError::Query { message } => {
            Error::internal(format!("comment repository error: {message}"))
        }
        CommentRepositoryError::Unauthorized { message } => Error::unauthorized(message),
    }
}

pub(crate) fn map_change_feed_error(error: ChangeFeedError) -> Error {
    match error {
        ChangeFeedError::Connection { message } => {
            Error::service_unavailable(format!("realtime feed unavailable: {message}"))
        }
        ChangeFeedError::Rejected { message } => {
            Error::internal(format!("realtime subscription rejected: {message}"))
        }
    }
}

pub(crate) fn map_gateway_config_error(error: GatewayConfigRepositoryError) -> Error {
    match error {
        GatewayConfigRepositoryError::Connection { message } => {
            Error::service_unavailable(format!("gateway config unavailable: {message}"))
        }
        GatewayConfigRepositoryError::Query { message } => {
            Error::internal(format!("gateway config error: {message}"))
        }
        GatewayConfigRepositoryError::Unauthorized { message } => Error::unauthorized(message),
    }
}

pub(crate) fn map_messaging_error(error: MessagingGatewayError) -> Error {
    match error {
        MessagingGatewayError::NotFound => {
            Error::not_found("server not found; check the gateway URL")
        }
        MessagingGatewayError::Unauthorized => Error::unauthorized("invalid API key"),
        MessagingGatewayError::Unreachable { message } => Error::service_unavailable(format!(
            "server is not responding; check the URL and that the server is online ({message})"
        )),
        MessagingGatewayError::Status { status, message } => {
            Error::service_unavailable(format!("error {status}: {message}"))
                .with_details(json!({ "status": status }))
        }
        MessagingGatewayError::Decode { message } => {
            Error::internal(format!("unexpected gateway response: {message}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ErrorCode;
    use rstest::rstest;

    #[rstest]
    #[case(TicketRepositoryError::connection("down"), ErrorCode::ServiceUnavailable)]
    #[case(TicketRepositoryError::query("syntax"), ErrorCode::InternalError)]
    #[case(TicketRepositoryError::unauthorized("JWT expired"), ErrorCode::Unauthorized)]
    #[case(TicketRepositoryError::not_found("t-1"), ErrorCode::NotFound)]
    #[case(TicketRepositoryError::stale_write("t-1"), ErrorCode::Conflict)]
    fn ticket_errors_map_to_codes(#[case] error: TicketRepositoryError, #[case] code: ErrorCode) {
        assert_eq!(map_ticket_error(error).code(), code);
    }

    #[rstest]
    fn stale_writes_carry_the_ticket_id() {
        let err = map_ticket_error(TicketRepositoryError::stale_write("t-9"));
        let details = err.details().expect("details present");
        assert_eq!(details["ticketId"], "t-9");
    }

    #[rstest]
    #[case(MessagingGatewayError::not_found(), ErrorCode::NotFound, "server not found")]
    #[case(MessagingGatewayError::unauthorized(), ErrorCode::Unauthorized, "invalid API key")]
    #[case(
        MessagingGatewayError::unreachable("timeout"),
        ErrorCode::ServiceUnavailable,
        "not responding"
    )]
    #[case(
        MessagingGatewayError::status(500_u16, "boom"),
        ErrorCode::ServiceUnavailable,
        "error 500: boom"
    )]
    fn messaging_errors_keep_operator_hints(
        #[case] error: MessagingGatewayError,
        #[case] code: ErrorCode,
        #[case] fragment: &str,
    ) {
        let mapped = map_messaging_error(error);
        assert_eq!(mapped.code(), code);
        assert!(mapped.message().contains(fragment), "{}", mapped.message());
    }

    #[rstest]
    fn invalid_credentials_are_unauthorized() {
        let err = map_auth_error(AuthGatewayError::invalid_credentials());
        assert_eq!(err.code(), ErrorCode::Unauthorized);
    }
}
