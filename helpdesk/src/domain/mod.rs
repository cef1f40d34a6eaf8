//! Domain primitives, ports and services.
//!
//! Purpose: model the helpdesk (users, tickets, comments, realtime changes,
//! the messaging gateway) as strongly typed values and drive every workflow
//! through the traits in [`ports`]. Services read the signed-in user from a
//! shared [`SessionContext`] instead of receiving it per call.
//!
//! Public surface:
//! - Error (alias to `error::Error`): failure payload shared by services.
//! - SessionService: sign-in, sign-out and session bootstrap.
//! - TicketFeed: paginated listing that refetches on realtime changes.
//! - NotificationListener: per-user assignment and status notices.
//! - TicketDesk: ticket detail, status transitions and comments.
//! - QueueService, DashboardService, ReportService: read models.
//! - UserAdminService, GatewayConnectionService: administration.

pub mod auth;
pub mod change_bus;
pub mod changes;
pub mod comment;
pub mod dashboard;
pub mod error;
pub mod gateway;
pub mod messaging;
pub mod notification;
pub mod notification_listener;
pub(crate) mod port_errors;
pub mod ports;
pub mod report;
pub mod session;
pub mod session_service;
pub mod status_policy;
pub mod ticket;
pub mod ticket_desk;
pub mod ticket_feed;
pub mod triage;
pub mod user;
pub mod user_admin;

pub use self::auth::{AccessToken, AuthSession, LoginCredentials, LoginValidationError};
pub use self::change_bus::ChangeBus;
pub use self::changes::{
    ChangeEvent, ChangeFilter, ChangeKind, ChangeSubscription, ColumnFilter, Table,
};
pub use self::comment::{Comment, CommentId, CommentValidationError, NewComment};
pub use self::dashboard::{DashboardService, StatusCounts};
pub use self::error::{Error, ErrorCode, ErrorValidationError};
pub use self::gateway::{
    GatewayConfig, GatewayCredentials, GatewayInstance, GatewayValidationError,
};
pub use self::messaging::{GatewayConnection, GatewayConnectionService};
pub use self::notification::{Notification, NotificationLevel};
pub use self::notification_listener::{ListenerHandle, NotificationListener};
pub use self::report::{ExportWindow, ReportService, TicketReport};
pub use self::session::SessionContext;
pub use self::session_service::SessionService;
pub use self::ticket::{
    DateWindow, NewTicket, PartyRef, Reassignment, StatusUpdate, Ticket, TicketId,
    TicketPageQuery, TicketStatus, TicketSummary, TicketValidationError,
};
pub use self::ticket_desk::{StatusChangeOutcome, TicketDesk, TicketDetail};
pub use self::ticket_feed::{FeedSnapshot, FeedWatch, TicketFeed};
pub use self::triage::{QueueEntry, QueueService};
pub use self::user::{DisplayName, EmailAddress, Role, User, UserId, UserValidationError};
pub use self::user_admin::{ProfileUpdate, UserAdminService};

/// Convenient service result alias.
///
/// # Examples
/// ```
/// use helpdesk::domain::{DomainResult, Error};
///
/// fn guarded() -> DomainResult<()> {
///     Err(Error::forbidden("nope"))
/// }
///
/// assert!(guarded().is_err());
/// ```
pub type DomainResult<T> = Result<T, Error>;
