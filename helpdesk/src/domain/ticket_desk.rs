//! Ticket detail, creation, status changes, comments and reassignment.

use std::sync::Arc;

use mockable::Clock;
use tracing::{info, warn};

use super::port_errors::{map_comment_error, map_ticket_error, map_user_error};
use super::ports::{CommentRepository, TicketRepository, UserRepository};
use super::status_policy::{allowed_targets, authorize_transition};
use super::{
    Comment, Error, NewComment, NewTicket, Reassignment, Role, SessionContext, StatusUpdate,
    Ticket, TicketId, TicketStatus, TicketSummary, User, UserId,
};

/// Everything the detail view shows for one ticket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketDetail {
    pub summary: TicketSummary,
    /// Oldest first.
    pub comments: Vec<Comment>,
    /// Statuses the viewer may set; empty hides the control.
    pub allowed_statuses: Vec<TicketStatus>,
    pub can_reassign: bool,
}

/// Result of a status change.
///
/// The status write and the transition comment are two requests. `comment`
/// is `None` when the status was written but the comment insert failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChangeOutcome {
    pub ticket: Ticket,
    pub comment: Option<Comment>,
}

/// Ticket use-cases acting as the signed-in user.
#[derive(Clone)]
pub struct TicketDesk<T, C, U> {
    tickets: Arc<T>,
    comments: Arc<C>,
    users: Arc<U>,
    context: Arc<SessionContext>,
    clock: Arc<dyn Clock>,
}

impl<T, C, U> TicketDesk<T, C, U> {
    /// Desk acting for the session in `context`.
    pub fn new(
        tickets: Arc<T>,
        comments: Arc<C>,
        users: Arc<U>,
        context: Arc<SessionContext>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            tickets,
            comments,
            users,
            context,
            clock,
        }
    }
}

impl<T, C, U> TicketDesk<T, C, U>
where
    T: TicketRepository,
    C: CommentRepository,
    U: UserRepository,
{
    /// Active technicians that can take a ticket.
    pub async fn technicians(&self) -> Result<Vec<User>, Error> {
        self.context.require_user()?;
        self.users
            .list_by_role(Role::Technician)
            .await
            .map_err(map_user_error)
    }

    /// Open a ticket as the signed-in user, assigned to `technician`.
    pub async fn open_ticket(
        &self,
        title: &str,
        description: &str,
        technician: &UserId,
    ) -> Result<Ticket, Error> {
        let requester = self.context.require_user()?;
        self.require_technician(technician).await?;

        let input = NewTicket::new(
            title,
            description,
            requester.id().clone(),
            technician.clone(),
            self.clock.utc(),
        )
        .map_err(|err| Error::invalid_request(err.to_string()))?;

        let ticket = self
            .tickets
            .insert(&input)
            .await
            .map_err(map_ticket_error)?;
        info!(ticket_id = %ticket.id, technician = %technician, "ticket opened");
        Ok(ticket)
    }

    /// Ticket, comments and the controls the viewer is allowed.
    pub async fn detail(&self, id: TicketId) -> Result<TicketDetail, Error> {
        let viewer = self.context.require_user()?;
        let summary = self.load(id).await?;
        let comments = self
            .comments
            .list_for_ticket(id)
            .await
            .map_err(map_comment_error)?;
        let allowed_statuses = allowed_targets(&viewer, &summary.ticket);
        Ok(TicketDetail {
            summary,
            comments,
            allowed_statuses,
            can_reassign: viewer.is_staff(),
        })
    }

    /// Move a ticket to `target` and record the transition as a comment.
    pub async fn change_status(
        &self,
        id: TicketId,
        target: TicketStatus,
    ) -> Result<StatusChangeOutcome, Error> {
        let actor = self.context.require_user()?;
        let current = self.load(id).await?.ticket;
        authorize_transition(&actor, &current, target)?;

        let now = self.clock.utc();
        let update = StatusUpdate {
            status: target,
            updated_at: now,
            expected_updated_at: current.updated_at,
        };
        let ticket = self
            .tickets
            .update_status(id, &update)
            .await
            .map_err(map_ticket_error)?;
        info!(ticket_id = %id, from = %current.status, to = %target, "ticket status changed");

        let note = NewComment::status_change(id, actor.id().clone(), current.status, target, now);
        let comment = match self.comments.insert(&note).await {
            Ok(comment) => Some(comment),
            Err(err) => {
                warn!(
                    ticket_id = %id,
                    error = %err,
                    "status written but transition comment was not recorded"
                );
                None
            }
        };
        Ok(StatusChangeOutcome { ticket, comment })
    }

    /// Append a comment as the signed-in user.
    pub async fn add_comment(&self, id: TicketId, content: &str) -> Result<Comment, Error> {
        let author = self.context.require_user()?;
        let input = NewComment::new(id, author.id().clone(), content, self.clock.utc())
            .map_err(|err| Error::invalid_request(err.to_string()))?;
        self.load(id).await?;
        self.comments
            .insert(&input)
            .await
            .map_err(map_comment_error)
    }

    /// Hand the ticket to another technician. Staff only.
    pub async fn reassign(&self, id: TicketId, technician: &UserId) -> Result<Ticket, Error> {
        let actor = self.context.require_user()?;
        if !actor.is_staff() {
            return Err(Error::forbidden("only technicians can reassign tickets"));
        }
        self.require_technician(technician).await?;
        let current = self.load(id).await?.ticket;
        if current.is_assigned_to(technician) {
            return Err(Error::invalid_request(
                "ticket is already assigned to that technician",
            ));
        }

        let reassignment = Reassignment {
            technician_id: technician.clone(),
            updated_at: self.clock.utc(),
            expected_updated_at: current.updated_at,
        };
        let ticket = self
            .tickets
            .reassign(id, &reassignment)
            .await
            .map_err(map_ticket_error)?;
        info!(ticket_id = %id, technician = %technician, "ticket reassigned");
        Ok(ticket)
    }

    async fn load(&self, id: TicketId) -> Result<TicketSummary, Error> {
        self.tickets
            .find_by_id(id)
            .await
            .map_err(map_ticket_error)?
            .ok_or_else(|| Error::not_found(format!("ticket {id} not found")))
    }

    async fn require_technician(&self, id: &UserId) -> Result<User, Error> {
        let candidate = self.users.find_by_id(id).await.map_err(map_user_error)?;
        match candidate {
            Some(user) if user.is_active() && user.role() == Role::Technician => Ok(user),
            Some(_) => Err(Error::invalid_request(
                "tickets can only be assigned to an active technician",
            )),
            None => Err(Error::invalid_request(format!("technician {id} not found"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::{
        CommentRepositoryError, MockCommentRepository, MockTicketRepository, MockUserRepository,
        TicketRepositoryError,
    };
    use crate::domain::{CommentId, ErrorCode};
    use chrono::{DateTime, Duration, Local, TimeZone, Utc};
    use rstest::{fixture, rstest};

    struct FixedClock(DateTime<Utc>);

    impl Clock for FixedClock {
        fn local(&self) -> DateTime<Local> {
            self.0.with_timezone(&Local)
        }

        fn utc(&self) -> DateTime<Utc> {
            self.0
        }
    }

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 2, 12, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    fn user(role: Role) -> User {
        User::try_from_strings(UserId::random().as_ref(), "u@example.com", "U", role)
            .expect("valid user")
    }

    #[fixture]
    fn technician() -> User {
        user(Role::Technician)
    }

    fn ticket(requester: &User, status: TicketStatus) -> Ticket {
        let created = noon() - Duration::hours(3);
        Ticket {
            id: TicketId::random(),
            title: "Printer".to_owned(),
            description: "Jammed".to_owned(),
            status,
            requester_id: requester.id().clone(),
            technician_id: None,
            created_at: created,
            updated_at: Some(created),
        }
    }

    type Desk = TicketDesk<MockTicketRepository, MockCommentRepository, MockUserRepository>;

    fn desk(
        actor: User,
        tickets: MockTicketRepository,
        comments: MockCommentRepository,
        users: MockUserRepository,
    ) -> Desk {
        TicketDesk::new(
            Arc::new(tickets),
            Arc::new(comments),
            Arc::new(users),
            Arc::new(SessionContext::with_user(actor)),
            Arc::new(FixedClock(noon())),
        )
    }

    #[rstest]
    #[tokio::test]
    async fn status_change_writes_token_and_comment(technician: User) {
        let stored = ticket(&technician, TicketStatus::Open);
        let id = stored.id;
        let token = stored.updated_at;

        let mut tickets = MockTicketRepository::new();
        let found = TicketSummary::bare(stored.clone());
        tickets
            .expect_find_by_id()
            .return_once(move |_| Ok(Some(found)));
        let written = Ticket {
            status: TicketStatus::InProgress,
            updated_at: Some(noon()),
            ..stored
        };
        tickets
            .expect_update_status()
            .withf(move |ticket_id, update| {
                *ticket_id == id
                    && update.status == TicketStatus::InProgress
                    && update.expected_updated_at == token
                    && update.updated_at == noon()
            })
            .return_once(move |_, _| Ok(written));

        let mut comments = MockCommentRepository::new();
        comments
            .expect_insert()
            .withf(|comment| comment.content() == "Status changed from Open to In progress")
            .return_once(|comment| Ok(comment.clone().into_comment(CommentId::random(), None)));

        let desk = desk(technician, tickets, comments, MockUserRepository::new());
        let outcome = desk
            .change_status(id, TicketStatus::InProgress)
            .await
            .expect("status change succeeds");
        assert_eq!(outcome.ticket.status, TicketStatus::InProgress);
        assert!(outcome.comment.is_some());
    }

    #[rstest]
    #[tokio::test]
    async fn failed_comment_keeps_status_change(technician: User) {
        let stored = ticket(&technician, TicketStatus::Open);
        let id = stored.id;
        let mut tickets = MockTicketRepository::new();
        let found = TicketSummary::bare(stored.clone());
        tickets
            .expect_find_by_id()
            .return_once(move |_| Ok(Some(found)));
        let written = Ticket {
            status: TicketStatus::Closed,
            ..stored
        };
        tickets
            .expect_update_status()
            .return_once(move |_, _| Ok(written));
        let mut comments = MockCommentRepository::new();
        comments
            .expect_insert()
            .return_once(|_| Err(CommentRepositoryError::query("constraint")));

        let desk = desk(technician, tickets, comments, MockUserRepository::new());
        let outcome = desk
            .change_status(id, TicketStatus::Closed)
            .await
            .expect("status change still succeeds");
        assert_eq!(outcome.ticket.status, TicketStatus::Closed);
        assert!(outcome.comment.is_none());
    }

    #[rstest]
    #[tokio::test]
    async fn stale_status_write_is_a_conflict(technician: User) {
        let stored = ticket(&technician, TicketStatus::Open);
        let id = stored.id;
        let mut tickets = MockTicketRepository::new();
        tickets
            .expect_find_by_id()
            .return_once(move |_| Ok(Some(TicketSummary::bare(stored))));
        tickets
            .expect_update_status()
            .return_once(move |id, _| Err(TicketRepositoryError::stale_write(id.to_string())));
        let mut comments = MockCommentRepository::new();
        comments.expect_insert().never();

        let desk = desk(technician, tickets, comments, MockUserRepository::new());
        let err = desk
            .change_status(id, TicketStatus::Closed)
            .await
            .expect_err("stale write");
        assert_eq!(err.code(), ErrorCode::Conflict);
    }

    #[rstest]
    #[tokio::test]
    async fn requester_cannot_close_their_open_ticket() {
        let requester = user(Role::Requester);
        let stored = ticket(&requester, TicketStatus::Open);
        let id = stored.id;
        let mut tickets = MockTicketRepository::new();
        tickets
            .expect_find_by_id()
            .return_once(move |_| Ok(Some(TicketSummary::bare(stored))));
        tickets.expect_update_status().never();

        let desk = desk(
            requester,
            tickets,
            MockCommentRepository::new(),
            MockUserRepository::new(),
        );
        let err = desk
            .change_status(id, TicketStatus::Closed)
            .await
            .expect_err("forbidden");
        assert_eq!(err.code(), ErrorCode::Forbidden);
    }

    #[rstest]
    #[tokio::test]
    async fn open_ticket_requires_active_technician(technician: User) {
        let requester = user(Role::Requester);
        let mut users = MockUserRepository::new();
        let inactive = technician.clone().with_active(false);
        users
            .expect_find_by_id()
            .return_once(move |_| Ok(Some(inactive)));
        let mut tickets = MockTicketRepository::new();
        tickets.expect_insert().never();

        let desk = desk(requester, tickets, MockCommentRepository::new(), users);
        let err = desk
            .open_ticket("VPN", "down", technician.id())
            .await
            .expect_err("inactive technician");
        assert_eq!(err.code(), ErrorCode::InvalidRequest);
    }

    #[rstest]
    #[tokio::test]
    async fn open_ticket_stamps_clock_and_requester(technician: User) {
        let requester = user(Role::Requester);
        let requester_id = requester.id().clone();
        let mut users = MockUserRepository::new();
        let found = technician.clone();
        users
            .expect_find_by_id()
            .return_once(move |_| Ok(Some(found)));
        let mut tickets = MockTicketRepository::new();
        tickets
            .expect_insert()
            .withf(move |input| {
                input.requester_id() == &requester_id && input.created_at() == noon()
            })
            .return_once(|input| Ok(input.clone().into_ticket(TicketId::random())));

        let desk = desk(requester, tickets, MockCommentRepository::new(), users);
        let ticket = desk
            .open_ticket(" VPN ", "Tunnel down", technician.id())
            .await
            .expect("ticket opened");
        assert_eq!(ticket.status, TicketStatus::Open);
        assert_eq!(ticket.title, "VPN");
        assert!(ticket.is_assigned_to(technician.id()));
    }

    #[rstest]
    #[tokio::test]
    async fn requesters_cannot_reassign() {
        let requester = user(Role::Requester);
        let desk = desk(
            requester,
            MockTicketRepository::new(),
            MockCommentRepository::new(),
            MockUserRepository::new(),
        );
        let err = desk
            .reassign(TicketId::random(), &UserId::random())
            .await
            .expect_err("forbidden");
        assert_eq!(err.code(), ErrorCode::Forbidden);
    }

    #[rstest]
    #[tokio::test]
    async fn blank_comments_never_reach_the_repository(technician: User) {
        let mut comments = MockCommentRepository::new();
        comments.expect_insert().never();
        let desk = desk(
            technician,
            MockTicketRepository::new(),
            comments,
            MockUserRepository::new(),
        );
        let err = desk
            .add_comment(TicketId::random(), "   ")
            .await
            .expect_err("blank comment");
        assert_eq!(err.code(), ErrorCode::InvalidRequest);
    }
}
