//! Explicit status transition table.
//!
//! | actor                         | current status | allowed targets             |
//! |-------------------------------|----------------|-----------------------------|
//! | admin / ti                    | any            | every status but the current|
//! | usuario who opened the ticket | fechado        | reaberto                    |
//! | usuario, otherwise            | any            | none                        |

use super::error::Error;
use super::ticket::{Ticket, TicketStatus};
use super::user::User;

/// Statuses `actor` may write on `ticket`, in display order.
pub fn allowed_targets(actor: &User, ticket: &Ticket) -> Vec<TicketStatus> {
    if actor.is_staff() {
        return TicketStatus::ALL
            .into_iter()
            .filter(|status| *status != ticket.status)
            .collect();
    }
    if ticket.is_opened_by(actor.id()) && ticket.status == TicketStatus::Closed {
        return vec![TicketStatus::Reopened];
    }
    Vec::new()
}

/// Whether the status control should be offered at all.
pub fn can_change_status(actor: &User, ticket: &Ticket) -> bool {
    !allowed_targets(actor, ticket).is_empty()
}

/// Check a requested transition against the table.
///
/// Writing the current status is an invalid request; any other target
/// outside the table is forbidden.
pub fn authorize_transition(
    actor: &User,
    ticket: &Ticket,
    target: TicketStatus,
) -> Result<(), Error> {
    if target == ticket.status {
        return Err(Error::invalid_request(format!(
            "ticket is already {}",
            target.label()
        )));
    }
    if allowed_targets(actor, ticket).contains(&target) {
        Ok(())
    } else {
        Err(Error::forbidden(format!(
            "{} may not move this ticket from {} to {}",
            actor.role(),
            ticket.status.label(),
            target.label()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ErrorCode, Role, TicketId, UserId};
    use chrono::Utc;
    use rstest::{fixture, rstest};

    fn user(role: Role) -> User {
        User::try_from_strings(
            UserId::random().as_ref(),
            "someone@example.com",
            "Someone",
            role,
        )
        .expect("valid user")
    }

    #[fixture]
    fn requester() -> User {
        user(Role::Requester)
    }

    fn ticket_for(owner: &User, status: TicketStatus) -> Ticket {
        let now = Utc::now();
        Ticket {
            id: TicketId::random(),
            title: "VPN".to_owned(),
            description: "Cannot connect".to_owned(),
            status,
            requester_id: owner.id().clone(),
            technician_id: None,
            created_at: now,
            updated_at: Some(now),
        }
    }

    #[rstest]
    #[case(Role::Admin)]
    #[case(Role::Technician)]
    fn staff_may_set_any_other_status(#[case] role: Role) {
        let actor = user(role);
        for current in TicketStatus::ALL {
            let ticket = ticket_for(&actor, current);
            let targets = allowed_targets(&actor, &ticket);
            assert_eq!(targets.len(), 3);
            assert!(!targets.contains(&current));
        }
    }

    #[rstest]
    #[case(TicketStatus::Open, false)]
    #[case(TicketStatus::InProgress, false)]
    #[case(TicketStatus::Closed, true)]
    #[case(TicketStatus::Reopened, false)]
    fn requester_control_enabled_only_on_closed_own_ticket(
        requester: User,
        #[case] status: TicketStatus,
        #[case] enabled: bool,
    ) {
        let ticket = ticket_for(&requester, status);
        assert_eq!(can_change_status(&requester, &ticket), enabled);
    }

    #[rstest]
    fn requester_cannot_touch_someone_elses_closed_ticket(requester: User) {
        let other = user(Role::Requester);
        let ticket = ticket_for(&other, TicketStatus::Closed);
        assert!(!can_change_status(&requester, &ticket));
    }

    #[rstest]
    fn requester_may_only_reopen(requester: User) {
        let ticket = ticket_for(&requester, TicketStatus::Closed);
        assert!(authorize_transition(&requester, &ticket, TicketStatus::Reopened).is_ok());
        let err = authorize_transition(&requester, &ticket, TicketStatus::Open)
            .expect_err("requester may not reopen as open");
        assert_eq!(err.code(), ErrorCode::Forbidden);
    }

    #[rstest]
    fn writing_the_current_status_is_invalid() {
        let actor = user(Role::Technician);
        let ticket = ticket_for(&actor, TicketStatus::InProgress);
        let err = authorize_transition(&actor, &ticket, TicketStatus::InProgress)
            .expect_err("no-op transition");
        assert_eq!(err.code(), ErrorCode::InvalidRequest);
    }

    #[rstest]
    fn staff_may_close_directly_from_open() {
        let actor = user(Role::Admin);
        let ticket = ticket_for(&actor, TicketStatus::Open);
        assert!(authorize_transition(&actor, &ticket, TicketStatus::Closed).is_ok());
    }
}
