//! Ticket data model: identifiers, lifecycle status, and listing windows.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use pagination::PageRequest;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::user::UserId;

/// Maximum length of a ticket title, in characters.
pub const TITLE_MAX: usize = 200;

/// Validation errors raised while building ticket values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TicketValidationError {
    InvalidId,
    EmptyTitle,
    TitleTooLong { max: usize },
    EmptyDescription,
    UnknownStatus { value: String },
    InvertedWindow,
}

impl fmt::Display for TicketValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidId => write!(f, "ticket id must be a valid UUID"),
            Self::EmptyTitle => write!(f, "title must not be empty"),
            Self::TitleTooLong { max } => write!(f, "title must be at most {max} characters"),
            Self::EmptyDescription => write!(f, "description must not be empty"),
            Self::UnknownStatus { value } => write!(f, "unknown ticket status '{value}'"),
            Self::InvertedWindow => write!(f, "end date must not be before start date"),
        }
    }
}

impl std::error::Error for TicketValidationError {}

/// Stable ticket identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketId(Uuid);

impl TicketId {
    /// Parse a ticket id from its string form.
    pub fn new(id: impl AsRef<str>) -> Result<Self, TicketValidationError> {
        Uuid::parse_str(id.as_ref())
            .map(Self)
            .map_err(|_| TicketValidationError::InvalidId)
    }

    /// Generate a random id.
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an already parsed UUID.
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Access the underlying UUID.
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Ticket lifecycle status.
///
/// The wire values are the backend's; `"em processo"` is an older spelling of
/// [`TicketStatus::InProgress`] still found in historical rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TicketStatus {
    #[serde(rename = "aberto")]
    Open,
    #[serde(rename = "em_processo", alias = "em processo")]
    InProgress,
    #[serde(rename = "fechado")]
    Closed,
    #[serde(rename = "reaberto")]
    Reopened,
}

impl TicketStatus {
    /// Every status in display order.
    pub const ALL: [TicketStatus; 4] = [
        TicketStatus::Open,
        TicketStatus::InProgress,
        TicketStatus::Closed,
        TicketStatus::Reopened,
    ];

    /// Wire value stored by the backend.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "aberto",
            Self::InProgress => "em_processo",
            Self::Closed => "fechado",
            Self::Reopened => "reaberto",
        }
    }

    /// Human readable label.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Open => "Open",
            Self::InProgress => "In progress",
            Self::Closed => "Closed",
            Self::Reopened => "Reopened",
        }
    }

    /// Whether the ticket still belongs in the triage queue.
    pub const fn is_queued(self) -> bool {
        !matches!(self, Self::Closed)
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketStatus {
    type Err = TicketValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "aberto" => Ok(Self::Open),
            "em_processo" | "em processo" => Ok(Self::InProgress),
            "fechado" => Ok(Self::Closed),
            "reaberto" => Ok(Self::Reopened),
            other => Err(TicketValidationError::UnknownStatus {
                value: other.to_owned(),
            }),
        }
    }
}

/// Ticket row as stored by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub id: TicketId,
    pub title: String,
    pub description: String,
    pub status: TicketStatus,
    /// Requester who opened the ticket.
    pub requester_id: UserId,
    /// Assigned technician, if any.
    pub technician_id: Option<UserId>,
    pub created_at: DateTime<Utc>,
    /// Last write; `None` for rows stored without one.
    pub updated_at: Option<DateTime<Utc>>,
}

impl Ticket {
    /// Whether `user` opened this ticket.
    pub fn is_opened_by(&self, user: &UserId) -> bool {
        &self.requester_id == user
    }

    /// Whether `user` is the assigned technician.
    pub fn is_assigned_to(&self, user: &UserId) -> bool {
        self.technician_id.as_ref() == Some(user)
    }
}

/// Display name and email of a party joined onto a ticket or comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyRef {
    pub name: String,
    pub email: Option<String>,
}

/// Ticket with the requester and technician names resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketSummary {
    pub ticket: Ticket,
    pub requester: Option<PartyRef>,
    pub technician: Option<PartyRef>,
}

impl TicketSummary {
    /// Summary with no joined names.
    pub fn bare(ticket: Ticket) -> Self {
        Self {
            ticket,
            requester: None,
            technician: None,
        }
    }
}

/// Validated input for opening a ticket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTicket {
    title: String,
    description: String,
    requester_id: UserId,
    technician_id: UserId,
    created_at: DateTime<Utc>,
}

impl NewTicket {
    /// Validate the free-text fields. Surrounding whitespace is trimmed.
    pub fn new(
        title: &str,
        description: &str,
        requester_id: UserId,
        technician_id: UserId,
        created_at: DateTime<Utc>,
    ) -> Result<Self, TicketValidationError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(TicketValidationError::EmptyTitle);
        }
        if title.chars().count() > TITLE_MAX {
            return Err(TicketValidationError::TitleTooLong { max: TITLE_MAX });
        }
        let description = description.trim();
        if description.is_empty() {
            return Err(TicketValidationError::EmptyDescription);
        }
        Ok(Self {
            title: title.to_owned(),
            description: description.to_owned(),
            requester_id,
            technician_id,
            created_at,
        })
    }

    /// Trimmed title.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Trimmed description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// User opening the ticket.
    pub fn requester_id(&self) -> &UserId {
        &self.requester_id
    }

    /// Technician it is assigned to.
    pub fn technician_id(&self) -> &UserId {
        &self.technician_id
    }

    /// Creation time.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Materialise the ticket row this input creates; new tickets start
    /// [`TicketStatus::Open`].
    pub fn into_ticket(self, id: TicketId) -> Ticket {
        Ticket {
            id,
            title: self.title,
            description: self.description,
            status: TicketStatus::Open,
            requester_id: self.requester_id,
            technician_id: Some(self.technician_id),
            created_at: self.created_at,
            updated_at: Some(self.created_at),
        }
    }
}

/// Optional inclusive bounds on `created_at`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateWindow {
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
}

impl DateWindow {
    /// Window with no bounds.
    pub const fn unbounded() -> Self {
        Self {
            start: None,
            end: None,
        }
    }

    /// Build a window; both bounds are inclusive.
    pub fn new(
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Self, TicketValidationError> {
        if let (Some(start), Some(end)) = (start, end) {
            if end < start {
                return Err(TicketValidationError::InvertedWindow);
            }
        }
        Ok(Self { start, end })
    }

    /// Inclusive lower bound, if any.
    pub const fn start(&self) -> Option<DateTime<Utc>> {
        self.start
    }

    /// Exclusive upper bound, if any.
    pub const fn end(&self) -> Option<DateTime<Utc>> {
        self.end
    }

    /// Whether `instant` falls inside the window.
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start.is_none_or(|start| instant >= start)
            && self.end.is_none_or(|end| instant <= end)
    }
}

/// One page of the ticket listing, newest first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TicketPageQuery {
    pub request: PageRequest,
    pub window: DateWindow,
}

/// Conditional status write. `expected_updated_at` is the token read with the
/// ticket, `None` when the row had no value; the write fails when the stored
/// value differs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusUpdate {
    pub status: TicketStatus,
    pub updated_at: DateTime<Utc>,
    pub expected_updated_at: Option<DateTime<Utc>>,
}

/// Conditional technician reassignment guarded like [`StatusUpdate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reassignment {
    pub technician_id: UserId,
    pub updated_at: DateTime<Utc>,
    pub expected_updated_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rstest::rstest;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, hour, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    #[rstest]
    #[case("\"aberto\"", TicketStatus::Open)]
    #[case("\"em_processo\"", TicketStatus::InProgress)]
    #[case("\"em processo\"", TicketStatus::InProgress)]
    #[case("\"fechado\"", TicketStatus::Closed)]
    #[case("\"reaberto\"", TicketStatus::Reopened)]
    fn decodes_status_wire_values(#[case] json: &str, #[case] expected: TicketStatus) {
        let status: TicketStatus = serde_json::from_str(json).expect("decode status");
        assert_eq!(status, expected);
    }

    #[rstest]
    fn legacy_spelling_serialises_canonically() {
        let status: TicketStatus = "em processo".parse().expect("legacy spelling");
        assert_eq!(
            serde_json::to_string(&status).expect("encode"),
            "\"em_processo\""
        );
    }

    #[rstest]
    fn unknown_status_is_rejected() {
        assert_eq!(
            "pendente".parse::<TicketStatus>(),
            Err(TicketValidationError::UnknownStatus {
                value: "pendente".to_owned()
            })
        );
    }

    #[rstest]
    #[case("", "desc", TicketValidationError::EmptyTitle)]
    #[case("  ", "desc", TicketValidationError::EmptyTitle)]
    #[case("Printer", " ", TicketValidationError::EmptyDescription)]
    fn new_ticket_rejects_blank_fields(
        #[case] title: &str,
        #[case] description: &str,
        #[case] expected: TicketValidationError,
    ) {
        let result = NewTicket::new(title, description, UserId::random(), UserId::random(), at(9));
        assert_eq!(result, Err(expected));
    }

    #[rstest]
    fn new_ticket_starts_open_and_assigned() {
        let requester = UserId::random();
        let technician = UserId::random();
        let input = NewTicket::new(
            " Printer jammed ",
            "Paper stuck",
            requester.clone(),
            technician.clone(),
            at(9),
        )
        .expect("valid ticket");
        let ticket = input.into_ticket(TicketId::random());
        assert_eq!(ticket.title, "Printer jammed");
        assert_eq!(ticket.status, TicketStatus::Open);
        assert!(ticket.is_opened_by(&requester));
        assert!(ticket.is_assigned_to(&technician));
        assert_eq!(ticket.updated_at, Some(ticket.created_at));
    }

    #[rstest]
    fn window_bounds_are_inclusive() {
        let window = DateWindow::new(Some(at(8)), Some(at(10))).expect("valid window");
        assert!(window.contains(at(8)));
        assert!(window.contains(at(10)));
        assert!(!window.contains(at(10) + Duration::milliseconds(1)));
        assert!(DateWindow::unbounded().contains(at(23)));
    }

    #[rstest]
    fn inverted_window_is_rejected() {
        assert_eq!(
            DateWindow::new(Some(at(10)), Some(at(8))),
            Err(TicketValidationError::InvertedWindow)
        );
    }
}
