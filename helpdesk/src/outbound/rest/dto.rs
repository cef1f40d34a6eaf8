//! Row DTOs for the backend tables.
//!
//! Reads decode into these first and convert to domain values in one pass;
//! writes serialise the exact columns the backend expects.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{
    Comment, CommentId, GatewayConfig, GatewayCredentials, PartyRef, Role, Ticket, TicketId,
    TicketStatus, TicketSummary, User, UserId,
};

fn default_active() -> bool {
    true
}

/// Embedded `name,email` projection of a user row.
#[derive(Debug, Deserialize)]
pub(super) struct PartyDto {
    name: Option<String>,
    email: Option<String>,
}

impl PartyDto {
    fn into_domain(self) -> Option<PartyRef> {
        let name = self.name.filter(|name| !name.trim().is_empty())?;
        Some(PartyRef {
            name,
            email: self.email,
        })
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct UserRow {
    id: String,
    name: String,
    email: String,
    role: String,
    #[serde(default = "default_active")]
    status: bool,
}

impl UserRow {
    pub(super) fn into_domain(self) -> Result<User, String> {
        let role: Role = self
            .role
            .parse()
            .map_err(|err| format!("user {}: {err}", self.id))?;
        User::try_from_strings(&self.id, &self.email, &self.name, role)
            .map(|user| user.with_active(self.status))
            .map_err(|err| format!("user {}: {err}", self.id))
    }
}

#[derive(Debug, Serialize)]
pub(super) struct NewUserRow<'a> {
    pub(super) id: &'a str,
    pub(super) name: &'a str,
    pub(super) email: &'a str,
    pub(super) role: &'a str,
    pub(super) status: bool,
}

impl<'a> NewUserRow<'a> {
    pub(super) fn from_user(user: &'a User) -> Self {
        Self {
            id: user.id().as_ref(),
            name: user.name().as_ref(),
            email: user.email().as_ref(),
            role: user.role().as_str(),
            status: user.is_active(),
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct UserPatch<'a> {
    pub(super) name: &'a str,
    pub(super) role: &'a str,
    pub(super) status: bool,
}

#[derive(Debug, Serialize)]
pub(super) struct ActivePatch {
    pub(super) status: bool,
}

#[derive(Debug, Deserialize)]
pub(super) struct TicketRow {
    id: Uuid,
    title: String,
    #[serde(default)]
    description: Option<String>,
    status: String,
    user_id: String,
    #[serde(default)]
    ti_id: Option<String>,
    created_at: DateTime<Utc>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    requester: Option<PartyDto>,
    #[serde(default)]
    technician: Option<PartyDto>,
}

impl TicketRow {
    pub(super) fn into_summary(self) -> Result<TicketSummary, String> {
        let id = self.id;
        let status: TicketStatus = self
            .status
            .parse()
            .map_err(|err| format!("ticket {id}: {err}"))?;
        let requester_id =
            UserId::new(&self.user_id).map_err(|err| format!("ticket {id}: {err}"))?;
        let technician_id = self
            .ti_id
            .as_deref()
            .filter(|raw| !raw.trim().is_empty())
            .map(UserId::new)
            .transpose()
            .map_err(|err| format!("ticket {id}: {err}"))?;
        Ok(TicketSummary {
            ticket: Ticket {
                id: TicketId::from_uuid(id),
                title: self.title,
                description: self.description.unwrap_or_default(),
                status,
                requester_id,
                technician_id,
                created_at: self.created_at,
                updated_at: self.updated_at,
            },
            requester: self.requester.and_then(PartyDto::into_domain),
            technician: self.technician.and_then(PartyDto::into_domain),
        })
    }

    pub(super) fn into_ticket(self) -> Result<Ticket, String> {
        self.into_summary().map(|summary| summary.ticket)
    }
}

#[derive(Debug, Serialize)]
pub(super) struct NewTicketRow<'a> {
    pub(super) title: &'a str,
    pub(super) description: &'a str,
    pub(super) status: &'static str,
    pub(super) user_id: &'a str,
    pub(super) ti_id: &'a str,
    pub(super) created_at: DateTime<Utc>,
    pub(super) updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub(super) struct StatusPatch {
    pub(super) status: &'static str,
    pub(super) updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub(super) struct ReassignPatch<'a> {
    pub(super) ti_id: &'a str,
    pub(super) updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub(super) struct CommentRow {
    id: Uuid,
    ticket_id: Uuid,
    user_id: String,
    content: String,
    created_at: DateTime<Utc>,
    #[serde(default)]
    author: Option<PartyDto>,
}

impl CommentRow {
    pub(super) fn into_domain(self) -> Result<Comment, String> {
        let author_id =
            UserId::new(&self.user_id).map_err(|err| format!("comment {}: {err}", self.id))?;
        Ok(Comment {
            id: CommentId::from_uuid(self.id),
            ticket_id: TicketId::from_uuid(self.ticket_id),
            author_id,
            author: self.author.and_then(PartyDto::into_domain),
            content: self.content,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, Serialize)]
pub(super) struct NewCommentRow<'a> {
    pub(super) ticket_id: Uuid,
    pub(super) user_id: &'a str,
    pub(super) content: &'a str,
    pub(super) created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub(super) struct GatewayConfigRow {
    id: Uuid,
    server_url: String,
    api_key: String,
    created_at: DateTime<Utc>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
}

impl GatewayConfigRow {
    pub(super) fn into_domain(self) -> Result<GatewayConfig, String> {
        let credentials = GatewayCredentials::new(&self.server_url, &self.api_key)
            .map_err(|err| format!("gateway config {}: {err}", self.id))?;
        Ok(GatewayConfig {
            id: self.id,
            credentials,
            created_at: self.created_at,
            updated_at: self.updated_at.unwrap_or(self.created_at),
        })
    }
}

#[derive(Debug, Serialize)]
pub(super) struct GatewayConfigWrite<'a> {
    pub(super) server_url: &'a str,
    pub(super) api_key: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) created_at: Option<DateTime<Utc>>,
    pub(super) updated_at: DateTime<Utc>,
}
