//! `tickets` table adapter.
//!
//! Reads embed the requester and technician names through the `user_id` and
//! `ti_id` foreign keys. Status and technician writes are conditional on the
//! `updated_at` value the caller read; a write that matches no row is either
//! a missing ticket or a stale token.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pagination::Page;
use reqwest::{Method, StatusCode};
use tracing::debug;

use super::client::{RestClient, RestResponse, first_row};
use super::dto::{NewTicketRow, ReassignPatch, StatusPatch, TicketRow};
use super::errors::ticket_error;
use super::query::{RowQuery, parse_content_range, range_header};
use crate::domain::ports::{TicketRepository, TicketRepositoryError};
use crate::domain::{
    DateWindow, NewTicket, Reassignment, StatusUpdate, Ticket, TicketId, TicketPageQuery,
    TicketStatus, TicketSummary,
};

const TABLE: &str = "tickets";
const SUMMARY_SELECT: &str = "*,requester:user_id(name,email),technician:ti_id(name,email)";

/// REST-backed [`TicketRepository`].
#[derive(Clone)]
pub struct RestTicketRepository {
    client: Arc<RestClient>,
}

impl RestTicketRepository {
    /// Repository over the `tickets` table.
    pub fn new(client: Arc<RestClient>) -> Self {
        Self { client }
    }

    async fn get(&self, query: &RowQuery) -> Result<RestResponse, TicketRepositoryError> {
        let url = self.client.table_url(TABLE).map_err(ticket_error)?;
        let request = self
            .client
            .request(Method::GET, url)
            .query(query.pairs());
        self.client.send(request).await.map_err(ticket_error)
    }

    async fn summaries(
        &self,
        query: &RowQuery,
    ) -> Result<Vec<TicketSummary>, TicketRepositoryError> {
        let response = self.get(query).await?;
        decode_summaries(&response)
    }

    /// Conditional PATCH on `id` and the expected `updated_at`.
    async fn conditional_patch<B: serde::Serialize + Sync>(
        &self,
        id: TicketId,
        expected_updated_at: Option<DateTime<Utc>>,
        body: &B,
    ) -> Result<Ticket, TicketRepositoryError> {
        let url = self.client.table_url(TABLE).map_err(ticket_error)?;
        let query = conditional_write(id, expected_updated_at);
        let request = self
            .client
            .request(Method::PATCH, url)
            .query(query.pairs())
            .header("Prefer", "return=representation")
            .json(body);
        let response = self.client.send(request).await.map_err(ticket_error)?;
        let rows: Vec<TicketRow> = response.json().map_err(ticket_error)?;
        match rows.into_iter().next() {
            Some(row) => row.into_ticket().map_err(TicketRepositoryError::query),
            None => {
                let exists = self.find_by_id(id).await?.is_some();
                debug!(ticket_id = %id, exists, "conditional ticket write matched no row");
                if exists {
                    Err(TicketRepositoryError::stale_write(id.to_string()))
                } else {
                    Err(TicketRepositoryError::not_found(id.to_string()))
                }
            }
        }
    }
}

fn decode_summaries(response: &RestResponse) -> Result<Vec<TicketSummary>, TicketRepositoryError> {
    let rows: Vec<TicketRow> = response.json().map_err(ticket_error)?;
    rows.into_iter()
        .map(|row| row.into_summary().map_err(TicketRepositoryError::query))
        .collect()
}

/// Rows with `id` whose `updated_at` still holds the value the caller read.
/// Rows never written since insertion carry no value and match `is.null`.
fn conditional_write(id: TicketId, expected_updated_at: Option<DateTime<Utc>>) -> RowQuery {
    RowQuery::select("*")
        .eq("id", id.to_string())
        .eq_optional_timestamp("updated_at", expected_updated_at)
}

fn newest_first(window: &DateWindow) -> RowQuery {
    RowQuery::select(SUMMARY_SELECT)
        .within("created_at", window)
        .order_desc("created_at")
}

#[async_trait]
impl TicketRepository for RestTicketRepository {
    async fn fetch_page(
        &self,
        query: &TicketPageQuery,
    ) -> Result<Page<TicketSummary>, TicketRepositoryError> {
        let request = query.request;
        let url = self.client.table_url(TABLE).map_err(ticket_error)?;
        let http = self
            .client
            .request(Method::GET, url)
            .query(newest_first(&query.window).pairs())
            .header("Prefer", "count=exact")
            .header("Range-Unit", "items")
            .header(
                reqwest::header::RANGE,
                range_header(request.offset(), request.last_index()),
            );
        let response = self.client.execute(http).await.map_err(ticket_error)?;
        let total = response.content_range.as_deref().and_then(parse_content_range);

        // Pages past the end answer 416 with the total still reported.
        if response.status == StatusCode::RANGE_NOT_SATISFIABLE {
            return Ok(Page::new(Vec::new(), total.unwrap_or(0), request));
        }
        let response = response.success().map_err(ticket_error)?;
        let items = decode_summaries(&response)?;
        let total_count = total.unwrap_or_else(|| request.offset() + items.len() as u64);
        Ok(Page::new(items, total_count, request))
    }

    async fn list_all(&self) -> Result<Vec<TicketSummary>, TicketRepositoryError> {
        self.summaries(&newest_first(&DateWindow::unbounded())).await
    }

    async fn list_in_window(
        &self,
        window: &DateWindow,
    ) -> Result<Vec<TicketSummary>, TicketRepositoryError> {
        self.summaries(&newest_first(window)).await
    }

    async fn find_by_id(
        &self,
        id: TicketId,
    ) -> Result<Option<TicketSummary>, TicketRepositoryError> {
        let query = RowQuery::select(SUMMARY_SELECT)
            .eq("id", id.to_string())
            .limit(1);
        Ok(self.summaries(&query).await?.into_iter().next())
    }

    async fn insert(&self, ticket: &NewTicket) -> Result<Ticket, TicketRepositoryError> {
        let url = self.client.table_url(TABLE).map_err(ticket_error)?;
        let row = NewTicketRow {
            title: ticket.title(),
            description: ticket.description(),
            status: TicketStatus::Open.as_str(),
            user_id: ticket.requester_id().as_ref(),
            ti_id: ticket.technician_id().as_ref(),
            created_at: ticket.created_at(),
            updated_at: ticket.created_at(),
        };
        let request = self
            .client
            .request(Method::POST, url)
            .query(RowQuery::select("*").pairs())
            .header("Prefer", "return=representation")
            .json(&[row]);
        let response = self.client.send(request).await.map_err(ticket_error)?;
        let rows: Vec<TicketRow> = response.json().map_err(ticket_error)?;
        first_row(rows, "ticket")
            .map_err(ticket_error)?
            .into_ticket()
            .map_err(TicketRepositoryError::query)
    }

    async fn update_status(
        &self,
        id: TicketId,
        update: &StatusUpdate,
    ) -> Result<Ticket, TicketRepositoryError> {
        let body = StatusPatch {
            status: update.status.as_str(),
            updated_at: update.updated_at,
        };
        self.conditional_patch(id, update.expected_updated_at, &body)
            .await
    }

    async fn reassign(
        &self,
        id: TicketId,
        reassignment: &Reassignment,
    ) -> Result<Ticket, TicketRepositoryError> {
        let body = ReassignPatch {
            ti_id: reassignment.technician_id.as_ref(),
            updated_at: reassignment.updated_at,
        };
        self.conditional_patch(id, reassignment.expected_updated_at, &body)
            .await
    }
}
