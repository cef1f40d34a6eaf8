//! `evolution_api_config` table adapter.
//!
//! The table holds at most one meaningful row; callers read the oldest one.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Method;
use uuid::Uuid;

use super::client::{RestClient, RestResponse, first_row};
use super::dto::{GatewayConfigRow, GatewayConfigWrite};
use super::errors::gateway_config_error;
use super::query::RowQuery;
use crate::domain::ports::{GatewayConfigRepository, GatewayConfigRepositoryError};
use crate::domain::{GatewayConfig, GatewayCredentials};

const TABLE: &str = "evolution_api_config";

/// REST-backed [`GatewayConfigRepository`].
#[derive(Clone)]
pub struct RestGatewayConfigRepository {
    client: Arc<RestClient>,
}

impl RestGatewayConfigRepository {
    /// Repository over the single gateway configuration row.
    pub fn new(client: Arc<RestClient>) -> Self {
        Self { client }
    }
}

fn decode_rows(
    response: &RestResponse,
) -> Result<Vec<GatewayConfig>, GatewayConfigRepositoryError> {
    let rows: Vec<GatewayConfigRow> = response.json().map_err(gateway_config_error)?;
    rows.into_iter()
        .map(|row| row.into_domain().map_err(GatewayConfigRepositoryError::query))
        .collect()
}

fn single(response: &RestResponse) -> Result<GatewayConfig, GatewayConfigRepositoryError> {
    first_row(decode_rows(response)?, "gateway config").map_err(gateway_config_error)
}

#[async_trait]
impl GatewayConfigRepository for RestGatewayConfigRepository {
    async fn find_first(&self) -> Result<Option<GatewayConfig>, GatewayConfigRepositoryError> {
        let url = self.client.table_url(TABLE).map_err(gateway_config_error)?;
        let query = RowQuery::select("*").order_asc("created_at").limit(1);
        let request = self
            .client
            .request(Method::GET, url)
            .query(query.pairs());
        let response = self
            .client
            .send(request)
            .await
            .map_err(gateway_config_error)?;
        Ok(decode_rows(&response)?.into_iter().next())
    }

    async fn insert(
        &self,
        credentials: &GatewayCredentials,
        now: DateTime<Utc>,
    ) -> Result<GatewayConfig, GatewayConfigRepositoryError> {
        let url = self.client.table_url(TABLE).map_err(gateway_config_error)?;
        let row = GatewayConfigWrite {
            server_url: credentials.server_url(),
            api_key: credentials.api_key(),
            created_at: Some(now),
            updated_at: now,
        };
        let request = self
            .client
            .request(Method::POST, url)
            .query(RowQuery::select("*").pairs())
            .header("Prefer", "return=representation")
            .json(&[row]);
        let response = self
            .client
            .send(request)
            .await
            .map_err(gateway_config_error)?;
        single(&response)
    }

    async fn update(
        &self,
        id: Uuid,
        credentials: &GatewayCredentials,
        now: DateTime<Utc>,
    ) -> Result<GatewayConfig, GatewayConfigRepositoryError> {
        let url = self.client.table_url(TABLE).map_err(gateway_config_error)?;
        let body = GatewayConfigWrite {
            server_url: credentials.server_url(),
            api_key: credentials.api_key(),
            created_at: None,
            updated_at: now,
        };
        let query = RowQuery::select("*").eq("id", id.to_string());
        let request = self
            .client
            .request(Method::PATCH, url)
            .query(query.pairs())
            .header("Prefer", "return=representation")
            .json(&body);
        let response = self
            .client
            .send(request)
            .await
            .map_err(gateway_config_error)?;
        single(&response)
    }
}
