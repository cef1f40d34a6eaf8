//! `users` table adapter.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;

use super::client::RestClient;
use super::dto::{ActivePatch, NewUserRow, UserPatch, UserRow};
use super::errors::user_error;
use super::query::RowQuery;
use crate::domain::ports::{UserRepository, UserRepositoryError};
use crate::domain::{EmailAddress, Role, User, UserId};

const TABLE: &str = "users";

/// REST-backed [`UserRepository`].
#[derive(Clone)]
pub struct RestUserRepository {
    client: Arc<RestClient>,
}

impl RestUserRepository {
    /// Repository over the `users` table.
    pub fn new(client: Arc<RestClient>) -> Self {
        Self { client }
    }

    async fn select(&self, query: RowQuery) -> Result<Vec<User>, UserRepositoryError> {
        let url = self.client.table_url(TABLE).map_err(user_error)?;
        let request = self
            .client
            .request(Method::GET, url)
            .query(query.pairs());
        let response = self.client.send(request).await.map_err(user_error)?;
        let rows: Vec<UserRow> = response.json().map_err(user_error)?;
        rows.into_iter()
            .map(|row| row.into_domain().map_err(UserRepositoryError::query))
            .collect()
    }

    /// PATCH one row; an empty representation means no row matched.
    async fn patch<B: serde::Serialize + Sync>(
        &self,
        id: &UserId,
        body: &B,
    ) -> Result<(), UserRepositoryError> {
        let url = self.client.table_url(TABLE).map_err(user_error)?;
        let request = self
            .client
            .request(Method::PATCH, url)
            .query(RowQuery::select("id").eq("id", id).pairs())
            .header("Prefer", "return=representation")
            .json(body);
        let response = self.client.send(request).await.map_err(user_error)?;
        let touched: Vec<serde_json::Value> = response.json().map_err(user_error)?;
        if touched.is_empty() {
            return Err(UserRepositoryError::not_found(id.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl UserRepository for RestUserRepository {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, UserRepositoryError> {
        let users = self
            .select(RowQuery::select("*").eq("id", id).limit(1))
            .await?;
        Ok(users.into_iter().next())
    }

    async fn find_by_email(
        &self,
        email: &EmailAddress,
    ) -> Result<Option<User>, UserRepositoryError> {
        let users = self
            .select(RowQuery::select("*").eq("email", email).limit(1))
            .await?;
        Ok(users.into_iter().next())
    }

    async fn list_active(&self) -> Result<Vec<User>, UserRepositoryError> {
        self.select(
            RowQuery::select("*")
                .eq_bool("status", true)
                .order_asc("name"),
        )
        .await
    }

    async fn list_by_role(&self, role: Role) -> Result<Vec<User>, UserRepositoryError> {
        self.select(
            RowQuery::select("*")
                .eq("role", role.as_str())
                .eq_bool("status", true)
                .order_asc("name"),
        )
        .await
    }

    async fn insert(&self, user: &User) -> Result<(), UserRepositoryError> {
        let url = self.client.table_url(TABLE).map_err(user_error)?;
        let request = self
            .client
            .request(Method::POST, url)
            .header("Prefer", "return=minimal")
            .json(&[NewUserRow::from_user(user)]);
        self.client.send(request).await.map_err(user_error)?;
        Ok(())
    }

    async fn update(&self, user: &User) -> Result<(), UserRepositoryError> {
        let body = UserPatch {
            name: user.name().as_ref(),
            role: user.role().as_str(),
            status: user.is_active(),
        };
        self.patch(user.id(), &body).await
    }

    async fn set_active(&self, id: &UserId, active: bool) -> Result<(), UserRepositoryError> {
        self.patch(id, &ActivePatch { status: active }).await
    }
}

