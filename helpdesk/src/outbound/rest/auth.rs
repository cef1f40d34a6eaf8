//! Auth service adapter (password grant, sign-up, session check, logout).
//!
//! The session obtained at sign-in is stored on the shared [`RestClient`] so
//! every table adapter sends the user's bearer token afterwards.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::client::{RestClient, RestError};
use crate::domain::ports::{AuthGateway, AuthGatewayError};
use crate::domain::{AccessToken, AuthSession, EmailAddress, LoginCredentials, UserId};

#[derive(Serialize)]
struct PasswordGrant<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct AuthUserDto {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenDto {
    access_token: String,
    user: AuthUserDto,
}

/// Sign-up answers with either a bare user or a session wrapping one.
#[derive(Debug, Deserialize)]
struct SignUpDto {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    user: Option<AuthUserDto>,
}

impl SignUpDto {
    fn user_id(self) -> Option<String> {
        self.user.map(|user| user.id).or(self.id)
    }
}

fn map_rest_error(error: RestError) -> AuthGatewayError {
    match error {
        RestError::Transport { message } | RestError::Endpoint { message } => {
            AuthGatewayError::connection(message)
        }
        RestError::Status { status, message } if status == 400 || status == 401 => {
            if message.to_lowercase().contains("invalid login credentials")
                || message == "invalid_grant"
            {
                AuthGatewayError::invalid_credentials()
            } else {
                AuthGatewayError::rejected(message)
            }
        }
        RestError::Status { message, .. } => AuthGatewayError::rejected(message),
        RestError::Decode { message } => AuthGatewayError::rejected(message),
    }
}

fn session_from(
    token: TokenDto,
    fallback_email: &EmailAddress,
) -> Result<AuthSession, AuthGatewayError> {
    let user_id = UserId::new(&token.user.id)
        .map_err(|err| AuthGatewayError::rejected(format!("auth user id: {err}")))?;
    let email = match token.user.email.as_deref() {
        Some(raw) => EmailAddress::new(raw)
            .map_err(|err| AuthGatewayError::rejected(format!("auth user email: {err}")))?,
        None => fallback_email.clone(),
    };
    Ok(AuthSession::new(
        user_id,
        email,
        AccessToken::new(token.access_token),
    ))
}

/// REST-backed [`AuthGateway`].
#[derive(Clone)]
pub struct RestAuthGateway {
    client: Arc<RestClient>,
}

impl RestAuthGateway {
    /// Auth adapter over the shared client.
    pub fn new(client: Arc<RestClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AuthGateway for RestAuthGateway {
    async fn sign_in_with_password(
        &self,
        credentials: &LoginCredentials,
    ) -> Result<AuthSession, AuthGatewayError> {
        let url = self.client.auth_url("token").map_err(map_rest_error)?;
        let request = self
            .client
            .anonymous(Method::POST, url)
            .query(&[("grant_type", "password")])
            .json(&PasswordGrant {
                email: credentials.email().as_ref(),
                password: credentials.password(),
            });
        let response = self.client.send(request).await.map_err(map_rest_error)?;
        let token: TokenDto = response.json().map_err(map_rest_error)?;
        let session = session_from(token, credentials.email())?;
        debug!(user_id = %session.user_id(), "auth session stored");
        self.client.store_session(Some(session.clone()));
        Ok(session)
    }

    async fn sign_up(&self, credentials: &LoginCredentials) -> Result<UserId, AuthGatewayError> {
        let url = self.client.auth_url("signup").map_err(map_rest_error)?;
        let request = self.client.anonymous(Method::POST, url).json(&PasswordGrant {
            email: credentials.email().as_ref(),
            password: credentials.password(),
        });
        let response = self.client.send(request).await.map_err(map_rest_error)?;
        let body: SignUpDto = response.json().map_err(map_rest_error)?;
        let raw = body
            .user_id()
            .ok_or_else(|| AuthGatewayError::rejected("sign-up returned no user id"))?;
        UserId::new(&raw).map_err(|err| AuthGatewayError::rejected(format!("auth user id: {err}")))
    }

    async fn current_session(&self) -> Result<Option<AuthSession>, AuthGatewayError> {
        let Some(session) = self.client.session() else {
            return Ok(None);
        };
        let url = self.client.auth_url("user").map_err(map_rest_error)?;
        let response = self
            .client
            .execute(self.client.request(Method::GET, url))
            .await
            .map_err(map_rest_error)?;
        match response.success() {
            Ok(_) => Ok(Some(session)),
            Err(err) if err.is_auth_failure() => {
                warn!("stored auth session is no longer valid");
                self.client.store_session(None);
                Ok(None)
            }
            Err(err) => Err(map_rest_error(err)),
        }
    }

    async fn sign_out(&self) -> Result<(), AuthGatewayError> {
        if self.client.session().is_none() {
            return Ok(());
        }
        let url = self.client.auth_url("logout").map_err(map_rest_error)?;
        let outcome = self
            .client
            .send(self.client.request(Method::POST, url))
            .await;
        self.client.store_session(None);
        match outcome {
            Ok(_) => Ok(()),
            Err(err) if err.is_auth_failure() => Ok(()),
            Err(err) => Err(map_rest_error(err)),
        }
    }
}
