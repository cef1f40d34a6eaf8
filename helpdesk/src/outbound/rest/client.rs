//! Shared HTTP client for the backend's REST and auth endpoints.
//!
//! Every request carries the project `apikey` header. The `Authorization`
//! bearer is the signed-in session's token when one is held, the anon key
//! otherwise, so row-level policies see the right identity.

use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, Method, RequestBuilder, StatusCode, Url};
use serde::Deserialize;
use tracing::debug;
use zeroize::Zeroizing;

use crate::domain::AuthSession;

const API_KEY_HEADER: &str = "apikey";
const REST_PREFIX: &str = "rest/v1/";
const AUTH_PREFIX: &str = "auth/v1/";

/// Failures raised while talking to the backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RestError {
    /// The request never produced a response.
    #[error("backend unreachable: {message}")]
    Transport { message: String },
    /// The backend answered with a non-success status.
    #[error("backend returned {status}: {message}")]
    Status { status: u16, message: String },
    /// The response body did not match the expected shape.
    #[error("unexpected backend payload: {message}")]
    Decode { message: String },
    /// The endpoint URL could not be built.
    #[error("invalid backend endpoint: {message}")]
    Endpoint { message: String },
}

impl RestError {
    /// True for 401 and 403 answers.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Self::Status { status, .. } if *status == 401 || *status == 403)
    }

    pub(crate) fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }
}

/// Raw response: status, `Content-Range` and body.
#[derive(Debug)]
pub(crate) struct RestResponse {
    pub(crate) status: StatusCode,
    pub(crate) content_range: Option<String>,
    pub(crate) body: Vec<u8>,
}

impl RestResponse {
    /// Turn non-2xx answers into [`RestError::Status`].
    pub(crate) fn success(self) -> Result<Self, RestError> {
        if self.status.is_success() {
            Ok(self)
        } else {
            Err(status_error(self.status, &self.body))
        }
    }

    pub(crate) fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, RestError> {
        serde_json::from_slice(&self.body)
            .map_err(|err| RestError::decode(format!("invalid JSON payload: {err}")))
    }
}

/// Error bodies from either PostgREST or the auth service.
#[derive(Debug, Default, Deserialize)]
struct ErrorBodyDto {
    message: Option<String>,
    msg: Option<String>,
    error_description: Option<String>,
    error: Option<String>,
}

impl ErrorBodyDto {
    fn into_message(self) -> Option<String> {
        self.message
            .or(self.msg)
            .or(self.error_description)
            .or(self.error)
            .filter(|message| !message.trim().is_empty())
    }
}

pub(crate) fn status_error(status: StatusCode, body: &[u8]) -> RestError {
    let message = serde_json::from_slice::<ErrorBodyDto>(body)
        .ok()
        .and_then(ErrorBodyDto::into_message)
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("unknown error")
                .to_owned()
        });
    RestError::Status {
        status: status.as_u16(),
        message,
    }
}

fn transport_error(error: &reqwest::Error) -> RestError {
    RestError::Transport {
        message: error.to_string(),
    }
}

/// Connection to one backend project.
pub struct RestClient {
    http: Client,
    base: Url,
    anon_key: Zeroizing<String>,
    session: RwLock<Option<AuthSession>>,
}

impl RestClient {
    /// Build a client for `base` (the project URL) with a request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn new(base: Url, anon_key: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base: with_trailing_slash(base),
            anon_key: Zeroizing::new(anon_key.to_owned()),
            session: RwLock::new(None),
        })
    }

    /// Project URL every endpoint is joined onto.
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Public API key.
    pub fn anon_key(&self) -> &str {
        self.anon_key.as_str()
    }

    /// Session held since the last sign-in, if any.
    pub fn session(&self) -> Option<AuthSession> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn store_session(&self, session: Option<AuthSession>) {
        *self
            .session
            .write()
            .unwrap_or_else(PoisonError::into_inner) = session;
    }

    /// Token sent as bearer: the session's, or the anon key.
    pub fn bearer_token(&self) -> Zeroizing<String> {
        self.session().map_or_else(
            || self.anon_key.clone(),
            |session| Zeroizing::new(session.access_token().expose().to_owned()),
        )
    }

    pub(crate) fn table_url(&self, table: &str) -> Result<Url, RestError> {
        self.join(&format!("{REST_PREFIX}{table}"))
    }

    pub(crate) fn auth_url(&self, path: &str) -> Result<Url, RestError> {
        self.join(&format!("{AUTH_PREFIX}{path}"))
    }

    fn join(&self, path: &str) -> Result<Url, RestError> {
        self.base.join(path).map_err(|err| RestError::Endpoint {
            message: format!("{path}: {err}"),
        })
    }

    /// Request with the project key and the current bearer attached.
    pub(crate) fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.http
            .request(method, url)
            .headers(self.auth_headers(self.bearer_token().as_str()))
    }

    /// Request authorised with the anon key only.
    pub(crate) fn anonymous(&self, method: Method, url: Url) -> RequestBuilder {
        self.http
            .request(method, url)
            .headers(self.auth_headers(self.anon_key.as_str()))
    }

    fn auth_headers(&self, bearer: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Ok(value) = HeaderValue::from_str(self.anon_key.as_str()) {
            headers.insert(API_KEY_HEADER, value);
        }
        if let Ok(mut value) = HeaderValue::from_str(&format!("Bearer {bearer}")) {
            value.set_sensitive(true);
            headers.insert(reqwest::header::AUTHORIZATION, value);
        }
        headers
    }

    /// Send and collect the response, whatever its status.
    pub(crate) async fn execute(&self, request: RequestBuilder) -> Result<RestResponse, RestError> {
        let response = request.send().await.map_err(|err| transport_error(&err))?;
        let status = response.status();
        let content_range = response
            .headers()
            .get(reqwest::header::CONTENT_RANGE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        let body = response
            .bytes()
            .await
            .map_err(|err| transport_error(&err))?
            .to_vec();
        debug!(status = status.as_u16(), bytes = body.len(), "backend response");
        Ok(RestResponse {
            status,
            content_range,
            body,
        })
    }

    /// Send and require a 2xx answer.
    pub(crate) async fn send(&self, request: RequestBuilder) -> Result<RestResponse, RestError> {
        self.execute(request).await?.success()
    }
}

/// First row of a `return=representation` answer.
pub(crate) fn first_row<T>(rows: Vec<T>, what: &str) -> Result<T, RestError> {
    rows.into_iter()
        .next()
        .ok_or_else(|| RestError::decode(format!("backend returned no {what} row")))
}

fn with_trailing_slash(mut base: Url) -> Url {
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base
}
