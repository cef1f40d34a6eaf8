//! Messaging gateway connection settings and instance listings.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;
use zeroize::Zeroizing;

/// Validation errors for gateway credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayValidationError {
    EmptyServerUrl,
    InvalidServerUrl { message: String },
    UnsupportedScheme { scheme: String },
    EmptyApiKey,
}

impl fmt::Display for GatewayValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyServerUrl => write!(f, "server URL must not be empty"),
            Self::InvalidServerUrl { message } => write!(f, "invalid server URL: {message}"),
            Self::UnsupportedScheme { scheme } => {
                write!(f, "server URL must use http or https, got '{scheme}'")
            }
            Self::EmptyApiKey => write!(f, "API key must not be empty"),
        }
    }
}

impl std::error::Error for GatewayValidationError {}

/// Base URL and API key for the messaging gateway.
///
/// The URL is stored without a trailing `/` so joined paths never double
/// the separator.
#[derive(Clone, PartialEq, Eq)]
pub struct GatewayCredentials {
    server_url: String,
    api_key: Zeroizing<String>,
}

impl GatewayCredentials {
    /// Validate and normalise gateway credentials.
    pub fn new(server_url: &str, api_key: &str) -> Result<Self, GatewayValidationError> {
        let trimmed = server_url.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            return Err(GatewayValidationError::EmptyServerUrl);
        }
        let parsed = Url::parse(trimmed).map_err(|err| GatewayValidationError::InvalidServerUrl {
            message: err.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(GatewayValidationError::UnsupportedScheme {
                scheme: parsed.scheme().to_owned(),
            });
        }
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(GatewayValidationError::EmptyApiKey);
        }
        Ok(Self {
            server_url: trimmed.to_owned(),
            api_key: Zeroizing::new(api_key.to_owned()),
        })
    }

    /// Normalised base URL.
    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    /// Key sent to the gateway.
    pub fn api_key(&self) -> &str {
        self.api_key.as_str()
    }

    /// `server_url` joined with an absolute `path`.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.server_url, path.trim_start_matches('/'))
    }
}

impl fmt::Debug for GatewayCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayCredentials")
            .field("server_url", &self.server_url)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// Stored singleton configuration row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    pub id: Uuid,
    pub credentials: GatewayCredentials,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One messaging instance reported by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayInstance {
    pub instance_name: String,
    pub status: String,
    pub profile_name: Option<String>,
    pub instance_id: String,
}
