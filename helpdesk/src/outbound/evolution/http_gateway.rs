//! Reqwest-backed messaging gateway adapter.
//!
//! Every request carries the API key in the `apikey` header. Status codes
//! are mapped here; the domain only sees `MessagingGatewayError` variants.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::debug;

use super::dto::{ErrorBodyDto, HealthDto, decode_instances};
use crate::domain::ports::{MessagingGateway, MessagingGatewayError};
use crate::domain::{GatewayCredentials, GatewayInstance};

const API_KEY_HEADER: &str = "apikey";
const INSTANCES_PATH: &str = "/instance/fetchInstances";

/// Gateway adapter sharing one reqwest client across servers.
pub struct EvolutionHttpGateway {
    client: Client,
}

impl EvolutionHttpGateway {
    /// Build an adapter with an explicit request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    async fn get_json(
        &self,
        credentials: &GatewayCredentials,
        path: &str,
    ) -> Result<Value, MessagingGatewayError> {
        let url = credentials.endpoint(path);
        debug!(%url, "calling messaging gateway");
        let response = self
            .client
            .get(&url)
            .header(API_KEY_HEADER, credentials.api_key())
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        let body = response.bytes().await.map_err(map_transport_error)?;
        if !status.is_success() {
            return Err(map_status_error(status, body.as_ref()));
        }
        serde_json::from_slice(body.as_ref()).map_err(|error| {
            MessagingGatewayError::decode(format!("invalid gateway JSON payload: {error}"))
        })
    }
}

#[async_trait]
impl MessagingGateway for EvolutionHttpGateway {
    async fn probe(&self, credentials: &GatewayCredentials) -> Result<bool, MessagingGatewayError> {
        let body = self.get_json(credentials, "/").await?;
        Ok(parse_health(body))
    }

    async fn list_instances(
        &self,
        credentials: &GatewayCredentials,
    ) -> Result<Vec<GatewayInstance>, MessagingGatewayError> {
        let body = self.get_json(credentials, INSTANCES_PATH).await?;
        Ok(decode_instances(&body))
    }
}

fn parse_health(body: Value) -> bool {
    serde_json::from_value::<HealthDto>(body).is_ok_and(|health| health.is_healthy())
}

fn map_transport_error(error: reqwest::Error) -> MessagingGatewayError {
    MessagingGatewayError::unreachable(error.to_string())
}

fn map_status_error(status: StatusCode, body: &[u8]) -> MessagingGatewayError {
    match status {
        StatusCode::NOT_FOUND => MessagingGatewayError::not_found(),
        StatusCode::UNAUTHORIZED => MessagingGatewayError::unauthorized(),
        _ => {
            let message = serde_json::from_slice::<ErrorBodyDto>(body)
                .ok()
                .and_then(|parsed| parsed.message())
                .unwrap_or_else(|| body_preview(body));
            let message = if message.is_empty() {
                "unknown error".to_owned()
            } else {
                message
            };
            MessagingGatewayError::status(status.as_u16(), message)
        }
    }
}

fn body_preview(body: &[u8]) -> String {
    const PREVIEW_CHAR_LIMIT: usize = 160;

    let compact = String::from_utf8_lossy(body)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let preview = compact.chars().take(PREVIEW_CHAR_LIMIT).collect::<String>();
    if compact.chars().count() > PREVIEW_CHAR_LIMIT {
        format!("{preview}...")
    } else {
        preview
    }
}

#[cfg(test)]
mod tests {
    //! Coverage for the non-network mapping helpers.

    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case(json!({"status": 200, "message": "Welcome"}), true)]
    #[case(json!({"status": 503}), false)]
    #[case(json!({"message": "no status"}), false)]
    #[case(json!("plain text"), false)]
    fn health_requires_status_200(#[case] body: Value, #[case] expected: bool) {
        assert_eq!(parse_health(body), expected);
    }

    #[test]
    fn not_found_and_unauthorized_have_dedicated_variants() {
        assert!(matches!(
            map_status_error(StatusCode::NOT_FOUND, b""),
            MessagingGatewayError::NotFound
        ));
        assert!(matches!(
            map_status_error(StatusCode::UNAUTHORIZED, b"{}"),
            MessagingGatewayError::Unauthorized
        ));
    }

    #[rstest]
    #[case(br#"{"message": "instance busy"}"#.as_slice(), "instance busy")]
    #[case(br#"{"response": {"message": ["a", "b"]}}"#.as_slice(), "a; b")]
    #[case(b"".as_slice(), "unknown error")]
    #[case(b"<html> down </html>".as_slice(), "<html> down </html>")]
    fn other_statuses_carry_the_server_message(#[case] body: &[u8], #[case] expected: &str) {
        let error = map_status_error(StatusCode::INTERNAL_SERVER_ERROR, body);
        match error {
            MessagingGatewayError::Status { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, expected);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn instances_map_gateway_field_names() {
        let body = json!([
            {
                "id": "abc-1",
                "name": "support",
                "connectionStatus": "open",
                "ownerJid": "5511999999999@s.whatsapp.net",
                "profileName": "Support Desk"
            },
            { "id": 7, "name": "sales" }
        ]);
        let instances = decode_instances(&body);
        assert_eq!(instances.len(), 2);
        assert_eq!(instances[0].instance_name, "support");
        assert_eq!(instances[0].status, "open");
        assert_eq!(instances[0].profile_name.as_deref(), Some("Support Desk"));
        assert_eq!(instances[0].instance_id, "abc-1");
        assert_eq!(instances[1].instance_id, "7");
        assert_eq!(instances[1].status, "unknown");
        assert_eq!(instances[1].profile_name, None);
    }

    #[test]
    fn non_array_listing_is_empty() {
        assert!(decode_instances(&json!({"error": "nope"})).is_empty());
    }
}
