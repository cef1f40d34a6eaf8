//! DTOs for decoding gateway JSON responses.

use serde::Deserialize;
use serde_json::Value;

use crate::domain::GatewayInstance;

/// Body of the root health endpoint.
#[derive(Debug, Deserialize)]
pub(super) struct HealthDto {
    pub(super) status: Option<u16>,
}

impl HealthDto {
    pub(super) fn is_healthy(&self) -> bool {
        self.status == Some(200)
    }
}

/// Error body; `message` may be a string or a list of strings.
#[derive(Debug, Default, Deserialize)]
pub(super) struct ErrorBodyDto {
    #[serde(default)]
    pub(super) message: Option<Value>,
    #[serde(default)]
    pub(super) response: Option<ErrorResponseDto>,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct ErrorResponseDto {
    #[serde(default)]
    pub(super) message: Option<Value>,
}

impl ErrorBodyDto {
    pub(super) fn message(&self) -> Option<String> {
        self.message
            .as_ref()
            .or_else(|| self.response.as_ref().and_then(|inner| inner.message.as_ref()))
            .and_then(render_message)
    }
}

fn render_message(value: &Value) -> Option<String> {
    match value {
        Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_owned()),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(render_message).collect();
            (!parts.is_empty()).then(|| parts.join("; "))
        }
        _ => None,
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct InstanceDto {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    connection_status: Option<String>,
    #[serde(default)]
    profile_name: Option<String>,
}

impl InstanceDto {
    pub(super) fn into_domain(self) -> GatewayInstance {
        let instance_id = match self.id {
            Some(Value::String(id)) => id,
            Some(Value::Number(id)) => id.to_string(),
            _ => String::new(),
        };
        GatewayInstance {
            instance_name: self.name.unwrap_or_default(),
            status: self.connection_status.unwrap_or_else(|| "unknown".to_owned()),
            profile_name: self.profile_name.filter(|name| !name.trim().is_empty()),
            instance_id,
        }
    }
}

/// Decode an instance listing. Anything other than a JSON array is treated
/// as an empty listing; malformed entries inside an array are skipped.
pub(super) fn decode_instances(body: &Value) -> Vec<GatewayInstance> {
    let Value::Array(items) = body else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| serde_json::from_value::<InstanceDto>(item.clone()).ok())
        .map(InstanceDto::into_domain)
        .collect()
}
