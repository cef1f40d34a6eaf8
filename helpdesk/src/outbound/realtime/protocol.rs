//! Phoenix channel frames used by the realtime service.
//!
//! A subscription is one channel joined with a `postgres_changes` config.
//! Row changes arrive as `postgres_changes` events; the socket must send a
//! `heartbeat` on the `phoenix` topic at a fixed interval or the server
//! drops it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use url::Url;

use crate::domain::{ChangeEvent, ChangeFilter, ChangeKind, Table};

pub(crate) const PHOENIX_TOPIC: &str = "phoenix";
const SCHEMA: &str = "public";

/// One frame on the socket, in either direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct PhoenixMessage {
    pub(crate) topic: String,
    pub(crate) event: String,
    #[serde(default)]
    pub(crate) payload: Value,
    #[serde(rename = "ref", default)]
    pub(crate) reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) join_ref: Option<String>,
}

impl PhoenixMessage {
    fn new(topic: impl Into<String>, event: &str, payload: Value, reference: u64) -> Self {
        Self {
            topic: topic.into(),
            event: event.to_owned(),
            payload,
            reference: Some(reference.to_string()),
            join_ref: None,
        }
    }
}

/// Websocket endpoint for a project: `ws(s)://host/realtime/v1/websocket`.
pub(crate) fn websocket_url(base: &Url, api_key: &str) -> Result<Url, String> {
    let mut url = base.clone();
    let scheme = match base.scheme() {
        "https" | "wss" => "wss",
        "http" | "ws" => "ws",
        other => return Err(format!("unsupported realtime scheme '{other}'")),
    };
    url.set_scheme(scheme)
        .map_err(|()| format!("cannot switch {base} to {scheme}"))?;
    if !url.path().ends_with("/websocket") {
        let path = format!("{}/realtime/v1/websocket", url.path().trim_end_matches('/'));
        url.set_path(&path);
    }
    url.query_pairs_mut()
        .clear()
        .append_pair("apikey", api_key)
        .append_pair("vsn", "1.0.0");
    Ok(url)
}

/// Channel topic for the `sequence`-th subscription on a table.
pub(crate) fn topic_for(filter: &ChangeFilter, sequence: u64) -> String {
    format!("realtime:helpdesk-{}-{sequence}", filter.watched_table())
}

fn change_bindings(filter: &ChangeFilter) -> Vec<Value> {
    let events: Vec<&str> = if filter.kinds().len() == ChangeKind::ALL.len() {
        vec!["*"]
    } else {
        filter.kinds().iter().map(|kind| kind.as_str()).collect()
    };
    events
        .into_iter()
        .map(|event| {
            let mut binding = json!({
                "event": event,
                "schema": SCHEMA,
                "table": filter.watched_table().as_str(),
            });
            if let (Some(column), Some(map)) = (filter.column(), binding.as_object_mut()) {
                map.insert("filter".to_owned(), Value::String(column.to_expression()));
            }
            binding
        })
        .collect()
}

pub(crate) fn join(
    topic: &str,
    filter: &ChangeFilter,
    access_token: &str,
    reference: u64,
) -> PhoenixMessage {
    let payload = json!({
        "config": {
            "broadcast": { "ack": false, "self": false },
            "presence": { "key": "" },
            "postgres_changes": change_bindings(filter),
        },
        "access_token": access_token,
    });
    let mut message = PhoenixMessage::new(topic, "phx_join", payload, reference);
    message.join_ref = message.reference.clone();
    message
}

pub(crate) fn heartbeat(reference: u64) -> PhoenixMessage {
    PhoenixMessage::new(PHOENIX_TOPIC, "heartbeat", json!({}), reference)
}

pub(crate) fn leave(topic: &str, reference: u64) -> PhoenixMessage {
    PhoenixMessage::new(topic, "phx_leave", json!({}), reference)
}

/// What an inbound frame means for one subscription.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Inbound {
    /// Answer to the join sent with `reference`.
    JoinReply {
        reference: String,
        accepted: bool,
        reason: String,
    },
    Change(ChangeEvent),
    /// The server closed or errored the channel.
    Closed { reason: String },
    /// Heartbeat replies, presence and anything unrelated.
    Ignored,
}

/// Interpret `message` for the channel `topic`.
pub(crate) fn classify(message: &PhoenixMessage, topic: &str) -> Inbound {
    if message.topic != topic {
        return Inbound::Ignored;
    }
    match message.event.as_str() {
        "phx_reply" => {
            let Some(reference) = message.reference.clone() else {
                return Inbound::Ignored;
            };
            let accepted = message.payload.get("status").and_then(Value::as_str) == Some("ok");
            Inbound::JoinReply {
                reference,
                accepted,
                reason: reply_reason(&message.payload),
            }
        }
        "postgres_changes" => {
            decode_change(&message.payload).map_or(Inbound::Ignored, Inbound::Change)
        }
        "phx_close" => Inbound::Closed {
            reason: "channel closed by server".to_owned(),
        },
        "phx_error" => Inbound::Closed {
            reason: "channel crashed on server".to_owned(),
        },
        "system" if message.payload.get("status").and_then(Value::as_str) == Some("error") => {
            Inbound::Closed {
                reason: reply_reason(&message.payload),
            }
        }
        _ => Inbound::Ignored,
    }
}

fn reply_reason(payload: &Value) -> String {
    payload
        .pointer("/response/reason")
        .or_else(|| payload.get("message"))
        .and_then(Value::as_str)
        .unwrap_or("no reason given")
        .to_owned()
}

#[derive(Debug, Deserialize)]
struct ChangeDataDto {
    #[serde(rename = "type")]
    kind: ChangeKind,
    table: String,
    #[serde(default)]
    record: Option<Value>,
    #[serde(default)]
    old_record: Option<Value>,
    #[serde(default)]
    commit_timestamp: Option<DateTime<Utc>>,
}

fn non_empty(value: Option<Value>) -> Option<Value> {
    value.filter(|row| !row.is_null() && row.as_object().is_none_or(|map| !map.is_empty()))
}

fn decode_change(payload: &Value) -> Option<ChangeEvent> {
    let data: ChangeDataDto = serde_json::from_value(payload.get("data")?.clone()).ok()?;
    let table = Table::from_name(&data.table)?;
    Some(ChangeEvent {
        table,
        kind: data.kind,
        new: non_empty(data.record),
        old: non_empty(data.old_record),
        commit_timestamp: data.commit_timestamp,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ColumnFilter;
    use rstest::rstest;

    const TOPIC: &str = "realtime:helpdesk-tickets-1";

    fn inbound(event: &str, payload: Value) -> PhoenixMessage {
        PhoenixMessage {
            topic: TOPIC.to_owned(),
            event: event.to_owned(),
            payload,
            reference: Some("1".to_owned()),
            join_ref: None,
        }
    }

    #[rstest]
    #[case("https://p.example.co", "wss://p.example.co/realtime/v1/websocket?apikey=k&vsn=1.0.0")]
    #[case("http://localhost:54321/", "ws://localhost:54321/realtime/v1/websocket?apikey=k&vsn=1.0.0")]
    fn websocket_url_derives_from_project_url(#[case] base: &str, #[case] expected: &str) {
        let base = Url::parse(base).expect("valid url");
        assert_eq!(websocket_url(&base, "k").expect("url").as_str(), expected);
    }

    #[rstest]
    fn unfiltered_join_binds_every_event() {
        let message = join(TOPIC, &ChangeFilter::table(Table::Tickets), "token", 1);
        assert_eq!(message.event, "phx_join");
        assert_eq!(message.join_ref.as_deref(), Some("1"));
        let bindings = &message.payload["config"]["postgres_changes"];
        assert_eq!(bindings[0]["event"], "*");
        assert_eq!(bindings[0]["table"], "tickets");
        assert!(bindings[0].get("filter").is_none());
        assert_eq!(message.payload["access_token"], "token");
    }

    #[rstest]
    fn column_filter_is_sent_as_expression() {
        let filter = ChangeFilter::kind(Table::Tickets, ChangeKind::Insert)
            .with_column(ColumnFilter::eq("ti_id", "abc"));
        let message = join(TOPIC, &filter, "token", 2);
        let binding = &message.payload["config"]["postgres_changes"][0];
        assert_eq!(binding["event"], "INSERT");
        assert_eq!(binding["filter"], "ti_id=eq.abc");
    }

    #[rstest]
    fn join_replies_report_acceptance() {
        let ok = inbound("phx_reply", json!({"status": "ok", "response": {}}));
        assert!(matches!(
            classify(&ok, TOPIC),
            Inbound::JoinReply { accepted: true, .. }
        ));
        let refused = inbound(
            "phx_reply",
            json!({"status": "error", "response": {"reason": "unauthorized"}}),
        );
        assert_eq!(
            classify(&refused, TOPIC),
            Inbound::JoinReply {
                reference: "1".to_owned(),
                accepted: false,
                reason: "unauthorized".to_owned()
            }
        );
    }

    #[rstest]
    fn postgres_changes_decode_into_events() {
        let message = inbound(
            "postgres_changes",
            json!({
                "ids": [1],
                "data": {
                    "type": "UPDATE",
                    "schema": "public",
                    "table": "tickets",
                    "record": {"id": "t1", "status": "fechado", "user_id": "u1"},
                    "old_record": {"id": "t1"},
                    "commit_timestamp": "2024-03-01T10:00:00Z"
                }
            }),
        );
        let Inbound::Change(event) = classify(&message, TOPIC) else {
            panic!("expected a change event");
        };
        assert_eq!(event.kind, ChangeKind::Update);
        assert_eq!(event.table, Table::Tickets);
        assert_eq!(event.text("status"), Some("fechado"));
    }

    #[rstest]
    fn deletes_keep_only_the_old_row() {
        let message = inbound(
            "postgres_changes",
            json!({"data": {
                "type": "DELETE",
                "table": "tickets",
                "record": {},
                "old_record": {"id": "t1"}
            }}),
        );
        let Inbound::Change(event) = classify(&message, TOPIC) else {
            panic!("expected a change event");
        };
        assert!(event.new.is_none());
        assert_eq!(event.text("id"), Some("t1"));
    }

    #[rstest]
    fn other_topics_are_ignored() {
        let mut message = inbound("phx_close", json!({}));
        message.topic = "realtime:other".to_owned();
        assert_eq!(classify(&message, TOPIC), Inbound::Ignored);
    }

    #[rstest]
    fn system_errors_close_the_channel() {
        let message = inbound(
            "system",
            json!({"status": "error", "message": "invalid filter"}),
        );
        assert_eq!(
            classify(&message, TOPIC),
            Inbound::Closed {
                reason: "invalid filter".to_owned()
            }
        );
    }
}
