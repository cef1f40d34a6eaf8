//! Websocket-backed [`ChangeFeed`].
//!
//! Each `watch` opens its own socket and joins one channel. A background
//! task keeps the socket alive with heartbeats and forwards matching row
//! changes; releasing the [`ChangeSubscription`] makes the task leave the
//! channel and close the socket.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, warn};
use url::Url;

use super::protocol::{self, Inbound, PhoenixMessage};
use crate::domain::ports::{ChangeFeed, ChangeFeedError};
use crate::domain::{ChangeEvent, ChangeFilter, ChangeSubscription};
use crate::outbound::rest::RestClient;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;
type Writer = SplitSink<Socket, Message>;
type Reader = SplitStream<Socket>;

const JOIN_REF: u64 = 1;

/// Realtime change feed for one backend project.
pub struct RealtimeFeed {
    endpoint: Url,
    client: Arc<RestClient>,
    heartbeat: Duration,
    join_timeout: Duration,
    sequence: AtomicU64,
}

impl RealtimeFeed {
    /// Feed on an explicit websocket `endpoint`. The bearer sent on join is
    /// read from `client` at subscribe time.
    pub fn new(
        endpoint: Url,
        client: Arc<RestClient>,
        heartbeat: Duration,
        join_timeout: Duration,
    ) -> Self {
        Self {
            endpoint,
            client,
            heartbeat,
            join_timeout,
            sequence: AtomicU64::new(0),
        }
    }

    /// Feed on the project's default realtime endpoint, or on `override_url`.
    ///
    /// # Errors
    ///
    /// Returns [`ChangeFeedError::Connection`] when no websocket URL can be
    /// derived.
    pub fn for_project(
        client: Arc<RestClient>,
        override_url: Option<&Url>,
        heartbeat: Duration,
        join_timeout: Duration,
    ) -> Result<Self, ChangeFeedError> {
        let base = override_url.unwrap_or_else(|| client.base_url());
        let endpoint =
            protocol::websocket_url(base, client.anon_key()).map_err(ChangeFeedError::connection)?;
        Ok(Self::new(endpoint, client, heartbeat, join_timeout))
    }
}

#[async_trait]
impl ChangeFeed for RealtimeFeed {
    async fn watch(&self, filter: ChangeFilter) -> Result<ChangeSubscription, ChangeFeedError> {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let topic = protocol::topic_for(&filter, sequence);
        let (socket, _) = connect_async(self.endpoint.as_str())
            .await
            .map_err(|err| ChangeFeedError::connection(err.to_string()))?;
        let (mut writer, mut reader) = socket.split();

        let token = self.client.bearer_token();
        send(
            &mut writer,
            &protocol::join(&topic, &filter, token.as_str(), JOIN_REF),
        )
        .await?;
        tokio::time::timeout(self.join_timeout, await_join(&mut reader, &topic))
            .await
            .map_err(|_| ChangeFeedError::connection(format!("join on {topic} timed out")))??;
        debug!(%topic, table = %filter.watched_table(), "realtime channel joined");

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let (events, subscription) = ChangeSubscription::channel(move || drop(shutdown_tx));
        let channel = Channel {
            topic,
            filter,
            events,
            heartbeat: self.heartbeat,
        };
        tokio::spawn(channel.run(writer, reader, shutdown_rx));
        Ok(subscription)
    }
}

async fn send(writer: &mut Writer, message: &PhoenixMessage) -> Result<(), ChangeFeedError> {
    let text = serde_json::to_string(message)
        .map_err(|err| ChangeFeedError::rejected(format!("unencodable frame: {err}")))?;
    writer
        .send(Message::text(text))
        .await
        .map_err(|err| ChangeFeedError::connection(err.to_string()))
}

fn decode(text: &str) -> Option<PhoenixMessage> {
    match serde_json::from_str(text) {
        Ok(message) => Some(message),
        Err(err) => {
            warn!(error = %err, "dropping undecodable realtime frame");
            None
        }
    }
}

async fn await_join(reader: &mut Reader, topic: &str) -> Result<(), ChangeFeedError> {
    let expected = JOIN_REF.to_string();
    while let Some(frame) = reader.next().await {
        let frame = frame.map_err(|err| ChangeFeedError::connection(err.to_string()))?;
        let Message::Text(text) = frame else {
            continue;
        };
        let Some(message) = decode(text.as_str()) else {
            continue;
        };
        match protocol::classify(&message, topic) {
            Inbound::JoinReply {
                reference,
                accepted,
                reason,
            } if reference == expected => {
                return if accepted {
                    Ok(())
                } else {
                    Err(ChangeFeedError::rejected(reason))
                };
            }
            Inbound::Closed { reason } => return Err(ChangeFeedError::rejected(reason)),
            _ => {}
        }
    }
    Err(ChangeFeedError::connection("socket closed before join reply"))
}

/// State owned by the background task of one joined channel.
struct Channel {
    topic: String,
    filter: ChangeFilter,
    events: mpsc::UnboundedSender<ChangeEvent>,
    heartbeat: Duration,
}

impl Channel {
    async fn run(self, mut writer: Writer, mut reader: Reader, mut shutdown: oneshot::Receiver<()>) {
        let mut reference = JOIN_REF;
        let mut ticker = tokio::time::interval(self.heartbeat);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    reference += 1;
                    if let Err(err) = send(&mut writer, &protocol::leave(&self.topic, reference)).await {
                        debug!(topic = %self.topic, error = %err, "leave not delivered");
                    }
                    if let Err(err) = writer.close().await {
                        debug!(topic = %self.topic, error = %err, "socket close failed");
                    }
                    debug!(topic = %self.topic, "realtime channel left");
                    break;
                }
                _ = ticker.tick() => {
                    reference += 1;
                    if let Err(err) = send(&mut writer, &protocol::heartbeat(reference)).await {
                        warn!(topic = %self.topic, error = %err, "realtime heartbeat failed");
                        break;
                    }
                }
                frame = reader.next() => {
                    if !self.handle(frame) {
                        break;
                    }
                }
            }
        }
    }

    /// Process one inbound frame; `false` ends the channel.
    fn handle(
        &self,
        frame: Option<Result<Message, tokio_tungstenite::tungstenite::Error>>,
    ) -> bool {
        match frame {
            Some(Ok(Message::Text(text))) => {
                let Some(message) = decode(text.as_str()) else {
                    return true;
                };
                match protocol::classify(&message, &self.topic) {
                    Inbound::Change(event) if self.filter.matches(&event) => {
                        self.events.send(event).is_ok()
                    }
                    Inbound::Closed { reason } => {
                        warn!(topic = %self.topic, %reason, "realtime channel closed");
                        false
                    }
                    _ => true,
                }
            }
            Some(Ok(Message::Close(_))) | None => {
                warn!(topic = %self.topic, "realtime socket closed");
                false
            }
            Some(Ok(_)) => true,
            Some(Err(err)) => {
                warn!(topic = %self.topic, error = %err, "realtime socket failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ChangeKind, Table};
    use serde_json::{Value, json};
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;

    async fn next_frame(
        socket: &mut WebSocketStream<TcpStream>,
        event: &str,
    ) -> PhoenixMessage {
        loop {
            let frame = socket
                .next()
                .await
                .expect("frame")
                .expect("valid frame");
            if let Message::Text(text) = frame {
                let message: PhoenixMessage =
                    serde_json::from_str(text.as_str()).expect("phoenix frame");
                if message.event == event {
                    return message;
                }
            }
        }
    }

    fn frame(topic: &str, event: &str, payload: Value, reference: &str) -> Message {
        Message::text(
            json!({"topic": topic, "event": event, "payload": payload, "ref": reference})
                .to_string(),
        )
    }

    fn feed(port: u16) -> RealtimeFeed {
        let client = RestClient::new(
            Url::parse(&format!("http://127.0.0.1:{port}")).expect("valid url"),
            "anon",
            Duration::from_secs(5),
        )
        .expect("client");
        RealtimeFeed::for_project(
            Arc::new(client),
            None,
            Duration::from_secs(30),
            Duration::from_secs(5),
        )
        .expect("feed")
    }

    #[tokio::test]
    async fn joined_channel_forwards_changes_and_leaves_on_release() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.expect("accept");
            let mut socket = accept_async(stream).await.expect("handshake");
            let join = next_frame(&mut socket, "phx_join").await;
            assert_eq!(join.payload["access_token"], "anon");
            let topic = join.topic.clone();
            socket
                .send(frame(&topic, "phx_reply", json!({"status": "ok", "response": {}}), "1"))
                .await
                .expect("reply");
            socket
                .send(frame(
                    &topic,
                    "postgres_changes",
                    json!({"data": {
                        "type": "INSERT",
                        "table": "tickets",
                        "record": {"id": "t1", "title": "VPN down"}
                    }}),
                    "2",
                ))
                .await
                .expect("change");
            next_frame(&mut socket, "phx_leave").await
        });

        let mut subscription = feed(port)
            .watch(ChangeFilter::table(Table::Tickets))
            .await
            .expect("subscribed");
        let event = subscription.next().await.expect("event");
        assert_eq!(event.kind, ChangeKind::Insert);
        assert_eq!(event.text("title"), Some("VPN down"));

        subscription.unsubscribe();
        let leave = server.await.expect("server task");
        assert_eq!(leave.event, "phx_leave");
    }

    #[tokio::test]
    async fn refused_join_is_rejected() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.expect("accept");
            let mut socket = accept_async(stream).await.expect("handshake");
            let join = next_frame(&mut socket, "phx_join").await;
            socket
                .send(frame(
                    &join.topic,
                    "phx_reply",
                    json!({"status": "error", "response": {"reason": "unauthorized"}}),
                    "1",
                ))
                .await
                .expect("reply");
        });

        let err = feed(port)
            .watch(ChangeFilter::table(Table::Tickets))
            .await
            .expect_err("refused");
        assert_eq!(err, ChangeFeedError::rejected("unauthorized"));
    }
}
