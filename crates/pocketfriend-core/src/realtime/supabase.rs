//! Supabase Realtime over the Phoenix channel protocol.
//!
//! One websocket per subscription: join the channel with a
//! `postgres_changes` config, heartbeat every 25 seconds, forward matching
//! change frames and send `phx_leave` when the guard is dropped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio::time::interval;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use super::{
    realtime_error, subscription_channel, ChangeEvent, ChangeFeed, ChangeFilter, FeedGuard,
    RowChange, Subscription,
};
use crate::auth::AuthSession;
use crate::config::GatewayConfig;
use crate::Result;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(25);
const HEARTBEAT_TOPIC: &str = "phoenix";

type WsWriter = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, WsMessage>;
type WsReader = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

#[derive(Debug, Clone)]
pub struct SupabaseRealtime {
    url: String,
}

impl SupabaseRealtime {
    pub fn new(config: &GatewayConfig) -> Self {
        Self {
            url: config.realtime_url(),
        }
    }
}

#[async_trait]
impl ChangeFeed for SupabaseRealtime {
    async fn subscribe(&self, session: &AuthSession, filter: ChangeFilter) -> Result<Subscription> {
        let (stream, response) = connect_async(self.url.as_str())
            .await
            .map_err(realtime_error)?;
        tracing::debug!("Realtime websocket connected: {}", response.status());

        let (mut write, read) = stream.split();
        let refs = Arc::new(RefCounter::default());
        let topic = channel_topic(&filter);
        let join_ref = refs.next();
        let join = join_frame(&topic, &filter, &session.access_token, &join_ref);
        write
            .send(WsMessage::Text(serde_json::to_string(&join)?))
            .await
            .map_err(realtime_error)?;
        tracing::info!(
            "Subscribed to {} {} changes on {}",
            filter.event,
            filter.table,
            topic
        );

        let writer = Arc::new(Mutex::new(write));
        let (sender, receiver) = subscription_channel();
        let heartbeat = tokio::spawn(heartbeat_loop(Arc::clone(&writer), Arc::clone(&refs)));
        let reader = tokio::spawn(read_loop(read, topic.clone(), sender));

        let guard = FeedGuard::new(move || {
            heartbeat.abort();
            reader.abort();
            // Leaving needs the runtime; a guard dropped after shutdown just closes the socket.
            if let Ok(runtime) = tokio::runtime::Handle::try_current() {
                runtime.spawn(leave(writer, topic, refs.next()));
            }
        });
        Ok(Subscription::new(receiver, guard))
    }
}

#[derive(Default)]
struct RefCounter(AtomicU64);

impl RefCounter {
    fn next(&self) -> String {
        (self.0.fetch_add(1, Ordering::Relaxed) + 1).to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct PhoenixFrame {
    topic: String,
    event: String,
    #[serde(default)]
    payload: Value,
    #[serde(rename = "ref", default)]
    reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    join_ref: Option<String>,
}

impl PhoenixFrame {
    fn new(topic: &str, event: &str, payload: Value, reference: String) -> Self {
        Self {
            topic: topic.to_string(),
            event: event.to_string(),
            payload,
            reference: Some(reference),
            join_ref: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PostgresChange {
    schema: String,
    table: String,
    #[serde(rename = "eventType")]
    event_type: String,
    #[serde(default)]
    new: Value,
    #[serde(default)]
    old: Value,
}

#[derive(Debug, PartialEq)]
enum Inbound {
    Change(RowChange),
    Rejected(String),
    Closed,
    Ignored,
}

fn channel_topic(filter: &ChangeFilter) -> String {
    format!("realtime:{}", filter.table)
}

fn join_frame(
    topic: &str,
    filter: &ChangeFilter,
    access_token: &str,
    join_ref: &str,
) -> PhoenixFrame {
    let mut change = json!({
        "event": filter.event.as_str(),
        "schema": filter.schema,
        "table": filter.table,
    });
    if let Some(row_filter) = &filter.filter {
        change["filter"] = Value::String(row_filter.clone());
    }
    let payload = json!({
        "config": {
            "broadcast": { "self": false },
            "presence": { "key": "" },
            "postgres_changes": [change],
        },
        "access_token": access_token,
    });
    let mut frame = PhoenixFrame::new(topic, "phx_join", payload, join_ref.to_string());
    frame.join_ref = Some(join_ref.to_string());
    frame
}

fn heartbeat_frame(reference: String) -> PhoenixFrame {
    PhoenixFrame::new(HEARTBEAT_TOPIC, "heartbeat", json!({}), reference)
}

fn decode_frame(topic: &str, text: &str) -> Result<Inbound> {
    let frame: PhoenixFrame = serde_json::from_str(text)?;
    if frame.topic != topic {
        return Ok(Inbound::Ignored);
    }

    let status = frame.payload.get("status").and_then(Value::as_str);
    let inbound = match frame.event.as_str() {
        "postgres_changes" => {
            let Some(data) = frame.payload.get("data") else {
                return Ok(Inbound::Ignored);
            };
            let change: PostgresChange = serde_json::from_value(data.clone())?;
            let Some(event) = ChangeEvent::parse(&change.event_type) else {
                return Ok(Inbound::Ignored);
            };
            let old_record = match change.old {
                Value::Object(fields) if !fields.is_empty() => Some(Value::Object(fields)),
                _ => None,
            };
            Inbound::Change(RowChange {
                event,
                schema: change.schema,
                table: change.table,
                record: change.new,
                old_record,
            })
        }
        "phx_reply" | "system" if status == Some("error") => {
            let reason = frame
                .payload
                .get("response")
                .or_else(|| frame.payload.get("message"))
                .map_or_else(|| "channel join rejected".to_string(), Value::to_string);
            Inbound::Rejected(reason)
        }
        "phx_error" | "phx_close" => Inbound::Closed,
        _ => Inbound::Ignored,
    };
    Ok(inbound)
}

async fn heartbeat_loop(writer: Arc<Mutex<WsWriter>>, refs: Arc<RefCounter>) {
    let mut ticker = interval(HEARTBEAT_INTERVAL);
    ticker.tick().await;
    loop {
        ticker.tick().await;
        let Ok(text) = serde_json::to_string(&heartbeat_frame(refs.next())) else {
            break;
        };
        let mut write = writer.lock().await;
        if write.send(WsMessage::Text(text)).await.is_err() {
            tracing::debug!("Realtime heartbeat stopped: socket closed");
            break;
        }
    }
}

async fn read_loop(mut read: WsReader, topic: String, sender: mpsc::Sender<RowChange>) {
    while let Some(message) = read.next().await {
        match message {
            Ok(WsMessage::Text(text)) => match decode_frame(&topic, &text) {
                Ok(Inbound::Change(change)) => {
                    if sender.send(change).await.is_err() {
                        break;
                    }
                }
                Ok(Inbound::Rejected(reason)) => {
                    tracing::error!("Realtime channel {} rejected: {}", topic, reason);
                    break;
                }
                Ok(Inbound::Closed) => {
                    tracing::warn!("Realtime channel {} closed by server", topic);
                    break;
                }
                Ok(Inbound::Ignored) => {}
                Err(error) => tracing::warn!("Skipping malformed realtime frame: {}", error),
            },
            Ok(WsMessage::Close(frame)) => {
                tracing::warn!("Realtime connection closed: {:?}", frame);
                break;
            }
            Ok(_) => {}
            Err(error) => {
                tracing::error!("Realtime websocket error: {}", error);
                break;
            }
        }
    }
}

async fn leave(writer: Arc<Mutex<WsWriter>>, topic: String, reference: String) {
    let frame = PhoenixFrame::new(&topic, "phx_leave", json!({}), reference);
    let mut write = writer.lock().await;
    if let Ok(text) = serde_json::to_string(&frame) {
        if let Err(error) = write.send(WsMessage::Text(text)).await {
            tracing::debug!("Failed to leave realtime channel {}: {}", topic, error);
        }
    }
    let _ = write.close().await;
    tracing::info!("Left realtime channel {}", topic);
}
