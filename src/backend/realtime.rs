// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Realtime row-change feed over the backend's Phoenix-channel websocket.
//!
//! One socket per feed: join a channel scoped to a single profile row,
//! keep it alive with heartbeats, and forward each update record as a
//! `ProfilePatch`. Dropping the feed closes the socket.

use crate::error::AppError;
use crate::models::ProfilePatch;
use crate::task::TaskGuard;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(25);
const FEED_BUFFER: usize = 16;

/// Stream of partial profile updates for one user.
pub struct ProfileFeed {
    rx: mpsc::Receiver<ProfilePatch>,
    _pump: Option<TaskGuard>,
}

impl ProfileFeed {
    /// Wrap an existing channel (used by non-websocket sources).
    pub fn from_receiver(rx: mpsc::Receiver<ProfilePatch>) -> Self {
        Self { rx, _pump: None }
    }

    /// Next update; `None` once the channel is gone.
    pub async fn next(&mut self) -> Option<ProfilePatch> {
        self.rx.recv().await
    }
}

/// Channel topic for a user's profile row.
pub fn profile_topic(user_id: &str) -> String {
    format!("realtime:profile-{}", user_id)
}

/// Join message subscribing to UPDATE events on `profiles` where `id = user_id`.
pub fn join_message(topic: &str, access_token: &str, user_id: &str) -> Value {
    json!({
        "topic": topic,
        "event": "phx_join",
        "payload": {
            "config": {
                "postgres_changes": [{
                    "event": "UPDATE",
                    "schema": "public",
                    "table": super::tables::PROFILES,
                    "filter": format!("id=eq.{}", user_id),
                }]
            },
            "access_token": access_token,
        },
        "ref": "1",
    })
}

fn heartbeat_message(seq: u64) -> Value {
    json!({
        "topic": "phoenix",
        "event": "heartbeat",
        "payload": {},
        "ref": seq.to_string(),
    })
}

/// Extract the updated record from a channel message, if it is one.
pub fn parse_update(text: &str, topic: &str) -> Option<ProfilePatch> {
    let message: Value = serde_json::from_str(text).ok()?;
    if message.get("topic").and_then(Value::as_str) != Some(topic) {
        return None;
    }
    if message.get("event").and_then(Value::as_str) != Some("postgres_changes") {
        return None;
    }

    let data = message.get("payload")?.get("data")?;
    if data.get("type").and_then(Value::as_str) != Some("UPDATE") {
        return None;
    }
    ProfilePatch::from_value(data.get("record")?.clone())
}

/// Connect, join the profile channel, and start pumping updates.
pub async fn subscribe_profile_updates(
    url: &str,
    access_token: &str,
    user_id: &str,
) -> Result<ProfileFeed, AppError> {
    let (mut socket, _) = connect_async(url)
        .await
        .map_err(|e| AppError::Backend(format!("Realtime connect failed: {}", e)))?;

    let topic = profile_topic(user_id);
    let join = join_message(&topic, access_token, user_id);
    socket
        .send(Message::Text(join.to_string().into()))
        .await
        .map_err(|e| AppError::Backend(format!("Realtime join failed: {}", e)))?;

    tracing::debug!(user_id, topic = %topic, "Realtime channel joined");

    let (tx, rx) = mpsc::channel(FEED_BUFFER);
    let pump = TaskGuard::spawn(pump(socket, topic, tx));

    Ok(ProfileFeed {
        rx,
        _pump: Some(pump),
    })
}

type Socket = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

async fn pump(socket: Socket, topic: String, tx: mpsc::Sender<ProfilePatch>) {
    let (mut sink, mut stream) = socket.split();
    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    heartbeat.tick().await;
    let mut seq: u64 = 1;

    loop {
        tokio::select! {
            _ = heartbeat.tick() => {
                seq += 1;
                let beat = heartbeat_message(seq).to_string();
                if let Err(e) = sink.send(Message::Text(beat.into())).await {
                    tracing::warn!(topic = %topic, error = %e, "Realtime heartbeat failed");
                    break;
                }
            }
            message = stream.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    if let Some(patch) = parse_update(text.as_str(), &topic) {
                        if tx.send(patch).await.is_err() {
                            break;
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | None => {
                    tracing::info!(topic = %topic, "Realtime channel closed by server");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::warn!(topic = %topic, error = %e, "Realtime channel error");
                    break;
                }
            },
            _ = tx.closed() => break,
        }
    }

    let _ = sink.close().await;
}
