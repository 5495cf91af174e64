//! One observer connection.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};

use crate::control::hub::{BroadcastHub, SessionId, UpdateReceiver};
use crate::control::protocol::Command;
use crate::debugger::CommandSender;

const PING_INTERVAL: Duration = Duration::from_secs(30);

/// Run an observer session until either direction fails, then unregister it.
pub async fn run_session(socket: WebSocket, hub: Arc<BroadcastHub>, commands: CommandSender) {
    let (id, updates) = hub.register();
    let (sink, stream) = socket.split();

    tokio::select! {
        _ = write_updates(id, sink, updates) => {}
        _ = read_commands(id, stream, &commands) => {}
    }

    hub.unregister(id);
}

async fn write_updates(id: SessionId, mut sink: SplitSink<WebSocket, Message>, mut updates: UpdateReceiver) {
    let mut ping = tokio::time::interval(PING_INTERVAL);
    ping.tick().await;

    loop {
        tokio::select! {
            update = updates.recv() => {
                // The hub dropped us.
                let Some(update) = update else { break };
                let text = match serde_json::to_string(&*update) {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::error!(session_id = %id, error = %e, "Failed to encode update");
                        continue;
                    }
                };
                if let Err(e) = sink.send(Message::Text(text.into())).await {
                    tracing::warn!(session_id = %id, error = %e, "Failed to send update");
                    break;
                }
            }
            _ = ping.tick() => {
                if let Err(e) = sink.send(Message::Ping(Vec::new().into())).await {
                    tracing::debug!(session_id = %id, error = %e, "Ping failed");
                    break;
                }
            }
        }
    }
}

async fn read_commands(id: SessionId, mut stream: SplitStream<WebSocket>, commands: &CommandSender) {
    while let Some(frame) = stream.next().await {
        let decoded = match frame {
            Ok(Message::Text(text)) => Command::decode(text.as_str()),
            Ok(Message::Binary(bytes)) => Command::decode_slice(&bytes),
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                tracing::debug!(session_id = %id, error = %e, "Observer read failed");
                break;
            }
        };

        match decoded {
            Ok(command) => {
                tracing::debug!(session_id = %id, %command, "Command received");
                commands.submit(command);
            }
            Err(e) => {
                tracing::warn!(session_id = %id, error = %e, "Discarding malformed command");
            }
        }
    }
    tracing::debug!(session_id = %id, "Observer stopped sending");
}
