//! WebSocket connection handlers.
//!
//! 1 本の WebSocket が 1 つの Connection に対応する。
//! 受信したフレームは順番に 1 つずつ Hub に渡し、処理の途中で中断しない
//! （接続を閉じるときも、処理中のフレームが終わるのを待つ）。

use std::sync::Arc;

use axum::{
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::IntoResponse,
};
use futures_util::{sink::SinkExt, stream::StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::{
    domain::{
        ChannelName, ConnectionId, ConnectionIdFactory, HubEvent, Identity, MessageContent,
        MessageId,
    },
    infrastructure::dto::websocket::{ClientMessage, ServerMessage},
    ui::state::AppState,
    usecase::{JoinError, SendMessageError},
};

/// Query parameters for WebSocket connection
#[derive(Debug, Deserialize)]
pub struct ConnectQuery {
    pub identity: String,
}

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<ConnectQuery>,
) -> Result<impl IntoResponse, StatusCode> {
    // Convert String -> Identity (Domain Model)
    let identity = match Identity::try_from(query.identity.clone()) {
        Ok(identity) => identity,
        Err(e) => {
            tracing::warn!("Invalid identity '{}': {}", query.identity, e);
            return Err(StatusCode::BAD_REQUEST);
        }
    };

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, identity)))
}

/// Spawns a task that forwards encoded events from the rx channel to the WebSocket sender.
///
/// The task ends when every sender of the channel is dropped, which happens when
/// the connection is unregistered from the MessagePusher (e.g. evicted by the reaper).
fn pusher_loop(
    mut rx: mpsc::UnboundedReceiver<String>,
    mut sender: futures_util::stream::SplitSink<WebSocket, Message>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if sender.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
        let _ = sender.close().await;
    })
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, identity: Identity) {
    let connection_id = ConnectionIdFactory::generate();

    // Register the outbound channel. Error replies go through a weak handle so that
    // unregistering the client is enough to close the socket.
    let (tx, rx) = mpsc::unbounded_channel();
    let replies = tx.downgrade();
    state
        .message_pusher
        .register_client(connection_id.clone(), tx)
        .await;
    tracing::info!(identity = %identity, connection_id = %connection_id, "WebSocket connected");

    let connected = HubEvent::Connected {
        connection_id: connection_id.clone(),
    };
    state
        .hub
        .router()
        .send_to_connection(&connection_id, &connected)
        .await;
    if let Err(e) = state.hub.ping(&identity, &connection_id).await {
        tracing::warn!(connection_id = %connection_id, "Initial ping failed: {}", e);
    }
    if let Err(e) = state
        .hub
        .deliver_pending_direct(&identity, &connection_id)
        .await
    {
        tracing::warn!(identity = %identity, "Failed to deliver pending direct messages: {}", e);
    }

    let (sender, mut receiver) = socket.split();
    let mut send_task = pusher_loop(rx, sender);

    let closing = state.shutdown.child_token();
    let mut recv_task = {
        let state = state.clone();
        let identity = identity.clone();
        let connection_id = connection_id.clone();
        let closing = closing.clone();
        tokio::spawn(async move {
            loop {
                let frame = tokio::select! {
                    _ = closing.cancelled() => break,
                    frame = receiver.next() => frame,
                };
                let message = match frame {
                    Some(Ok(message)) => message,
                    Some(Err(e)) => {
                        tracing::debug!(connection_id = %connection_id, "WebSocket error: {}", e);
                        break;
                    }
                    None => break,
                };

                match message {
                    Message::Text(text) => {
                        dispatch(&state, &identity, &connection_id, &replies, text.as_str()).await;
                    }
                    Message::Close(_) => {
                        tracing::info!(connection_id = %connection_id, "Client requested close");
                        break;
                    }
                    // Ping/pong is handled automatically by the WebSocket protocol
                    _ => {}
                }
            }
        })
    };

    // If either side finishes, stop the other one. The receive side is never aborted
    // while it is in the middle of a hub operation.
    tokio::select! {
        _ = &mut recv_task => send_task.abort(),
        _ = &mut send_task => {
            closing.cancel();
            let _ = recv_task.await;
        }
    };

    match state.hub.disconnect(&connection_id).await {
        Ok(true) => {
            tracing::info!(identity = %identity, connection_id = %connection_id, "WebSocket disconnected");
        }
        Ok(false) => {
            tracing::debug!(connection_id = %connection_id, "Connection was already removed");
        }
        Err(e) => {
            tracing::warn!(connection_id = %connection_id, "Failed to disconnect: {}", e);
        }
    }
    state
        .message_pusher
        .unregister_client(&connection_id)
        .await;
    state.hub.release_connection(&connection_id);
}

/// 受信したフレームを Hub の操作に変換する
///
/// Hub の操作はトランスポートから見て fire-and-forget なので、
/// 失敗はログに残すだけで呼び出し元へは返さない。
async fn dispatch(
    state: &AppState,
    identity: &Identity,
    connection_id: &ConnectionId,
    replies: &mpsc::WeakUnboundedSender<String>,
    text: &str,
) {
    let message = match serde_json::from_str::<ClientMessage>(text) {
        Ok(message) => message,
        Err(e) => {
            tracing::warn!(connection_id = %connection_id, "Failed to parse message: {}", e);
            reply_error(replies, format!("Unrecognized message: {}", e));
            return;
        }
    };
    let hub = &state.hub;

    match message {
        ClientMessage::Ping => {
            if let Err(e) = hub.ping(identity, connection_id).await {
                tracing::warn!(connection_id = %connection_id, "Ping dropped: {}", e);
            }
        }
        ClientMessage::Join { channel } => {
            let Ok(name) = ChannelName::new(&channel) else {
                notify_channel_not_found(state, connection_id, channel).await;
                return;
            };
            match hub.join(identity, &name, connection_id).await {
                Ok(()) | Err(JoinError::ChannelNotFound(_)) => {}
                Err(JoinError::Store(e)) => {
                    tracing::warn!(connection_id = %connection_id, channel = %name, "Join dropped: {}", e);
                }
            }
        }
        ClientMessage::Leave { channel } => {
            let Ok(name) = ChannelName::new(&channel) else {
                tracing::debug!(connection_id = %connection_id, "Leave ignored: invalid channel name");
                return;
            };
            if let Err(e) = hub.leave(connection_id, &name).await {
                tracing::warn!(connection_id = %connection_id, channel = %name, "Leave dropped: {}", e);
            }
        }
        ClientMessage::Send { channel, content } => {
            let Ok(name) = ChannelName::new(&channel) else {
                notify_channel_not_found(state, connection_id, channel).await;
                return;
            };
            let content = match MessageContent::new(content) {
                Ok(content) => content,
                Err(e) => {
                    reply_error(replies, e.to_string());
                    return;
                }
            };
            match hub.send_message(identity, connection_id, &name, content).await {
                Ok(_) | Err(SendMessageError::ChannelNotFound(_)) | Err(SendMessageError::Blocked(_)) => {}
                Err(SendMessageError::Store(e)) => {
                    tracing::warn!(connection_id = %connection_id, channel = %name, "Message dropped: {}", e);
                }
            }
        }
        ClientMessage::SendDirect { to, content } => {
            let to = match Identity::new(&to) {
                Ok(to) => to,
                Err(e) => {
                    reply_error(replies, e.to_string());
                    return;
                }
            };
            let content = match MessageContent::new(content) {
                Ok(content) => content,
                Err(e) => {
                    reply_error(replies, e.to_string());
                    return;
                }
            };
            if let Err(e) = hub.send_direct(identity, connection_id, &to, content).await {
                tracing::warn!(connection_id = %connection_id, to = %to, "Direct message dropped: {}", e);
            }
        }
        ClientMessage::MarkRead { ids } => {
            let ids: Vec<MessageId> = ids.into_iter().map(MessageId::new).collect();
            if let Err(e) = hub.mark_read(identity, &ids).await {
                tracing::warn!(connection_id = %connection_id, "Mark-read dropped: {}", e);
            }
        }
    }
}

/// 名前として不正なチャンネルは存在しないチャンネルとして扱う
async fn notify_channel_not_found(state: &AppState, connection_id: &ConnectionId, channel: String) {
    let event = HubEvent::ChannelNotFound { channel };
    state
        .hub
        .router()
        .send_to_connection(connection_id, &event)
        .await;
}

fn reply_error(replies: &mpsc::WeakUnboundedSender<String>, reason: String) {
    let Some(sender) = replies.upgrade() else {
        return;
    };
    match serde_json::to_string(&ServerMessage::Error { reason }) {
        Ok(frame) => {
            let _ = sender.send(frame);
        }
        Err(e) => tracing::warn!("Failed to encode error reply: {}", e),
    }
}
