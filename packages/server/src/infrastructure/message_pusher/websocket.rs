//! WebSocket を使った MessagePusher 実装
//!
//! ## 責務
//!
//! - WebSocket の `UnboundedSender` を接続 ID ごとに管理
//! - `HubEvent` を JSON フレームにエンコードして送信（push_to, broadcast, broadcast_all）
//!
//! ## 設計ノート
//!
//! WebSocket の生成は UI 層（`ui/handler/websocket.rs`）で行われます。
//! この実装は生成された `UnboundedSender` を受け取り、メッセージ送信に使用します。
//! 送信は unbounded channel への enqueue なので、呼び出し側をブロックしません。

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::{
    domain::{ConnectionId, HubEvent, MessagePushError, MessagePusher, PusherChannel},
    infrastructure::dto::websocket::ServerMessage,
};

/// `HubEvent` を WebSocket フレーム（JSON 文字列）にエンコード
pub fn encode_event(event: &HubEvent) -> Result<String, MessagePushError> {
    serde_json::to_string(&ServerMessage::from(event))
        .map_err(|e| MessagePushError::EncodeFailed(e.to_string()))
}

/// WebSocket を使った MessagePusher 実装
///
/// ## 使用例
///
/// ```ignore
/// let pusher = WebSocketMessagePusher::new();
/// pusher.register_client(connection_id.clone(), tx).await;
/// pusher.push_to(&connection_id, &HubEvent::ChannelListUpdated).await?;
/// ```
#[derive(Default)]
pub struct WebSocketMessagePusher {
    /// 接続中のクライアントの WebSocket sender
    ///
    /// Key: ConnectionId
    /// Value: PusherChannel
    clients: Arc<Mutex<HashMap<ConnectionId, PusherChannel>>>,
}

impl WebSocketMessagePusher {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登録済みの接続数
    pub async fn client_count(&self) -> usize {
        self.clients.lock().await.len()
    }
}

#[async_trait]
impl MessagePusher for WebSocketMessagePusher {
    async fn register_client(&self, connection_id: ConnectionId, sender: PusherChannel) {
        let mut clients = self.clients.lock().await;
        tracing::debug!(connection_id = %connection_id, "Client registered to MessagePusher");
        clients.insert(connection_id, sender);
    }

    async fn unregister_client(&self, connection_id: &ConnectionId) {
        let mut clients = self.clients.lock().await;
        if clients.remove(connection_id).is_some() {
            tracing::debug!(connection_id = %connection_id, "Client unregistered from MessagePusher");
        }
    }

    async fn push_to(
        &self,
        connection_id: &ConnectionId,
        event: &HubEvent,
    ) -> Result<(), MessagePushError> {
        let frame = encode_event(event)?;
        let clients = self.clients.lock().await;

        if let Some(sender) = clients.get(connection_id) {
            sender
                .send(frame)
                .map_err(|e| MessagePushError::PushFailed(e.to_string()))?;
            tracing::debug!(
                connection_id = %connection_id,
                event = event.name(),
                "Pushed event to client"
            );
            Ok(())
        } else {
            Err(MessagePushError::ClientNotFound(connection_id.to_string()))
        }
    }

    async fn broadcast(
        &self,
        targets: Vec<ConnectionId>,
        event: &HubEvent,
    ) -> Result<(), MessagePushError> {
        let frame = encode_event(event)?;
        let clients = self.clients.lock().await;

        for target in targets {
            if let Some(sender) = clients.get(&target) {
                // ブロードキャストでは一部の送信失敗を許容
                if let Err(e) = sender.send(frame.clone()) {
                    tracing::warn!(connection_id = %target, "Failed to push event: {}", e);
                }
            } else {
                // 他インスタンスが所有する接続、あるいは切断直後
                tracing::debug!(
                    connection_id = %target,
                    "Client not found during broadcast, skipping"
                );
            }
        }
        tracing::debug!(event = event.name(), "Broadcasted event");

        Ok(())
    }

    async fn broadcast_all(&self, event: &HubEvent) -> Result<(), MessagePushError> {
        let frame = encode_event(event)?;
        let clients = self.clients.lock().await;

        for (connection_id, sender) in clients.iter() {
            if let Err(e) = sender.send(frame.clone()) {
                tracing::warn!(connection_id = %connection_id, "Failed to push event: {}", e);
            }
        }
        tracing::debug!(event = event.name(), recipients = clients.len(), "Broadcasted event to all");

        Ok(())
    }
}
