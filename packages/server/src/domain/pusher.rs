//! MessagePusher trait 定義
//!
//! クライアントへのイベント配送（トランスポート）の抽象化。
//! グループの管理は Broadcast Router が担い、MessagePusher は
//! 「接続 ID を指定して届ける」ことだけを責務とする。

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{error::MessagePushError, event::HubEvent, value_object::ConnectionId};

/// クライアントへのメッセージ送信用チャンネル（エンコード済みフレーム）
pub type PusherChannel = mpsc::UnboundedSender<String>;

#[async_trait]
pub trait MessagePusher: Send + Sync {
    /// 接続の送信チャンネルを登録
    async fn register_client(&self, connection_id: ConnectionId, sender: PusherChannel);

    /// 接続の送信チャンネルを登録解除（送信チャンネルが drop され、接続が閉じる）
    async fn unregister_client(&self, connection_id: &ConnectionId);

    /// 特定の接続へ送信
    async fn push_to(
        &self,
        connection_id: &ConnectionId,
        event: &HubEvent,
    ) -> Result<(), MessagePushError>;

    /// 複数の接続へ送信（一部の失敗は許容）
    async fn broadcast(
        &self,
        targets: Vec<ConnectionId>,
        event: &HubEvent,
    ) -> Result<(), MessagePushError>;

    /// 登録済みの全接続へ送信
    async fn broadcast_all(&self, event: &HubEvent) -> Result<(), MessagePushError>;
}
