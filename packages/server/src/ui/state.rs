//! Server state.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::{
    domain::MessagePusher,
    usecase::{ChannelAdminUseCase, PresenceHub},
};

/// Shared application state
pub struct AppState {
    /// PresenceHub（接続ごとのイベント処理）
    pub hub: Arc<PresenceHub>,
    /// ChannelAdminUseCase（チャンネル管理 API）
    pub channel_admin: Arc<ChannelAdminUseCase>,
    /// MessagePusher（WebSocket 送信チャンネルの登録先）
    pub message_pusher: Arc<dyn MessagePusher>,
    /// サーバー停止時に WebSocket 接続を閉じるためのトークン
    pub shutdown: CancellationToken,
}
