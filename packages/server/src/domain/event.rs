//! Hub が発行するイベント
//!
//! 配送先（呼び出し元 / グループ / 全体 / 特定の接続）はイベント自身ではなく
//! Broadcast Router への呼び出し方で決まる。

use super::{
    entity::{ChannelMessage, DirectMessage},
    value_object::{ChannelName, ConnectionId, Identity, MessageId},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HubEvent {
    /// トランスポート接続直後に呼び出し元へ
    Connected { connection_id: ConnectionId },
    /// → group
    UserJoined {
        identity: Identity,
        channel: ChannelName,
    },
    /// → group
    UserLeft {
        identity: Identity,
        channel: ChannelName,
    },
    /// → group
    UpdateUserList {
        channel: ChannelName,
        users: Vec<Identity>,
    },
    /// → group
    ChannelMuteStatusChanged { channel: ChannelName, muted: bool },
    /// → caller
    ChannelNotFound { channel: String },
    /// → caller
    MessageBlocked { reason: String },
    /// → group
    ReceiveMessage { message: ChannelMessage },
    /// → recipient connections
    ReceivePrivateMessage { message: DirectMessage },
    /// → sender connection
    PrivateMessageSent { message: DirectMessage },
    /// → original sender connections
    PrivateMessagesRead {
        reader: Identity,
        ids: Vec<MessageId>,
    },
    /// → all
    UserStatusChanged { identity: Identity, online: bool },
    /// → group
    ChannelDeleted {
        channel: ChannelName,
        actor: Identity,
    },
    /// → all
    ChannelListUpdated,
}

impl HubEvent {
    /// ログ出力用のイベント名
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connected { .. } => "connected",
            Self::UserJoined { .. } => "user-joined",
            Self::UserLeft { .. } => "user-left",
            Self::UpdateUserList { .. } => "update-user-list",
            Self::ChannelMuteStatusChanged { .. } => "channel-mute-status-changed",
            Self::ChannelNotFound { .. } => "channel-not-found",
            Self::MessageBlocked { .. } => "message-blocked",
            Self::ReceiveMessage { .. } => "receive-message",
            Self::ReceivePrivateMessage { .. } => "receive-private-message",
            Self::PrivateMessageSent { .. } => "private-message-sent",
            Self::PrivateMessagesRead { .. } => "private-messages-read",
            Self::UserStatusChanged { .. } => "user-status-changed",
            Self::ChannelDeleted { .. } => "channel-deleted",
            Self::ChannelListUpdated => "channel-list-updated",
        }
    }
}
