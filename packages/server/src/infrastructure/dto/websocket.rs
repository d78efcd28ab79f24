//! WebSocket frame DTOs.
//!
//! 全てのフレームは `type` フィールドでタグ付けされた JSON オブジェクト。

use serde::{Deserialize, Serialize};

/// クライアント → サーバー
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    Ping,
    Join { channel: String },
    Leave { channel: String },
    Send { channel: String, content: String },
    SendDirect { to: String, content: String },
    MarkRead { ids: Vec<u64> },
}

/// チャンネル投稿
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelMessageDto {
    pub id: u64,
    pub channel: String,
    pub from: String,
    pub content: String,
    pub timestamp: i64,
}

/// ダイレクトメッセージ
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectMessageDto {
    pub id: u64,
    pub from: String,
    pub to: String,
    pub content: String,
    pub timestamp: i64,
    pub is_read: bool,
}

/// サーバー → クライアント
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    Connected {
        connection_id: String,
    },
    UserJoined {
        identity: String,
        channel: String,
    },
    UserLeft {
        identity: String,
        channel: String,
    },
    UpdateUserList {
        channel: String,
        users: Vec<String>,
    },
    ChannelMuteStatusChanged {
        channel: String,
        muted: bool,
    },
    ChannelNotFound {
        channel: String,
    },
    MessageBlocked {
        reason: String,
    },
    ReceiveMessage {
        message: ChannelMessageDto,
    },
    ReceivePrivateMessage {
        message: DirectMessageDto,
    },
    PrivateMessageSent {
        message: DirectMessageDto,
    },
    PrivateMessagesRead {
        reader: String,
        ids: Vec<u64>,
    },
    UserStatusChanged {
        identity: String,
        online: bool,
    },
    ChannelDeleted {
        channel: String,
        actor: String,
    },
    ChannelListUpdated,
    /// 受信フレームが不正だった場合に呼び出し元へ返す
    Error {
        reason: String,
    },
}
