//! Entity 定義

use serde::Serialize;

use super::value_object::{
    ChannelName, ConnectionId, Identity, MessageContent, MessageId, Timestamp,
};

/// 物理接続 1 本に対応する Presence Store の行
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Connection {
    pub id: ConnectionId,
    pub identity: Identity,
    /// 現在参加しているチャンネル（同時に 1 つまで）
    pub channel: Option<ChannelName>,
    pub last_activity: Timestamp,
    /// この行を所有するサーバーインスタンス
    pub owner_instance: String,
}

impl Connection {
    /// チャンネル未参加の新しい接続
    pub fn new(
        id: ConnectionId,
        identity: Identity,
        now: Timestamp,
        owner_instance: impl Into<String>,
    ) -> Self {
        Self {
            id,
            identity,
            channel: None,
            last_activity: now,
            owner_instance: owner_instance.into(),
        }
    }

    pub fn is_in(&self, channel: &ChannelName) -> bool {
        self.channel.as_ref() == Some(channel)
    }
}

/// Channel Registry の行
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Channel {
    pub name: ChannelName,
    pub creator: Identity,
    /// 明示的に設定されたマネージャー。未設定なら作成者が実質的なマネージャー
    pub active_manager: Option<Identity>,
    pub is_muted: bool,
    pub description: Option<String>,
    pub created_at: Timestamp,
}

impl Channel {
    pub fn new(
        name: ChannelName,
        creator: Identity,
        description: Option<String>,
        created_at: Timestamp,
    ) -> Self {
        Self {
            name,
            creator,
            active_manager: None,
            is_muted: false,
            description,
            created_at,
        }
    }

    /// Sentinel が生存確認する Identity
    pub fn effective_manager(&self) -> &Identity {
        self.active_manager.as_ref().unwrap_or(&self.creator)
    }

    pub fn is_creator(&self, identity: &Identity) -> bool {
        &self.creator == identity
    }
}

/// チャンネルに投稿されたメッセージ
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelMessage {
    pub id: MessageId,
    pub channel: ChannelName,
    pub from: Identity,
    pub content: MessageContent,
    pub timestamp: Timestamp,
}

/// ダイレクトメッセージ
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectMessage {
    pub id: MessageId,
    pub from: Identity,
    pub to: Identity,
    pub content: MessageContent,
    pub timestamp: Timestamp,
    pub is_read: bool,
}
