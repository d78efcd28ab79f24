//! Repository trait 定義
//!
//! ドメイン層が必要とするデータアクセスのインターフェースを定義します。
//! 具体的な実装は Infrastructure 層が提供します（依存性の逆転）。
//!
//! - `ConnectionRepository`: Presence Store（接続 1 本につき 1 行）
//! - `ChannelRepository`: Channel Registry
//! - `MessageRepository`: メッセージの永続化（外部コラボレーター）
//! - `PrivilegeChecker`: 権限判定（外部コラボレーター）

use async_trait::async_trait;

use super::{
    entity::{Channel, ChannelMessage, Connection, DirectMessage},
    error::RepositoryError,
    value_object::{ChannelName, ConnectionId, Identity, MessageContent, MessageId, Timestamp},
};

/// Presence Store
///
/// 単一行の読み書きはアトミックであることだけを要求する。
/// 行をまたぐ整合性は Hub 側の per-key ロックで保証する。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConnectionRepository: Send + Sync {
    /// 接続を取得
    async fn get(&self, id: &ConnectionId) -> Result<Option<Connection>, RepositoryError>;

    /// 接続を作成または上書き
    async fn upsert(&self, connection: Connection) -> Result<(), RepositoryError>;

    /// 接続を削除し、削除前の行を返す（存在しなければ `None`）
    async fn remove(&self, id: &ConnectionId) -> Result<Option<Connection>, RepositoryError>;

    /// 全ての接続のスナップショット
    async fn list_all(&self) -> Result<Vec<Connection>, RepositoryError>;

    /// 指定チャンネルにいる接続
    async fn list_by_channel(
        &self,
        channel: &ChannelName,
    ) -> Result<Vec<Connection>, RepositoryError>;

    /// 指定 Identity の接続
    async fn list_by_identity(
        &self,
        identity: &Identity,
    ) -> Result<Vec<Connection>, RepositoryError>;

    /// `active_since` 以降に活動した接続が Identity に存在するか
    async fn has_active_connection(
        &self,
        identity: &Identity,
        active_since: Timestamp,
    ) -> Result<bool, RepositoryError>;
}

/// Channel Registry
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChannelRepository: Send + Sync {
    async fn exists(&self, name: &ChannelName) -> Result<bool, RepositoryError>;

    async fn get_channel(&self, name: &ChannelName) -> Result<Option<Channel>, RepositoryError>;

    async fn list_channels(&self) -> Result<Vec<Channel>, RepositoryError>;

    /// ミュートされていないチャンネルのスナップショット
    async fn list_unmuted(&self) -> Result<Vec<Channel>, RepositoryError>;

    /// 同名（case-insensitive）のチャンネルがあれば `ChannelAlreadyExists`
    async fn create_channel(&self, channel: Channel) -> Result<(), RepositoryError>;

    async fn delete_channel(&self, name: &ChannelName) -> Result<Option<Channel>, RepositoryError>;

    /// ミュート状態を設定し、状態が変化したかを返す
    async fn set_muted(&self, name: &ChannelName, muted: bool) -> Result<bool, RepositoryError>;

    /// ミュートされていない場合だけミュートする（compare-and-set）
    ///
    /// 実際にミュートしたときだけ `true` を返す。
    async fn mute_if_unmuted(&self, name: &ChannelName) -> Result<bool, RepositoryError>;

    async fn set_active_manager(
        &self,
        name: &ChannelName,
        manager: Option<Identity>,
    ) -> Result<(), RepositoryError>;
}

/// メッセージの永続化
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageRepository: Send + Sync {
    async fn append_channel_message(
        &self,
        channel: ChannelName,
        from: Identity,
        content: MessageContent,
        timestamp: Timestamp,
    ) -> Result<ChannelMessage, RepositoryError>;

    async fn append_direct_message(
        &self,
        from: Identity,
        to: Identity,
        content: MessageContent,
        timestamp: Timestamp,
    ) -> Result<DirectMessage, RepositoryError>;

    /// `reader` 宛ての未読メッセージを既読にし、今回既読になったものを返す
    async fn mark_direct_read(
        &self,
        reader: &Identity,
        ids: &[MessageId],
    ) -> Result<Vec<DirectMessage>, RepositoryError>;

    /// チャンネルの直近 `limit` 件（古い順）
    async fn recent_channel_messages(
        &self,
        channel: &ChannelName,
        limit: usize,
    ) -> Result<Vec<ChannelMessage>, RepositoryError>;

    /// `recipient` 宛ての未読ダイレクトメッセージ
    async fn unread_direct_messages(
        &self,
        recipient: &Identity,
    ) -> Result<Vec<DirectMessage>, RepositoryError>;
}

/// 権限判定
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PrivilegeChecker: Send + Sync {
    /// ミュート中でも投稿できる、あるいはチャンネルを管理できる Identity か
    async fn is_privileged(&self, identity: &Identity, channel: &ChannelName) -> bool;
}
