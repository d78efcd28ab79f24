//! Presence Hub
//!
//! 接続ごとのライフサイクルイベント（ping / join / leave / send / disconnect）を
//! Presence Store・Channel Registry・Broadcast Router に対して適用する状態機械。
//!
//! # ロック
//!
//! - 同じ Identity・同じ ConnectionId への操作はキー単位のロックで直列化する
//! - 両方取る場合は必ず Identity → ConnectionId の順
//! - グローバルなロックは持たない（無関係なチャンネルの操作は並行に進む）
//!
//! # 一貫性
//!
//! Presence Store が正で、グループはその射影。各操作は「ストアを書く → グループを更新する」の
//! 順で進め、ストアの書き込みに失敗した時点で中断するので、途中で失敗しても
//! 行とグループは食い違わない。食い違いを検知した場合はグループを stale とし、
//! 次にそのグループへ送るときに Presence Store から再構築する。

mod direct_message;
mod disconnect;
mod join;
mod leave;
mod lock;
mod ping;
mod send_message;

#[cfg(test)]
pub(crate) mod test_support;

use std::{future::Future, sync::Arc};

use dashmap::DashSet;
use hiroba_shared::time::Clock;

pub use lock::{KeyedGuard, KeyedLocks};

use crate::{
    config::HubConfig,
    domain::{
        Channel, ChannelMessage, ChannelName, ChannelRepository, ConnectionId,
        ConnectionRepository, HubEvent, Identity, MessageRepository, PrivilegeChecker,
        RepositoryError, Timestamp,
    },
    infrastructure::BroadcastRouter,
    usecase::retry,
};

/// Hub とバックグラウンド処理が共有する外部コラボレーター
#[derive(Clone)]
pub struct HubPorts {
    pub connections: Arc<dyn ConnectionRepository>,
    pub channels: Arc<dyn ChannelRepository>,
    pub messages: Arc<dyn MessageRepository>,
    pub privileges: Arc<dyn PrivilegeChecker>,
}

pub struct PresenceHub {
    connections: Arc<dyn ConnectionRepository>,
    channels: Arc<dyn ChannelRepository>,
    messages: Arc<dyn MessageRepository>,
    privileges: Arc<dyn PrivilegeChecker>,
    router: Arc<BroadcastRouter>,
    clock: Arc<dyn Clock>,
    config: HubConfig,
    identity_locks: KeyedLocks<Identity>,
    connection_locks: KeyedLocks<ConnectionId>,
    /// 切断済みでトランスポートがまだ閉じきっていない接続（行の復活を防ぐ）
    retired: DashSet<ConnectionId>,
}

impl PresenceHub {
    pub fn new(
        ports: HubPorts,
        router: Arc<BroadcastRouter>,
        clock: Arc<dyn Clock>,
        config: HubConfig,
    ) -> Self {
        Self {
            connections: ports.connections,
            channels: ports.channels,
            messages: ports.messages,
            privileges: ports.privileges,
            router,
            clock,
            config,
            identity_locks: KeyedLocks::new(),
            connection_locks: KeyedLocks::new(),
            retired: DashSet::new(),
        }
    }

    pub fn router(&self) -> &Arc<BroadcastRouter> {
        &self.router
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    /// トランスポートが完全に閉じた接続の記録を消す
    pub fn release_connection(&self, connection_id: &ConnectionId) {
        self.retired.remove(connection_id);
    }

    pub(crate) fn is_retired(&self, connection_id: &ConnectionId) -> bool {
        self.retired.contains(connection_id)
    }

    pub(crate) fn now(&self) -> Timestamp {
        Timestamp::new(self.clock.now_jst_millis())
    }

    /// ストア操作を `store_timeout` で打ち切る
    pub(crate) async fn bounded<T>(
        &self,
        operation: impl Future<Output = Result<T, RepositoryError>>,
    ) -> Result<T, RepositoryError> {
        retry::bounded(self.config.store_timeout, operation).await
    }

    /// 権限判定（時間切れは権限なし扱い）
    pub(crate) async fn is_privileged(&self, identity: &Identity, channel: &ChannelName) -> bool {
        tokio::time::timeout(
            self.config.store_timeout,
            self.privileges.is_privileged(identity, channel),
        )
        .await
        .unwrap_or_else(|_| {
            tracing::warn!(identity = %identity, channel = %channel, "Privilege check timed out");
            false
        })
    }

    /// チャンネルにいる Identity の一覧（重複なし、キー順）
    ///
    /// 他のインスタンスが所有する接続も含む。
    pub async fn roster(&self, channel: &ChannelName) -> Result<Vec<Identity>, RepositoryError> {
        let rows = self
            .bounded(self.connections.list_by_channel(channel))
            .await?;
        let mut users: Vec<Identity> = rows.into_iter().map(|c| c.identity).collect();
        users.sort_by(|a, b| a.key().cmp(b.key()));
        users.dedup();
        Ok(users)
    }

    /// チャンネルの直近 `limit` 件の投稿（古い順）
    pub async fn channel_history(
        &self,
        channel: &ChannelName,
        limit: usize,
    ) -> Result<Vec<ChannelMessage>, RepositoryError> {
        self.bounded(self.messages.recent_channel_messages(channel, limit))
            .await
    }

    /// グループへ送信する。stale なグループは先に再構築する
    pub(crate) async fn send_to_group(&self, channel: &ChannelName, event: &HubEvent) {
        if self.router.is_stale(channel) {
            self.resync_group(channel).await;
        }
        self.router.send_to_group(channel, event).await;
    }

    /// Presence Store からこのインスタンスが所有する接続を読み直してグループを置き換える
    pub(crate) async fn resync_group(&self, channel: &ChannelName) {
        match self
            .bounded(self.connections.list_by_channel(channel))
            .await
        {
            Ok(rows) => {
                let members: Vec<ConnectionId> = rows
                    .into_iter()
                    .filter(|c| c.owner_instance == self.config.instance_id)
                    .map(|c| c.id)
                    .collect();
                tracing::info!(
                    channel = %channel,
                    members = members.len(),
                    "Resynchronized group from presence store"
                );
                self.router.replace_group(channel, members);
            }
            Err(e) => {
                tracing::warn!(channel = %channel, "Group resync failed, keeping it stale: {}", e);
            }
        }
    }

    /// 最新の参加者一覧をグループへ送る
    pub(crate) async fn broadcast_roster(&self, channel: &ChannelName) {
        match self.roster(channel).await {
            Ok(users) => {
                let event = HubEvent::UpdateUserList {
                    channel: channel.clone(),
                    users,
                };
                self.send_to_group(channel, &event).await;
            }
            Err(e) => {
                tracing::warn!(channel = %channel, "Failed to load roster: {}", e);
            }
        }
    }

    /// 参加者一覧とミュート状態を特定の接続にだけ送る
    pub(crate) async fn send_channel_state_to(
        &self,
        connection_id: &ConnectionId,
        channel: &Channel,
    ) {
        match self.roster(&channel.name).await {
            Ok(users) => {
                let event = HubEvent::UpdateUserList {
                    channel: channel.name.clone(),
                    users,
                };
                self.router.send_to_connection(connection_id, &event).await;
            }
            Err(e) => {
                tracing::warn!(channel = %channel.name, "Failed to load roster: {}", e);
            }
        }
        let event = HubEvent::ChannelMuteStatusChanged {
            channel: channel.name.clone(),
            muted: channel.is_muted,
        };
        self.router.send_to_connection(connection_id, &event).await;
    }

    /// グループへ追加する（行は `channel` に更新済みであること）
    pub(crate) fn enter_group(&self, channel: &ChannelName, connection_id: &ConnectionId) {
        if !self.router.add_to_group(channel, connection_id.clone()) {
            tracing::error!(
                channel = %channel,
                connection_id = %connection_id,
                "Group already contained a connection the store had elsewhere"
            );
            self.router.mark_stale(channel);
        }
    }

    /// グループから外して退出を通知する（行は更新済みであること）
    pub(crate) async fn leave_group(
        &self,
        identity: &Identity,
        channel: &ChannelName,
        connection_id: &ConnectionId,
    ) {
        if !self.router.remove_from_group(channel, connection_id) {
            tracing::error!(
                channel = %channel,
                connection_id = %connection_id,
                "Connection was missing from its channel group"
            );
            self.router.mark_stale(channel);
        }
        let event = HubEvent::UserLeft {
            identity: identity.clone(),
            channel: channel.clone(),
        };
        self.send_to_group(channel, &event).await;
        self.broadcast_roster(channel).await;
    }

    /// Identity の接続がこの 1 本だけならオンライン通知を全体へ送る
    ///
    /// 呼び出し元は Identity のロックを保持していること。
    pub(crate) async fn announce_online_if_first(
        &self,
        identity: &Identity,
        connection_id: &ConnectionId,
    ) {
        match self
            .bounded(self.connections.list_by_identity(identity))
            .await
        {
            Ok(rows) if rows.iter().all(|c| &c.id == connection_id) => {
                tracing::info!(identity = %identity, "User is online");
                let event = HubEvent::UserStatusChanged {
                    identity: identity.clone(),
                    online: true,
                };
                self.router.send_to_all(&event).await;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(identity = %identity, "Skipped online notice: {}", e);
            }
        }
    }
}
