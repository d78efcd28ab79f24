//! Broadcast Router
//!
//! チャンネル名 → 接続 ID の集合（グループ）をメモリ上に保持し、
//! 接続 / グループ / 全体へのファンアウトを MessagePusher の上に構築します。
//!
//! グループは Presence Store から導出される射影であり、正ではありません。
//! 不整合を検知したグループは stale としてマークされ、
//! 次のアクセス時に Hub が Presence Store から再構築します。

use std::{collections::HashSet, sync::Arc};

use dashmap::{DashMap, DashSet};

use crate::domain::{ChannelName, ConnectionId, HubEvent, MessagePusher};

pub struct BroadcastRouter {
    groups: DashMap<ChannelName, HashSet<ConnectionId>>,
    stale: DashSet<ChannelName>,
    pusher: Arc<dyn MessagePusher>,
}

impl BroadcastRouter {
    pub fn new(pusher: Arc<dyn MessagePusher>) -> Self {
        Self {
            groups: DashMap::new(),
            stale: DashSet::new(),
            pusher,
        }
    }

    /// 下層の MessagePusher
    pub fn pusher(&self) -> &Arc<dyn MessagePusher> {
        &self.pusher
    }

    /// グループに追加し、新たに追加された場合 `true`
    pub fn add_to_group(&self, channel: &ChannelName, connection_id: ConnectionId) -> bool {
        self.groups
            .entry(channel.clone())
            .or_default()
            .insert(connection_id)
    }

    /// グループから削除し、所属していた場合 `true`。空になったグループは破棄する
    pub fn remove_from_group(&self, channel: &ChannelName, connection_id: &ConnectionId) -> bool {
        let removed = {
            let Some(mut members) = self.groups.get_mut(channel) else {
                return false;
            };
            members.remove(connection_id)
        };
        self.groups.remove_if(channel, |_, members| members.is_empty());
        removed
    }

    pub fn contains(&self, channel: &ChannelName, connection_id: &ConnectionId) -> bool {
        self.groups
            .get(channel)
            .is_some_and(|members| members.contains(connection_id))
    }

    /// グループのスナップショット（ソート済み）
    pub fn members(&self, channel: &ChannelName) -> Vec<ConnectionId> {
        let mut members: Vec<ConnectionId> = self
            .groups
            .get(channel)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default();
        members.sort();
        members
    }

    /// グループを丸ごと置き換え、stale マークを外す
    pub fn replace_group(
        &self,
        channel: &ChannelName,
        members: impl IntoIterator<Item = ConnectionId>,
    ) {
        let members: HashSet<ConnectionId> = members.into_iter().collect();
        if members.is_empty() {
            self.groups.remove(channel);
        } else {
            self.groups.insert(channel.clone(), members);
        }
        self.stale.remove(channel);
    }

    /// グループを破棄し、所属していた接続を返す
    pub fn remove_group(&self, channel: &ChannelName) -> Vec<ConnectionId> {
        self.stale.remove(channel);
        self.groups
            .remove(channel)
            .map(|(_, members)| members.into_iter().collect())
            .unwrap_or_default()
    }

    /// グループと Presence Store の不整合を検知した
    pub fn mark_stale(&self, channel: &ChannelName) {
        self.stale.insert(channel.clone());
    }

    pub fn is_stale(&self, channel: &ChannelName) -> bool {
        self.stale.contains(channel)
    }

    /// 特定の接続へ送信（失敗はログのみ）
    pub async fn send_to_connection(&self, connection_id: &ConnectionId, event: &HubEvent) {
        if let Err(e) = self.pusher.push_to(connection_id, event).await {
            tracing::debug!(
                connection_id = %connection_id,
                event = event.name(),
                "Dropped event for connection: {}",
                e
            );
        }
    }

    /// 複数の接続へ送信（失敗はログのみ）
    pub async fn send_to_connections(&self, targets: Vec<ConnectionId>, event: &HubEvent) {
        if targets.is_empty() {
            return;
        }
        if let Err(e) = self.pusher.broadcast(targets, event).await {
            tracing::warn!(event = event.name(), "Failed to deliver event: {}", e);
        }
    }

    /// グループへ送信（失敗はログのみ）
    pub async fn send_to_group(&self, channel: &ChannelName, event: &HubEvent) {
        let targets = self.members(channel);
        tracing::debug!(
            channel = %channel,
            event = event.name(),
            recipients = targets.len(),
            "Sending event to group"
        );
        self.send_to_connections(targets, event).await;
    }

    /// 全接続へ送信（失敗はログのみ）
    pub async fn send_to_all(&self, event: &HubEvent) {
        if let Err(e) = self.pusher.broadcast_all(event).await {
            tracing::warn!(event = event.name(), "Failed to broadcast event: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::message_pusher::WebSocketMessagePusher;
    use tokio::sync::mpsc;

    fn router() -> BroadcastRouter {
        BroadcastRouter::new(Arc::new(WebSocketMessagePusher::new()))
    }

    fn channel(name: &str) -> ChannelName {
        ChannelName::new(name).unwrap()
    }

    fn connection_id(value: &str) -> ConnectionId {
        ConnectionId::new(value).unwrap()
    }

    #[test]
    fn test_add_and_remove_membership() {
        // テスト項目: グループへの追加・削除の結果が戻り値に反映される
        // given (前提条件):
        let router = router();
        let lobby = channel("lobby");

        // when (操作):
        let first_add = router.add_to_group(&lobby, connection_id("c1"));
        let second_add = router.add_to_group(&lobby, connection_id("c1"));
        let first_remove = router.remove_from_group(&lobby, &connection_id("c1"));
        let second_remove = router.remove_from_group(&lobby, &connection_id("c1"));

        // then (期待する結果):
        assert!(first_add);
        assert!(!second_add);
        assert!(first_remove);
        assert!(!second_remove);
        assert!(router.members(&lobby).is_empty());
    }

    #[test]
    fn test_groups_are_case_insensitive() {
        // テスト項目: チャンネル名の大文字小文字が違っても同じグループになる
        // given (前提条件):
        let router = router();
        router.add_to_group(&channel("Lobby"), connection_id("c1"));

        // when (操作):
        let contains = router.contains(&channel("LOBBY"), &connection_id("c1"));

        // then (期待する結果):
        assert!(contains);
    }

    #[test]
    fn test_replace_group_clears_stale_flag() {
        // テスト項目: 再構築するとメンバーが置き換わり stale マークが外れる
        // given (前提条件):
        let router = router();
        let lobby = channel("lobby");
        router.add_to_group(&lobby, connection_id("ghost"));
        router.mark_stale(&lobby);

        // when (操作):
        router.replace_group(&lobby, vec![connection_id("c2"), connection_id("c1")]);

        // then (期待する結果):
        assert!(!router.is_stale(&lobby));
        assert_eq!(
            router.members(&lobby),
            vec![connection_id("c1"), connection_id("c2")]
        );
    }

    #[tokio::test]
    async fn test_send_to_group_only_reaches_members() {
        // テスト項目: グループ宛ての送信はメンバーにだけ届く
        // given (前提条件):
        let pusher = Arc::new(WebSocketMessagePusher::new());
        let router = BroadcastRouter::new(pusher.clone());
        let (tx_member, mut rx_member) = mpsc::unbounded_channel();
        let (tx_other, mut rx_other) = mpsc::unbounded_channel();
        pusher.register_client(connection_id("c1"), tx_member).await;
        pusher.register_client(connection_id("c2"), tx_other).await;
        router.add_to_group(&channel("lobby"), connection_id("c1"));

        // when (操作):
        router
            .send_to_group(&channel("lobby"), &HubEvent::ChannelListUpdated)
            .await;

        // then (期待する結果):
        assert!(rx_member.recv().await.is_some());
        assert!(rx_other.try_recv().is_err());
    }
}
