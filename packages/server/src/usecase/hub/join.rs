//! Join

use super::PresenceHub;
use crate::{
    domain::{ChannelName, Connection, ConnectionId, HubEvent, Identity},
    usecase::error::JoinError,
};

impl PresenceHub {
    /// 接続をチャンネルに参加させる
    ///
    /// - チャンネルが存在しなければ呼び出し元にだけ `ChannelNotFound` を送り、何も変更しない
    /// - 別のチャンネルにいた場合は、そちらの退出（グループ除去・通知）を終えてから参加する
    /// - 既に同じチャンネルにいる場合は活動時刻の更新と、呼び出し元への現状通知だけ行う
    pub async fn join(
        &self,
        identity: &Identity,
        channel: &ChannelName,
        connection_id: &ConnectionId,
    ) -> Result<(), JoinError> {
        let _identity_guard = self.identity_locks.lock(identity.clone()).await;
        let _connection_guard = self.connection_locks.lock(connection_id.clone()).await;
        if self.is_retired(connection_id) {
            tracing::debug!(connection_id = %connection_id, "Join ignored: connection already closed");
            return Ok(());
        }

        let Some(channel_row) = self.bounded(self.channels.get_channel(channel)).await? else {
            tracing::info!(
                identity = %identity,
                channel = %channel,
                "Join rejected: channel not found"
            );
            let event = HubEvent::ChannelNotFound {
                channel: channel.to_string(),
            };
            self.router.send_to_connection(connection_id, &event).await;
            return Err(JoinError::ChannelNotFound(channel.to_string()));
        };
        let target = channel_row.name.clone();

        let now = self.now();
        let (mut connection, created) = match self
            .bounded(self.connections.get(connection_id))
            .await?
        {
            Some(existing) => (existing, false),
            None => (
                Connection::new(
                    connection_id.clone(),
                    identity.clone(),
                    now,
                    self.config.instance_id.clone(),
                ),
                true,
            ),
        };
        let member = connection.identity.clone();

        if connection.is_in(&target) {
            connection.last_activity = now;
            self.bounded(self.connections.upsert(connection)).await?;
            if self.router.add_to_group(&target, connection_id.clone()) {
                tracing::error!(
                    channel = %target,
                    connection_id = %connection_id,
                    "Connection was missing from its channel group"
                );
                self.router.mark_stale(&target);
            }
            self.send_channel_state_to(connection_id, &channel_row).await;
            return Ok(());
        }

        if let Some(previous) = connection.channel.take() {
            connection.last_activity = now;
            self.bounded(self.connections.upsert(connection.clone()))
                .await?;
            tracing::info!(
                identity = %member,
                from = %previous,
                to = %target,
                "Switching channel"
            );
            self.leave_group(&member, &previous, connection_id).await;
        }

        connection.channel = Some(target.clone());
        connection.last_activity = now;
        self.bounded(self.connections.upsert(connection.clone()))
            .await?;
        self.enter_group(&target, connection_id);

        // 削除は Registry → 退出走査の順。走査に漏れた Join はここで取り消す
        if !self.bounded(self.channels.exists(&target)).await? {
            connection.channel = None;
            self.bounded(self.connections.upsert(connection)).await?;
            self.router.remove_from_group(&target, connection_id);
            tracing::info!(
                identity = %member,
                channel = %target,
                "Join rolled back: channel was deleted"
            );
            if created {
                self.announce_online_if_first(&member, connection_id).await;
            }
            let event = HubEvent::ChannelNotFound {
                channel: target.to_string(),
            };
            self.router.send_to_connection(connection_id, &event).await;
            return Err(JoinError::ChannelNotFound(target.to_string()));
        }
        tracing::info!(identity = %member, channel = %target, "Joined channel");

        if created {
            self.announce_online_if_first(&member, connection_id).await;
        }

        let joined = HubEvent::UserJoined {
            identity: member,
            channel: target.clone(),
        };
        self.send_to_group(&target, &joined).await;
        self.broadcast_roster(&target).await;
        let mute_status = HubEvent::ChannelMuteStatusChanged {
            channel: target.clone(),
            muted: channel_row.is_muted,
        };
        self.send_to_group(&target, &mute_status).await;
        Ok(())
    }
}
