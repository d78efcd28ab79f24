//! Leave と、チャンネル削除時の強制退出

use super::PresenceHub;
use crate::domain::{ChannelName, ConnectionId, HubEvent, Identity, RepositoryError};

impl PresenceHub {
    /// チャンネルから退出する
    ///
    /// 接続の現在のチャンネルが `channel` でなければ何もしない（重複・遅延した Leave）。
    pub async fn leave(
        &self,
        connection_id: &ConnectionId,
        channel: &ChannelName,
    ) -> Result<(), RepositoryError> {
        let _connection_guard = self.connection_locks.lock(connection_id.clone()).await;

        let Some(mut connection) = self.bounded(self.connections.get(connection_id)).await? else {
            tracing::debug!(connection_id = %connection_id, "Leave ignored: unknown connection");
            return Ok(());
        };
        let Some(current) = connection.channel.take() else {
            tracing::debug!(connection_id = %connection_id, "Leave ignored: not in a channel");
            return Ok(());
        };
        if &current != channel {
            tracing::debug!(
                connection_id = %connection_id,
                requested = %channel,
                current = %current,
                "Leave ignored: connection is in another channel"
            );
            return Ok(());
        }

        connection.last_activity = self.now();
        let identity = connection.identity.clone();
        self.bounded(self.connections.upsert(connection)).await?;
        tracing::info!(identity = %identity, channel = %current, "Left channel");
        self.leave_group(&identity, &current, connection_id).await;
        Ok(())
    }

    /// 削除されるチャンネルから全ての接続を退出させる
    ///
    /// `ChannelDeleted` をグループへ送ってから、チャンネルを指している行を全て解除し、
    /// グループを破棄する。Registry からの削除は呼び出し元が先に済ませておくこと。
    /// 走査より後に書き込んだ Join は、書き込み後の Registry 確認で自ら取り消す。
    pub async fn evacuate_channel(
        &self,
        channel: &ChannelName,
        actor: &Identity,
    ) -> Result<usize, RepositoryError> {
        let event = HubEvent::ChannelDeleted {
            channel: channel.clone(),
            actor: actor.clone(),
        };
        self.send_to_group(channel, &event).await;

        let rows = self
            .bounded(self.connections.list_by_channel(channel))
            .await?;
        let mut evacuated = 0;
        for row in rows {
            if self.force_leave(&row.id, channel).await? {
                evacuated += 1;
            }
        }
        self.router.remove_group(channel);
        tracing::info!(channel = %channel, evacuated, "Evacuated channel");
        Ok(evacuated)
    }

    async fn force_leave(
        &self,
        connection_id: &ConnectionId,
        channel: &ChannelName,
    ) -> Result<bool, RepositoryError> {
        let _connection_guard = self.connection_locks.lock(connection_id.clone()).await;

        let Some(mut connection) = self.bounded(self.connections.get(connection_id)).await? else {
            return Ok(false);
        };
        if !connection.is_in(channel) {
            return Ok(false);
        }
        connection.channel = None;
        self.bounded(self.connections.upsert(connection)).await?;
        self.router.remove_from_group(channel, connection_id);
        Ok(true)
    }
}
