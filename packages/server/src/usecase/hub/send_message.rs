//! チャンネルへの投稿

use super::PresenceHub;
use crate::{
    domain::{ChannelMessage, ChannelName, ConnectionId, HubEvent, Identity, MessageContent},
    usecase::error::SendMessageError,
};

impl PresenceHub {
    /// チャンネルへ投稿する
    ///
    /// ミュート中のチャンネルには作成者と特権 Identity しか投稿できない。
    /// 拒否した場合は呼び出し元にだけ `MessageBlocked` を送り、永続化もブロードキャストもしない。
    pub async fn send_message(
        &self,
        identity: &Identity,
        connection_id: &ConnectionId,
        channel: &ChannelName,
        content: MessageContent,
    ) -> Result<ChannelMessage, SendMessageError> {
        let Some(channel_row) = self.bounded(self.channels.get_channel(channel)).await? else {
            let event = HubEvent::ChannelNotFound {
                channel: channel.to_string(),
            };
            self.router.send_to_connection(connection_id, &event).await;
            return Err(SendMessageError::ChannelNotFound(channel.to_string()));
        };

        if channel_row.is_muted
            && !channel_row.is_creator(identity)
            && !self.is_privileged(identity, &channel_row.name).await
        {
            let reason = format!("Channel '{}' is muted", channel_row.name);
            tracing::info!(identity = %identity, channel = %channel_row.name, "Message blocked");
            let event = HubEvent::MessageBlocked {
                reason: reason.clone(),
            };
            self.router.send_to_connection(connection_id, &event).await;
            return Err(SendMessageError::Blocked(reason));
        }

        self.touch(connection_id).await;

        let message = self
            .bounded(self.messages.append_channel_message(
                channel_row.name.clone(),
                identity.clone(),
                content,
                self.now(),
            ))
            .await?;
        tracing::debug!(
            identity = %identity,
            channel = %channel_row.name,
            message_id = message.id.value(),
            "Message persisted"
        );

        let event = HubEvent::ReceiveMessage {
            message: message.clone(),
        };
        self.send_to_group(&channel_row.name, &event).await;
        Ok(message)
    }

    /// 接続の最終アクティビティを更新する（行がなければ何もしない）
    pub(crate) async fn touch(&self, connection_id: &ConnectionId) {
        let _connection_guard = self.connection_locks.lock(connection_id.clone()).await;

        let result = match self.bounded(self.connections.get(connection_id)).await {
            Ok(Some(mut connection)) => {
                connection.last_activity = self.now();
                self.bounded(self.connections.upsert(connection)).await
            }
            Ok(None) => Ok(()),
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            tracing::warn!(connection_id = %connection_id, "Failed to refresh activity: {}", e);
        }
    }
}
