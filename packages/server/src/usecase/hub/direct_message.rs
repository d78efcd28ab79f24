//! ダイレクトメッセージ

use std::collections::HashMap;

use super::PresenceHub;
use crate::domain::{
    ConnectionId, DirectMessage, HubEvent, Identity, MessageContent, MessageId, RepositoryError,
};

impl PresenceHub {
    /// ダイレクトメッセージを送る
    ///
    /// 永続化したうえで、宛先 Identity の全ての接続と送信元の接続に通知する。
    /// 宛先に接続がなければ通知はせず、未読のまま後で受け取れる。
    pub async fn send_direct(
        &self,
        from: &Identity,
        from_connection: &ConnectionId,
        to: &Identity,
        content: MessageContent,
    ) -> Result<DirectMessage, RepositoryError> {
        self.touch(from_connection).await;

        let message = self
            .bounded(self.messages.append_direct_message(
                from.clone(),
                to.clone(),
                content,
                self.now(),
            ))
            .await?;

        let recipients: Vec<ConnectionId> = self
            .bounded(self.connections.list_by_identity(to))
            .await?
            .into_iter()
            .map(|c| c.id)
            .collect();
        tracing::debug!(
            from = %from,
            to = %to,
            message_id = message.id.value(),
            recipients = recipients.len(),
            "Direct message persisted"
        );

        let received = HubEvent::ReceivePrivateMessage {
            message: message.clone(),
        };
        self.router.send_to_connections(recipients, &received).await;
        let sent = HubEvent::PrivateMessageSent {
            message: message.clone(),
        };
        self.router.send_to_connection(from_connection, &sent).await;
        Ok(message)
    }

    /// `reader` 宛てのメッセージを既読にし、送信元の接続へ既読通知を送る
    ///
    /// 今回既読になったメッセージの ID を返す。
    pub async fn mark_read(
        &self,
        reader: &Identity,
        ids: &[MessageId],
    ) -> Result<Vec<MessageId>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let marked = self
            .bounded(self.messages.mark_direct_read(reader, ids))
            .await?;

        let mut by_sender: HashMap<Identity, Vec<MessageId>> = HashMap::new();
        for message in &marked {
            by_sender
                .entry(message.from.clone())
                .or_default()
                .push(message.id);
        }

        for (sender, ids) in by_sender {
            let targets: Vec<ConnectionId> = match self
                .bounded(self.connections.list_by_identity(&sender))
                .await
            {
                Ok(rows) => rows.into_iter().map(|c| c.id).collect(),
                Err(e) => {
                    tracing::warn!(sender = %sender, "Skipped read receipt: {}", e);
                    continue;
                }
            };
            let event = HubEvent::PrivateMessagesRead {
                reader: reader.clone(),
                ids,
            };
            self.router.send_to_connections(targets, &event).await;
        }

        Ok(marked.into_iter().map(|m| m.id).collect())
    }

    /// 未読のダイレクトメッセージを接続へ届ける（接続直後に呼ぶ）
    pub async fn deliver_pending_direct(
        &self,
        identity: &Identity,
        connection_id: &ConnectionId,
    ) -> Result<usize, RepositoryError> {
        let pending = self
            .bounded(self.messages.unread_direct_messages(identity))
            .await?;
        let count = pending.len();
        for message in pending {
            let event = HubEvent::ReceivePrivateMessage { message };
            self.router.send_to_connection(connection_id, &event).await;
        }
        if count > 0 {
            tracing::info!(identity = %identity, count, "Delivered pending direct messages");
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use crate::domain::{MessageContent, MessageId, MessageRepository};

    fn content(text: &str) -> MessageContent {
        MessageContent::new(text.to_string()).unwrap()
    }

    #[tokio::test]
    async fn test_direct_message_reaches_every_recipient_connection() {
        // テスト項目: 宛先 Identity の全接続に届き、送信元の接続には送信済み通知が届く
        // given (前提条件):
        let fixture = HubFixture::new();
        let mut sender = fixture.connect("c1").await;
        let mut phone = fixture.connect("c2").await;
        let mut laptop = fixture.connect("c3").await;
        let hub = &fixture.hub;
        hub.ping(&identity("alice"), &sender.id).await.unwrap();
        hub.ping(&identity("bob"), &phone.id).await.unwrap();
        hub.ping(&identity("bob"), &laptop.id).await.unwrap();
        sender.drain();
        phone.drain();
        laptop.drain();

        // when (操作):
        hub.send_direct(&identity("alice"), &sender.id, &identity("Bob"), content("psst"))
            .await
            .unwrap();

        // then (期待する結果):
        for client in [&mut phone, &mut laptop] {
            let frames = client.drain();
            assert_eq!(frames.len(), 1);
            assert_eq!(frames[0]["type"], "receive-private-message");
            assert_eq!(frames[0]["message"]["content"], "psst");
        }
        assert_eq!(sender.drain_types(), vec!["private-message-sent"]);
    }

    #[tokio::test]
    async fn test_direct_message_to_offline_identity_is_queued() {
        // テスト項目: 宛先に接続がなくてもエラーにならず、未読として後で配達される
        // given (前提条件):
        let fixture = HubFixture::new();
        let mut sender = fixture.connect("c1").await;
        fixture.hub.ping(&identity("alice"), &sender.id).await.unwrap();
        sender.drain();

        // when (操作):
        let result = fixture
            .hub
            .send_direct(&identity("alice"), &sender.id, &identity("bob"), content("later"))
            .await;
        let mut bob = fixture.connect("c2").await;
        let delivered = fixture
            .hub
            .deliver_pending_direct(&identity("bob"), &bob.id)
            .await
            .unwrap();

        // then (期待する結果):
        assert!(result.is_ok());
        assert_eq!(delivered, 1);
        assert_eq!(bob.drain_types(), vec!["receive-private-message"]);
    }

    #[tokio::test]
    async fn test_mark_read_notifies_original_sender() {
        // テスト項目: 既読にすると送信元の接続に既読通知が届き、二度目は何も起きない
        // given (前提条件):
        let fixture = HubFixture::new();
        let mut alice = fixture.connect("c1").await;
        let bob = fixture.connect("c2").await;
        let hub = &fixture.hub;
        hub.ping(&identity("alice"), &alice.id).await.unwrap();
        hub.ping(&identity("bob"), &bob.id).await.unwrap();
        let message = hub
            .send_direct(&identity("alice"), &alice.id, &identity("bob"), content("hi"))
            .await
            .unwrap();
        alice.drain();

        // when (操作):
        let first = hub.mark_read(&identity("bob"), &[message.id]).await.unwrap();
        let second = hub.mark_read(&identity("bob"), &[message.id]).await.unwrap();

        // then (期待する結果):
        assert_eq!(first, vec![message.id]);
        assert!(second.is_empty());
        let frames = alice.drain();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0]["type"], "private-messages-read");
        assert_eq!(frames[0]["reader"], "bob");
        assert_eq!(frames[0]["ids"], serde_json::json!([message.id.value()]));
        let unread = fixture
            .messages
            .unread_direct_messages(&identity("bob"))
            .await
            .unwrap();
        assert!(unread.is_empty());
    }

    #[tokio::test]
    async fn test_mark_read_ignores_messages_for_someone_else() {
        // テスト項目: 他人宛てのメッセージは既読にできない
        // given (前提条件):
        let fixture = HubFixture::new();
        let alice = fixture.connect("c1").await;
        let message = fixture
            .hub
            .send_direct(&identity("alice"), &alice.id, &identity("bob"), content("hi"))
            .await
            .unwrap();

        // when (操作):
        let marked = fixture
            .hub
            .mark_read(&identity("mallory"), &[message.id, MessageId::new(999)])
            .await
            .unwrap();

        // then (期待する結果):
        assert!(marked.is_empty());
    }
}
