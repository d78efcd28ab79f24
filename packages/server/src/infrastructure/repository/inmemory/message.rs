//! InMemory Message Repository 実装
//!
//! チャンネルの投稿履歴と、ダイレクトメッセージのキュー（既読フラグ付き）を保持します。

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{
    ChannelMessage, ChannelName, DirectMessage, Identity, MessageContent, MessageId,
    MessageRepository, RepositoryError, Timestamp,
};

/// チャンネルごとに保持する履歴の上限
pub const DEFAULT_HISTORY_CAPACITY: usize = 500;

#[derive(Default)]
struct MessageTables {
    next_id: u64,
    channel_messages: HashMap<ChannelName, VecDeque<ChannelMessage>>,
    direct_messages: Vec<DirectMessage>,
}

impl MessageTables {
    fn allocate_id(&mut self) -> MessageId {
        self.next_id += 1;
        MessageId::new(self.next_id)
    }
}

/// インメモリ Message Repository
pub struct InMemoryMessageRepository {
    tables: Mutex<MessageTables>,
    history_capacity: usize,
}

impl InMemoryMessageRepository {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_CAPACITY)
    }

    /// チャンネル履歴の上限を指定して作成（古いものから捨てる）
    pub fn with_capacity(history_capacity: usize) -> Self {
        Self {
            tables: Mutex::new(MessageTables::default()),
            history_capacity,
        }
    }
}

impl Default for InMemoryMessageRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageRepository for InMemoryMessageRepository {
    async fn append_channel_message(
        &self,
        channel: ChannelName,
        from: Identity,
        content: MessageContent,
        timestamp: Timestamp,
    ) -> Result<ChannelMessage, RepositoryError> {
        let mut tables = self.tables.lock().await;
        let message = ChannelMessage {
            id: tables.allocate_id(),
            channel: channel.clone(),
            from,
            content,
            timestamp,
        };
        let history = tables.channel_messages.entry(channel).or_default();
        history.push_back(message.clone());
        while history.len() > self.history_capacity {
            history.pop_front();
        }
        Ok(message)
    }

    async fn append_direct_message(
        &self,
        from: Identity,
        to: Identity,
        content: MessageContent,
        timestamp: Timestamp,
    ) -> Result<DirectMessage, RepositoryError> {
        let mut tables = self.tables.lock().await;
        let message = DirectMessage {
            id: tables.allocate_id(),
            from,
            to,
            content,
            timestamp,
            is_read: false,
        };
        tables.direct_messages.push(message.clone());
        Ok(message)
    }

    async fn mark_direct_read(
        &self,
        reader: &Identity,
        ids: &[MessageId],
    ) -> Result<Vec<DirectMessage>, RepositoryError> {
        let mut tables = self.tables.lock().await;
        let mut marked = Vec::new();
        for message in tables
            .direct_messages
            .iter_mut()
            .filter(|m| &m.to == reader && !m.is_read && ids.contains(&m.id))
        {
            message.is_read = true;
            marked.push(message.clone());
        }
        Ok(marked)
    }

    async fn recent_channel_messages(
        &self,
        channel: &ChannelName,
        limit: usize,
    ) -> Result<Vec<ChannelMessage>, RepositoryError> {
        let tables = self.tables.lock().await;
        let Some(history) = tables.channel_messages.get(channel) else {
            return Ok(Vec::new());
        };
        let skip = history.len().saturating_sub(limit);
        Ok(history.iter().skip(skip).cloned().collect())
    }

    async fn unread_direct_messages(
        &self,
        recipient: &Identity,
    ) -> Result<Vec<DirectMessage>, RepositoryError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .direct_messages
            .iter()
            .filter(|m| &m.to == recipient && !m.is_read)
            .cloned()
            .collect())
    }
}
