//! InMemory Connection Repository 実装（Presence Store）
//!
//! ドメイン層が定義する ConnectionRepository trait の具体的な実装。
//! HashMap をインメモリ DB として使用します。
//! 複数インスタンス構成では共有ストア（RDB など）に差し替える前提です。

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{
    ChannelName, Connection, ConnectionId, ConnectionRepository, Identity, RepositoryError,
    Timestamp,
};

/// インメモリ Presence Store
#[derive(Default)]
pub struct InMemoryConnectionRepository {
    /// Key: ConnectionId
    connections: Mutex<HashMap<ConnectionId, Connection>>,
}

impl InMemoryConnectionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConnectionRepository for InMemoryConnectionRepository {
    async fn get(&self, id: &ConnectionId) -> Result<Option<Connection>, RepositoryError> {
        let connections = self.connections.lock().await;
        Ok(connections.get(id).cloned())
    }

    async fn upsert(&self, connection: Connection) -> Result<(), RepositoryError> {
        let mut connections = self.connections.lock().await;
        connections.insert(connection.id.clone(), connection);
        Ok(())
    }

    async fn remove(&self, id: &ConnectionId) -> Result<Option<Connection>, RepositoryError> {
        let mut connections = self.connections.lock().await;
        Ok(connections.remove(id))
    }

    async fn list_all(&self) -> Result<Vec<Connection>, RepositoryError> {
        let connections = self.connections.lock().await;
        Ok(connections.values().cloned().collect())
    }

    async fn list_by_channel(
        &self,
        channel: &ChannelName,
    ) -> Result<Vec<Connection>, RepositoryError> {
        let connections = self.connections.lock().await;
        Ok(connections
            .values()
            .filter(|c| c.is_in(channel))
            .cloned()
            .collect())
    }

    async fn list_by_identity(
        &self,
        identity: &Identity,
    ) -> Result<Vec<Connection>, RepositoryError> {
        let connections = self.connections.lock().await;
        Ok(connections
            .values()
            .filter(|c| &c.identity == identity)
            .cloned()
            .collect())
    }

    async fn has_active_connection(
        &self,
        identity: &Identity,
        active_since: Timestamp,
    ) -> Result<bool, RepositoryError> {
        let connections = self.connections.lock().await;
        Ok(connections
            .values()
            .any(|c| &c.identity == identity && c.last_activity >= active_since))
    }
}
