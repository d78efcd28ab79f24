//! Ping

use super::PresenceHub;
use crate::domain::{Connection, ConnectionId, Identity, RepositoryError};

impl PresenceHub {
    /// 接続の生存を記録する
    ///
    /// 行がなければチャンネル未参加で作成し、Identity の最初の接続ならオンライン通知を送る。
    pub async fn ping(
        &self,
        identity: &Identity,
        connection_id: &ConnectionId,
    ) -> Result<(), RepositoryError> {
        let _identity_guard = self.identity_locks.lock(identity.clone()).await;
        let _connection_guard = self.connection_locks.lock(connection_id.clone()).await;
        if self.is_retired(connection_id) {
            tracing::debug!(connection_id = %connection_id, "Ping ignored: connection already closed");
            return Ok(());
        }

        let now = self.now();
        match self.bounded(self.connections.get(connection_id)).await? {
            Some(mut connection) => {
                connection.last_activity = now;
                self.bounded(self.connections.upsert(connection)).await?;
                tracing::trace!(connection_id = %connection_id, "Ping");
            }
            None => {
                let connection = Connection::new(
                    connection_id.clone(),
                    identity.clone(),
                    now,
                    self.config.instance_id.clone(),
                );
                self.bounded(self.connections.upsert(connection)).await?;
                tracing::info!(identity = %identity, connection_id = %connection_id, "Connection registered");
                self.announce_online_if_first(identity, connection_id).await;
            }
        }
        Ok(())
    }
}
