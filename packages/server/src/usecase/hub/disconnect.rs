//! Disconnect と Reaper による強制切断

use super::PresenceHub;
use crate::domain::{Connection, ConnectionId, HubEvent, RepositoryError};

/// 行を読み直しても Identity が変わり続ける場合の上限
const MAX_IDENTITY_RELOCKS: usize = 3;

impl PresenceHub {
    /// 接続を削除する
    ///
    /// 行を削除できた場合 `true`。既に存在しない行は何もせず `false`（冪等）。
    pub async fn disconnect(&self, connection_id: &ConnectionId) -> Result<bool, RepositoryError> {
        self.remove_connection_where(connection_id, |_| true).await
    }

    /// 削除する時点で `timeout_millis` より古いままなら強制切断する
    ///
    /// 走査から削除までの間に Ping が届いた行や、既に切断された行は対象外。
    pub async fn evict_if_stale(
        &self,
        connection_id: &ConnectionId,
        timeout_millis: i64,
    ) -> Result<bool, RepositoryError> {
        let evicted = self
            .remove_connection_where(connection_id, |row| {
                row.owner_instance == self.config.instance_id
                    && row.last_activity.is_older_than(self.now(), timeout_millis)
            })
            .await?;
        if evicted {
            tracing::info!(connection_id = %connection_id, "Evicted stale connection");
        }
        Ok(evicted)
    }

    /// Identity → ConnectionId の順でロックを取り、`predicate` を満たす行を削除する
    ///
    /// Identity は行からしか分からないので、ロック前に一度読み、ロック後に読み直して
    /// Identity が変わっていないことを確かめる。
    async fn remove_connection_where<P>(
        &self,
        connection_id: &ConnectionId,
        predicate: P,
    ) -> Result<bool, RepositoryError>
    where
        P: Fn(&Connection) -> bool,
    {
        for _ in 0..MAX_IDENTITY_RELOCKS {
            let Some(snapshot) = self.bounded(self.connections.get(connection_id)).await? else {
                return Ok(false);
            };
            let _identity_guard = self.identity_locks.lock(snapshot.identity.clone()).await;
            let _connection_guard = self.connection_locks.lock(connection_id.clone()).await;

            let Some(current) = self.bounded(self.connections.get(connection_id)).await? else {
                return Ok(false);
            };
            if current.identity.key() != snapshot.identity.key() {
                continue;
            }
            if !predicate(&current) {
                return Ok(false);
            }

            self.bounded(self.connections.remove(connection_id)).await?;
            self.retired.insert(connection_id.clone());
            self.router.pusher().unregister_client(connection_id).await;
            tracing::info!(
                identity = %current.identity,
                connection_id = %connection_id,
                "Connection removed"
            );

            if let Some(channel) = &current.channel {
                self.leave_group(&current.identity, channel, connection_id)
                    .await;
            }
            self.announce_offline_if_last(&current).await;
            return Ok(true);
        }

        tracing::warn!(
            connection_id = %connection_id,
            "Gave up removing connection: identity kept changing"
        );
        Ok(false)
    }

    /// Identity の接続が残っていなければオフライン通知を全体へ送る
    async fn announce_offline_if_last(&self, removed: &Connection) {
        match self
            .bounded(self.connections.list_by_identity(&removed.identity))
            .await
        {
            Ok(rows) if rows.is_empty() => {
                tracing::info!(identity = %removed.identity, "User is offline");
                let event = HubEvent::UserStatusChanged {
                    identity: removed.identity.clone(),
                    online: false,
                };
                self.router.send_to_all(&event).await;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::error!(
                    identity = %removed.identity,
                    "Skipped offline notice: {}",
                    e
                );
            }
        }
    }
}
