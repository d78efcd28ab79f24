//! Connection Reaper
//!
//! 一定間隔で Presence Store を走査し、最終アクティビティがタイムアウトを超えた
//! このインスタンス所有の接続を強制切断する。
//!
//! - 走査は毎回新しいスナップショットで行い、長いトランザクションは持たない
//! - 削除の可否は行ごとにロックを取ってから判定し直す（走査後の Ping・切断に負けない）
//! - 1 行の失敗は再試行のうえログに残して次の行へ進む
//! - キャンセルは行と行の間でだけ効く

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{
    domain::ConnectionRepository,
    usecase::{background::spawn_periodic, hub::PresenceHub, retry::with_retry},
};

/// 1 回の走査の結果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReapReport {
    /// 走査した行の数
    pub scanned: usize,
    /// 強制切断した数
    pub evicted: usize,
    /// 再試行しても失敗した数
    pub failed: usize,
}

pub struct ConnectionReaper {
    hub: Arc<PresenceHub>,
    connections: Arc<dyn ConnectionRepository>,
}

impl ConnectionReaper {
    pub fn new(hub: Arc<PresenceHub>, connections: Arc<dyn ConnectionRepository>) -> Self {
        Self { hub, connections }
    }

    /// 周期実行を開始する
    pub fn spawn(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let period = self.hub.config().reaper_interval;
        let token = cancel.clone();
        spawn_periodic("connection-reaper", period, cancel, move || {
            let reaper = Arc::clone(&self);
            let token = token.clone();
            async move {
                reaper.sweep(&token).await;
            }
        })
    }

    /// 1 回分の走査
    pub async fn sweep(&self, cancel: &CancellationToken) -> ReapReport {
        let config = self.hub.config();
        let timeout_millis = config.connection_timeout_millis();
        let mut report = ReapReport::default();

        let snapshot = match with_retry("list connections", config.max_retries, config.retry_backoff, || {
            self.hub.bounded(self.connections.list_all())
        })
        .await
        {
            Ok(rows) => rows,
            Err(e) => {
                tracing::error!("Reaper could not load connections: {}", e);
                return report;
            }
        };

        let now = self.hub.now();
        for row in snapshot {
            if cancel.is_cancelled() {
                tracing::info!("Reaper sweep cancelled");
                break;
            }
            report.scanned += 1;
            if row.owner_instance != config.instance_id
                || !row.last_activity.is_older_than(now, timeout_millis)
            {
                continue;
            }

            match with_retry("evict connection", config.max_retries, config.retry_backoff, || {
                self.hub.evict_if_stale(&row.id, timeout_millis)
            })
            .await
            {
                Ok(true) => report.evicted += 1,
                Ok(false) => {
                    tracing::debug!(connection_id = %row.id, "Connection was refreshed or already gone");
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(connection_id = %row.id, "Failed to evict connection: {}", e);
                }
            }
        }

        if report.evicted > 0 || report.failed > 0 {
            tracing::info!(
                scanned = report.scanned,
                evicted = report.evicted,
                failed = report.failed,
                "Reaper sweep finished"
            );
        }
        report
    }
}
