//! Hub の実行時設定

use std::time::Duration;

/// Reaper / Sentinel の周期やタイムアウトなど、コアが参照する設定値
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubConfig {
    /// このプロセスの識別子（Presence Store の owner_instance）
    pub instance_id: String,
    /// Reaper の実行間隔
    pub reaper_interval: Duration,
    /// 最終アクティビティからこの時間を超えた接続は stale
    pub connection_timeout: Duration,
    /// Sentinel の実行間隔
    pub sentinel_interval: Duration,
    /// マネージャーの接続がこの時間活動していなければ不在とみなす
    pub manager_inactivity_timeout: Duration,
    /// ストア操作 1 回あたりの上限時間
    pub store_timeout: Duration,
    /// バックグラウンド処理での一時的なエラーの再試行回数
    pub max_retries: u32,
    /// 再試行の間隔（試行ごとに線形に伸びる）
    pub retry_backoff: Duration,
}

impl HubConfig {
    pub fn connection_timeout_millis(&self) -> i64 {
        duration_millis(self.connection_timeout)
    }

    pub fn manager_inactivity_millis(&self) -> i64 {
        duration_millis(self.manager_inactivity_timeout)
    }
}

fn duration_millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            instance_id: "default".to_string(),
            reaper_interval: Duration::from_secs(30),
            connection_timeout: Duration::from_secs(120),
            sentinel_interval: Duration::from_secs(60),
            manager_inactivity_timeout: Duration::from_secs(120),
            store_timeout: Duration::from_secs(2),
            max_retries: 3,
            retry_backoff: Duration::from_millis(50),
        }
    }
}
