//! 周期実行するバックグラウンドタスク
//!
//! 1 回分の処理（tick）はそれぞれ別タスクで実行し、tick が panic しても
//! ループ自体は止めない。停止は `CancellationToken` で行う。

use std::{future::Future, time::Duration};

use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// `period` ごとに `tick` を実行するタスクを起動する
///
/// 最初の tick は起動から `period` 経過後。前の tick が長引いた場合、
/// 取りこぼした周期はまとめて実行せずに読み飛ばす。
pub fn spawn_periodic<F, Fut>(
    name: &'static str,
    period: Duration,
    cancel: CancellationToken,
    tick: F,
) -> JoinHandle<()>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        interval.tick().await;
        tracing::info!(task = name, period_ms = period.as_millis() as u64, "Background task started");

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {}
            }

            match tokio::spawn(tick()).await {
                Ok(()) => {}
                Err(e) if e.is_panic() => {
                    tracing::error!(task = name, "Tick panicked, continuing with the next one");
                }
                Err(e) => {
                    tracing::warn!(task = name, "Tick was cancelled: {}", e);
                }
            }
        }

        tracing::info!(task = name, "Background task stopped");
    })
}
