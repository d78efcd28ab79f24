//! Auto-Mute Sentinel
//!
//! 一定間隔でミュートされていないチャンネルを調べ、実質的なマネージャー
//! （`active_manager`、未設定なら作成者）に活動中の接続がなければミュートする。
//!
//! - ミュートを解除することはない
//! - ミュートは compare-and-set で行うので、手動のミュート操作と競合しても通知は 1 回
//! - チャンネルの評価は互いに独立で、1 つの失敗が他を止めない
//! - グループには送信するだけで、メンバーを変更しない（stale なら宛先は Presence Store から読む）

use std::sync::Arc;

use hiroba_shared::time::Clock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{
    config::HubConfig,
    domain::{
        Channel, ChannelName, ChannelRepository, ConnectionId, ConnectionRepository, HubEvent,
        RepositoryError, Timestamp,
    },
    infrastructure::BroadcastRouter,
    usecase::{
        background::spawn_periodic,
        retry::{bounded, with_retry},
    },
};

/// 1 回の走査の結果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SentinelReport {
    /// 評価したチャンネルの数
    pub inspected: usize,
    /// ミュートしたチャンネルの数
    pub muted: usize,
    /// 再試行しても評価できなかったチャンネルの数
    pub failed: usize,
}

pub struct AutoMuteSentinel {
    channels: Arc<dyn ChannelRepository>,
    connections: Arc<dyn ConnectionRepository>,
    router: Arc<BroadcastRouter>,
    clock: Arc<dyn Clock>,
    config: HubConfig,
}

impl AutoMuteSentinel {
    pub fn new(
        channels: Arc<dyn ChannelRepository>,
        connections: Arc<dyn ConnectionRepository>,
        router: Arc<BroadcastRouter>,
        clock: Arc<dyn Clock>,
        config: HubConfig,
    ) -> Self {
        Self {
            channels,
            connections,
            router,
            clock,
            config,
        }
    }

    /// 周期実行を開始する
    pub fn spawn(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let period = self.config.sentinel_interval;
        let token = cancel.clone();
        spawn_periodic("auto-mute-sentinel", period, cancel, move || {
            let sentinel = Arc::clone(&self);
            let token = token.clone();
            async move {
                sentinel.sweep(&token).await;
            }
        })
    }

    /// 1 回分の走査
    pub async fn sweep(&self, cancel: &CancellationToken) -> SentinelReport {
        let mut report = SentinelReport::default();

        let candidates = match with_retry(
            "list unmuted channels",
            self.config.max_retries,
            self.config.retry_backoff,
            || bounded(self.config.store_timeout, self.channels.list_unmuted()),
        )
        .await
        {
            Ok(channels) => channels,
            Err(e) => {
                tracing::error!("Sentinel could not load channels: {}", e);
                return report;
            }
        };

        for channel in candidates {
            if cancel.is_cancelled() {
                tracing::info!("Sentinel sweep cancelled");
                break;
            }
            report.inspected += 1;

            match with_retry(
                "evaluate channel",
                self.config.max_retries,
                self.config.retry_backoff,
                || self.evaluate(&channel),
            )
            .await
            {
                Ok(true) => report.muted += 1,
                Ok(false) => {}
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(channel = %channel.name, "Failed to evaluate channel: {}", e);
                }
            }
        }

        if report.muted > 0 || report.failed > 0 {
            tracing::info!(
                inspected = report.inspected,
                muted = report.muted,
                failed = report.failed,
                "Sentinel sweep finished"
            );
        }
        report
    }

    /// マネージャーが不在ならミュートし、実際にミュートした場合 `true`
    async fn evaluate(&self, channel: &Channel) -> Result<bool, RepositoryError> {
        let manager = channel.effective_manager();
        let now = self.clock.now_jst_millis();
        let active_since = Timestamp::new(now.saturating_sub(self.config.manager_inactivity_millis()));

        let present = bounded(
            self.config.store_timeout,
            self.connections.has_active_connection(manager, active_since),
        )
        .await?;
        if present {
            return Ok(false);
        }

        let muted = bounded(
            self.config.store_timeout,
            self.channels.mute_if_unmuted(&channel.name),
        )
        .await?;
        if muted {
            tracing::info!(channel = %channel.name, manager = %manager, "Auto-muted unattended channel");
            self.notify_muted(&channel.name).await;
        }
        Ok(muted)
    }

    /// ミュート通知を送る
    ///
    /// stale なグループはメンバーが信用できないので、グループを書き換えずに
    /// Presence Store からこのインスタンスの接続を読んで宛先にする。
    async fn notify_muted(&self, name: &ChannelName) {
        let event = HubEvent::ChannelMuteStatusChanged {
            channel: name.clone(),
            muted: true,
        };
        if !self.router.is_stale(name) {
            self.router.send_to_group(name, &event).await;
            return;
        }

        match bounded(self.config.store_timeout, self.connections.list_by_channel(name)).await {
            Ok(rows) => {
                let targets: Vec<ConnectionId> = rows
                    .into_iter()
                    .filter(|c| c.owner_instance == self.config.instance_id)
                    .map(|c| c.id)
                    .collect();
                self.router.send_to_connections(targets, &event).await;
            }
            Err(e) => {
                tracing::warn!(channel = %name, "Stale group, sending mute notice to cached members: {}", e);
                self.router.send_to_group(name, &event).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    // テスト作業記録
    // - ストアの一時的な失敗は MockChannelRepository で再現する
    // - 時刻は ManualClock で進める

    use super::*;
    use crate::{
        domain::{ChannelName, Identity, repository::MockChannelRepository},
        usecase::hub::test_support::*,
    };

    fn sentinel(fixture: &HubFixture) -> AutoMuteSentinel {
        AutoMuteSentinel::new(
            fixture.channels.clone(),
            fixture.connections.clone(),
            fixture.router.clone(),
            fixture.clock.clone(),
            test_config(),
        )
    }

    #[tokio::test]
    async fn test_creator_leaving_mutes_channel_exactly_once() {
        // テスト項目: 作成者が切断した後の tick でミュートされ、次の tick では何も起きない
        // given (前提条件):
        let fixture = HubFixture::new();
        fixture.create_channel("general", "alice").await;
        let alice = fixture.connect("c1").await;
        let mut member = fixture.connect("c2").await;
        fixture.hub.ping(&identity("alice"), &alice.id).await.unwrap();
        fixture
            .hub
            .join(&identity("bob"), &channel("general"), &member.id)
            .await
            .unwrap();
        fixture.hub.disconnect(&alice.id).await.unwrap();
        member.drain();
        let sentinel = sentinel(&fixture);

        // when (操作):
        let first = sentinel.sweep(&CancellationToken::new()).await;
        let first_frames = member.drain();
        let second = sentinel.sweep(&CancellationToken::new()).await;

        // then (期待する結果):
        assert_eq!(first.muted, 1);
        assert_eq!(first_frames.len(), 1);
        assert_eq!(first_frames[0]["type"], "channel-mute-status-changed");
        assert_eq!(first_frames[0]["channel"], "general");
        assert_eq!(first_frames[0]["muted"], true);
        assert_eq!(second, SentinelReport::default());
        assert!(member.drain().is_empty());
        let row = fixture.channels.get_channel(&channel("general")).await.unwrap().unwrap();
        assert!(row.is_muted);
    }

    #[tokio::test]
    async fn test_present_manager_keeps_channel_unmuted() {
        // テスト項目: マネージャーに活動中の接続があればミュートしない
        // given (前提条件):
        let fixture = HubFixture::new();
        fixture.create_channel("general", "alice").await;
        let alice = fixture.connect("c1").await;
        fixture.hub.ping(&identity("Alice"), &alice.id).await.unwrap();

        // when (操作):
        let report = sentinel(&fixture).sweep(&CancellationToken::new()).await;

        // then (期待する結果):
        assert_eq!(report, SentinelReport { inspected: 1, muted: 0, failed: 0 });
    }

    #[tokio::test]
    async fn test_idle_manager_counts_as_absent() {
        // テスト項目: マネージャーの接続が無活動時間を超えていれば不在とみなす
        // given (前提条件):
        let fixture = HubFixture::new();
        fixture.create_channel("general", "alice").await;
        let alice = fixture.connect("c1").await;
        fixture.hub.ping(&identity("alice"), &alice.id).await.unwrap();
        fixture
            .clock
            .advance(test_config().manager_inactivity_millis() + 1);

        // when (操作):
        let report = sentinel(&fixture).sweep(&CancellationToken::new()).await;

        // then (期待する結果):
        assert_eq!(report.muted, 1);
    }

    #[tokio::test]
    async fn test_active_manager_overrides_creator() {
        // テスト項目: active_manager が設定されていれば作成者ではなくそちらを確認する
        // given (前提条件):
        let fixture = HubFixture::new();
        fixture.create_channel("general", "alice").await;
        fixture
            .channels
            .set_active_manager(&channel("general"), Some(identity("bob")))
            .await
            .unwrap();
        let alice = fixture.connect("c1").await;
        fixture.hub.ping(&identity("alice"), &alice.id).await.unwrap();

        // when (操作):
        let report = sentinel(&fixture).sweep(&CancellationToken::new()).await;

        // then (期待する結果):
        assert_eq!(report.muted, 1);
    }

    #[tokio::test]
    async fn test_sentinel_never_unmutes() {
        // テスト項目: ミュート中のチャンネルはマネージャーがいても評価対象外
        // given (前提条件):
        let fixture = HubFixture::new();
        fixture.create_channel("general", "alice").await;
        fixture.channels.set_muted(&channel("general"), true).await.unwrap();
        let alice = fixture.connect("c1").await;
        fixture.hub.ping(&identity("alice"), &alice.id).await.unwrap();

        // when (操作):
        let report = sentinel(&fixture).sweep(&CancellationToken::new()).await;

        // then (期待する結果):
        assert_eq!(report.inspected, 0);
        let row = fixture.channels.get_channel(&channel("general")).await.unwrap().unwrap();
        assert!(row.is_muted);
    }

    #[tokio::test]
    async fn test_sentinel_does_not_touch_groups() {
        // テスト項目: Sentinel はグループのメンバーを変更しない
        // given (前提条件):
        let fixture = HubFixture::new();
        fixture.create_channel("general", "alice").await;
        let member = fixture.connect("c1").await;
        fixture
            .hub
            .join(&identity("bob"), &channel("general"), &member.id)
            .await
            .unwrap();
        fixture.router.mark_stale(&channel("general"));

        // when (操作):
        sentinel(&fixture).sweep(&CancellationToken::new()).await;

        // then (期待する結果):
        assert!(fixture.router.is_stale(&channel("general")));
        assert_eq!(fixture.router.members(&channel("general")), vec![member.id.clone()]);
    }

    #[tokio::test]
    async fn test_stale_group_notice_follows_presence_store() {
        // テスト項目: stale なグループへのミュート通知は Presence Store 上の参加者に届き、グループは変更されない
        // given (前提条件):
        let fixture = HubFixture::new();
        fixture.create_channel("general", "alice").await;
        let mut member = fixture.connect("c1").await;
        let mut outsider = fixture.connect("c2").await;
        fixture
            .hub
            .join(&identity("bob"), &channel("general"), &member.id)
            .await
            .unwrap();
        fixture.hub.ping(&identity("carol"), &outsider.id).await.unwrap();
        // グループだけが食い違った状態を作る
        fixture.router.remove_from_group(&channel("general"), &member.id);
        fixture.router.add_to_group(&channel("general"), outsider.id.clone());
        fixture.router.mark_stale(&channel("general"));
        member.drain();
        outsider.drain();

        // when (操作):
        let report = sentinel(&fixture).sweep(&CancellationToken::new()).await;

        // then (期待する結果):
        assert_eq!(report.muted, 1);
        assert_eq!(member.drain_types(), vec!["channel-mute-status-changed"]);
        assert!(outsider.drain().is_empty());
        assert_eq!(fixture.router.members(&channel("general")), vec![outsider.id.clone()]);
        assert!(fixture.router.is_stale(&channel("general")));
    }

    #[tokio::test]
    async fn test_one_failing_channel_does_not_block_others() {
        // テスト項目: 1 つのチャンネルの評価が失敗し続けても他のチャンネルはミュートされる
        // given (前提条件):
        let fixture = HubFixture::new();
        let general = Channel::new(
            channel("general"),
            identity("alice"),
            None,
            Timestamp::new(START_MILLIS),
        );
        let broken = Channel::new(
            channel("broken"),
            identity("alice"),
            None,
            Timestamp::new(START_MILLIS),
        );
        let mut channels = MockChannelRepository::new();
        channels
            .expect_list_unmuted()
            .times(1)
            .returning(move || Ok(vec![broken.clone(), general.clone()]));
        channels
            .expect_mute_if_unmuted()
            .withf(|name: &ChannelName| name.as_str() == "broken")
            .returning(|_| Err(RepositoryError::Unavailable("replica lag".to_string())));
        channels
            .expect_mute_if_unmuted()
            .withf(|name: &ChannelName| name.as_str() == "general")
            .times(1)
            .returning(|_| Ok(true));
        let config = HubConfig {
            retry_backoff: std::time::Duration::from_millis(1),
            ..test_config()
        };
        let sentinel = AutoMuteSentinel::new(
            Arc::new(channels),
            fixture.connections.clone(),
            fixture.router.clone(),
            fixture.clock.clone(),
            config,
        );

        // when (操作):
        let report = sentinel.sweep(&CancellationToken::new()).await;

        // then (期待する結果):
        assert_eq!(report, SentinelReport { inspected: 2, muted: 1, failed: 1 });
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        // テスト項目: 一時的な失敗は再試行され、成功すればミュートされる
        // given (前提条件):
        let fixture = HubFixture::new();
        let general = Channel::new(
            channel("general"),
            Identity::new("alice").unwrap(),
            None,
            Timestamp::new(START_MILLIS),
        );
        let mut channels = MockChannelRepository::new();
        channels
            .expect_list_unmuted()
            .returning(move || Ok(vec![general.clone()]));
        let mut attempts = 0;
        channels.expect_mute_if_unmuted().times(2).returning(move |_| {
            attempts += 1;
            if attempts == 1 {
                Err(RepositoryError::Timeout)
            } else {
                Ok(true)
            }
        });
        let config = HubConfig {
            retry_backoff: std::time::Duration::from_millis(1),
            ..test_config()
        };
        let sentinel = AutoMuteSentinel::new(
            Arc::new(channels),
            fixture.connections.clone(),
            fixture.router.clone(),
            fixture.clock.clone(),
            config,
        );

        // when (操作):
        let report = sentinel.sweep(&CancellationToken::new()).await;

        // then (期待する結果):
        assert_eq!(report, SentinelReport { inspected: 1, muted: 1, failed: 0 });
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_sweep_racing_manual_mute_notifies_once() {
        // テスト項目: Sentinel の走査と手動ミュートが並行しても、ミュート通知は 1 回だけ
        // given (前提条件):
        for round in 0..20 {
            let fixture = HubFixture::new();
            fixture.create_channel("general", "alice").await;
            let mut member = fixture.connect("c1").await;
            fixture
                .hub
                .join(&identity("bob"), &channel("general"), &member.id)
                .await
                .unwrap();
            member.drain();
            let sentinel = Arc::new(sentinel(&fixture));
            let admin = Arc::new(crate::usecase::ChannelAdminUseCase::new(
                fixture.channels.clone(),
                fixture.connections.clone(),
                fixture.hub.clone(),
            ));

            // when (操作):
            let sweep = {
                let sentinel = sentinel.clone();
                tokio::spawn(async move { sentinel.sweep(&CancellationToken::new()).await })
            };
            let manual = {
                let admin = admin.clone();
                tokio::spawn(async move { admin.set_muted("general", "alice", true).await })
            };
            let report = sweep.await.unwrap();
            manual.await.unwrap().unwrap();

            // then (期待する結果):
            let notices: Vec<_> = member
                .drain()
                .into_iter()
                .filter(|f| f["type"] == "channel-mute-status-changed")
                .collect();
            assert_eq!(notices.len(), 1, "round {round}: {notices:?}");
            assert_eq!(notices[0]["muted"], true);
            assert!(report.muted <= 1);
            let row = fixture.channels.get_channel(&channel("general")).await.unwrap().unwrap();
            assert!(row.is_muted);
        }
    }
}
