//! Hub のテスト用フィクスチャ

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use hiroba_shared::time::ManualClock;
use serde_json::Value;
use tokio::sync::mpsc;

use super::{HubPorts, PresenceHub};
use crate::{
    config::HubConfig,
    domain::{
        Channel, ChannelName, ChannelRepository, Connection, ConnectionId, ConnectionRepository,
        Identity, MessagePusher, RepositoryError, Timestamp,
    },
    infrastructure::{
        BroadcastRouter,
        auth::StaticPrivilegeChecker,
        message_pusher::WebSocketMessagePusher,
        repository::{
            InMemoryChannelRepository, InMemoryConnectionRepository, InMemoryMessageRepository,
        },
    },
};

pub(crate) const INSTANCE: &str = "node-test";
pub(crate) const START_MILLIS: i64 = 1_700_000_000_000;

pub(crate) fn identity(value: &str) -> Identity {
    Identity::new(value).unwrap()
}

pub(crate) fn channel(value: &str) -> ChannelName {
    ChannelName::new(value).unwrap()
}

pub(crate) fn connection_id(value: &str) -> ConnectionId {
    ConnectionId::new(value).unwrap()
}

pub(crate) fn test_config() -> HubConfig {
    HubConfig {
        instance_id: INSTANCE.to_string(),
        ..HubConfig::default()
    }
}

pub(crate) struct HubFixture {
    pub hub: Arc<PresenceHub>,
    pub ports: HubPorts,
    pub connections: Arc<InMemoryConnectionRepository>,
    pub channels: Arc<InMemoryChannelRepository>,
    pub messages: Arc<InMemoryMessageRepository>,
    pub pusher: Arc<WebSocketMessagePusher>,
    pub router: Arc<BroadcastRouter>,
    pub clock: Arc<ManualClock>,
}

impl HubFixture {
    pub fn new() -> Self {
        Self::with_admins(&[])
    }

    pub fn with_admins(admins: &[&str]) -> Self {
        let connections = Arc::new(InMemoryConnectionRepository::new());
        let channels = Arc::new(InMemoryChannelRepository::new());
        let messages = Arc::new(InMemoryMessageRepository::new());
        let privileges = Arc::new(StaticPrivilegeChecker::new(
            admins.iter().map(|name| identity(name)),
        ));
        let pusher = Arc::new(WebSocketMessagePusher::new());
        let router = Arc::new(BroadcastRouter::new(pusher.clone()));
        let clock = Arc::new(ManualClock::new(START_MILLIS));
        let ports = HubPorts {
            connections: connections.clone(),
            channels: channels.clone(),
            messages: messages.clone(),
            privileges,
        };
        let hub = Arc::new(PresenceHub::new(
            ports.clone(),
            router.clone(),
            clock.clone(),
            test_config(),
        ));
        Self {
            hub,
            ports,
            connections,
            channels,
            messages,
            pusher,
            router,
            clock,
        }
    }

    pub async fn create_channel(&self, name: &str, creator: &str) {
        self.channels
            .create_channel(Channel::new(
                channel(name),
                identity(creator),
                None,
                Timestamp::new(START_MILLIS),
            ))
            .await
            .unwrap();
    }

    /// 同じストア・ルーターを共有し、Channel Registry だけ差し替えた Hub
    pub fn hub_with_channels(&self, channels: Arc<dyn ChannelRepository>) -> Arc<PresenceHub> {
        Arc::new(PresenceHub::new(
            HubPorts {
                channels,
                ..self.ports.clone()
            },
            self.router.clone(),
            self.clock.clone(),
            test_config(),
        ))
    }

    /// トランスポートを登録した接続を用意する
    pub async fn connect(&self, id: &str) -> TestClient {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = connection_id(id);
        self.pusher.register_client(id.clone(), tx).await;
        TestClient { id, rx }
    }
}

pub(crate) struct TestClient {
    pub id: ConnectionId,
    rx: mpsc::UnboundedReceiver<String>,
}

impl TestClient {
    /// 受信済みのフレームをすべて取り出す
    pub fn drain(&mut self) -> Vec<Value> {
        let mut frames = Vec::new();
        while let Ok(frame) = self.rx.try_recv() {
            frames.push(serde_json::from_str(&frame).unwrap());
        }
        frames
    }

    /// 受信済みのフレームの type だけを取り出す
    pub fn drain_types(&mut self) -> Vec<String> {
        self.drain()
            .into_iter()
            .map(|frame| frame["type"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    /// トランスポートが閉じられたか
    pub fn is_closed(&mut self) -> bool {
        matches!(
            self.rx.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        )
    }
}

/// 読み取りの後に `delay` だけ待つストア（操作の間に別の操作を割り込ませる）
///
/// Channel Registry では `get_channel`、Presence Store では `list_all` だけが遅れる。
pub(crate) struct DelayedRepository<R> {
    inner: Arc<R>,
    delay: Duration,
}

impl<R> DelayedRepository<R> {
    pub fn new(inner: Arc<R>, delay: Duration) -> Self {
        Self { inner, delay }
    }
}

#[async_trait]
impl ChannelRepository for DelayedRepository<InMemoryChannelRepository> {
    async fn exists(&self, name: &ChannelName) -> Result<bool, RepositoryError> {
        self.inner.exists(name).await
    }

    async fn get_channel(&self, name: &ChannelName) -> Result<Option<Channel>, RepositoryError> {
        let channel = self.inner.get_channel(name).await;
        tokio::time::sleep(self.delay).await;
        channel
    }

    async fn list_channels(&self) -> Result<Vec<Channel>, RepositoryError> {
        self.inner.list_channels().await
    }

    async fn list_unmuted(&self) -> Result<Vec<Channel>, RepositoryError> {
        self.inner.list_unmuted().await
    }

    async fn create_channel(&self, channel: Channel) -> Result<(), RepositoryError> {
        self.inner.create_channel(channel).await
    }

    async fn delete_channel(&self, name: &ChannelName) -> Result<Option<Channel>, RepositoryError> {
        self.inner.delete_channel(name).await
    }

    async fn set_muted(&self, name: &ChannelName, muted: bool) -> Result<bool, RepositoryError> {
        self.inner.set_muted(name, muted).await
    }

    async fn mute_if_unmuted(&self, name: &ChannelName) -> Result<bool, RepositoryError> {
        self.inner.mute_if_unmuted(name).await
    }

    async fn set_active_manager(
        &self,
        name: &ChannelName,
        manager: Option<Identity>,
    ) -> Result<(), RepositoryError> {
        self.inner.set_active_manager(name, manager).await
    }
}

#[async_trait]
impl ConnectionRepository for DelayedRepository<InMemoryConnectionRepository> {
    async fn get(&self, id: &ConnectionId) -> Result<Option<Connection>, RepositoryError> {
        self.inner.get(id).await
    }

    async fn upsert(&self, connection: Connection) -> Result<(), RepositoryError> {
        self.inner.upsert(connection).await
    }

    async fn remove(&self, id: &ConnectionId) -> Result<Option<Connection>, RepositoryError> {
        self.inner.remove(id).await
    }

    async fn list_all(&self) -> Result<Vec<Connection>, RepositoryError> {
        let rows = self.inner.list_all().await;
        tokio::time::sleep(self.delay).await;
        rows
    }

    async fn list_by_channel(
        &self,
        channel: &ChannelName,
    ) -> Result<Vec<Connection>, RepositoryError> {
        self.inner.list_by_channel(channel).await
    }

    async fn list_by_identity(
        &self,
        identity: &Identity,
    ) -> Result<Vec<Connection>, RepositoryError> {
        self.inner.list_by_identity(identity).await
    }

    async fn has_active_connection(
        &self,
        identity: &Identity,
        active_since: Timestamp,
    ) -> Result<bool, RepositoryError> {
        self.inner.has_active_connection(identity, active_since).await
    }
}
