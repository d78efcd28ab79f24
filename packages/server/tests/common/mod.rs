//! 結合テスト用のヘルパー
//!
//! 実際のサーバーを 127.0.0.1 のエフェメラルポートで起動し、
//! tokio-tungstenite / reqwest でクライアントとして接続する。

#![allow(dead_code)]

use std::{net::SocketAddr, sync::Arc, time::Duration};

use futures_util::{SinkExt, StreamExt};
use hiroba_server::{
    config::HubConfig,
    domain::{Identity, MessagePusher},
    infrastructure::{
        BroadcastRouter,
        auth::StaticPrivilegeChecker,
        message_pusher::WebSocketMessagePusher,
        repository::{
            InMemoryChannelRepository, InMemoryConnectionRepository, InMemoryMessageRepository,
        },
    },
    ui::Server,
    usecase::{AutoMuteSentinel, ConnectionReaper, ChannelAdminUseCase, HubPorts, PresenceHub},
};
use hiroba_shared::time::SystemClock;
use serde_json::Value;
use tokio::{net::TcpListener, task::JoinHandle};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async, tungstenite::protocol::Message,
};
use tokio_util::sync::CancellationToken;

const RECV_TIMEOUT: Duration = Duration::from_secs(3);

/// Helper struct to manage server lifecycle
pub struct TestServer {
    pub addr: SocketAddr,
    pub hub: Arc<PresenceHub>,
    pub reaper: Arc<ConnectionReaper>,
    pub sentinel: Arc<AutoMuteSentinel>,
    shutdown: CancellationToken,
    handle: JoinHandle<()>,
}

impl TestServer {
    /// Start a test server with `alice-admin` as the only privileged identity
    pub async fn start() -> Self {
        Self::start_with(HubConfig {
            instance_id: "node-it".to_string(),
            ..HubConfig::default()
        })
        .await
    }

    pub async fn start_with(config: HubConfig) -> Self {
        let connections = Arc::new(InMemoryConnectionRepository::new());
        let channels = Arc::new(InMemoryChannelRepository::new());
        let privileges = Arc::new(StaticPrivilegeChecker::new([
            Identity::new("alice-admin").unwrap()
        ]));
        let message_pusher: Arc<dyn MessagePusher> = Arc::new(WebSocketMessagePusher::new());
        let router = Arc::new(BroadcastRouter::new(message_pusher.clone()));
        let clock = Arc::new(SystemClock);

        let hub = Arc::new(PresenceHub::new(
            HubPorts {
                connections: connections.clone(),
                channels: channels.clone(),
                messages: Arc::new(InMemoryMessageRepository::new()),
                privileges,
            },
            router.clone(),
            clock.clone(),
            config.clone(),
        ));
        let channel_admin = Arc::new(ChannelAdminUseCase::new(
            channels.clone(),
            connections.clone(),
            hub.clone(),
        ));
        let reaper = Arc::new(ConnectionReaper::new(hub.clone(), connections.clone()));
        let sentinel = Arc::new(AutoMuteSentinel::new(
            channels,
            connections,
            router,
            clock,
            config,
        ));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = CancellationToken::new();
        let server = Server::new(hub.clone(), channel_admin, message_pusher);
        let token = shutdown.clone();
        let handle = tokio::spawn(async move {
            server.serve(listener, token).await.unwrap();
        });

        Self {
            addr,
            hub,
            reaper,
            sentinel,
            shutdown,
            handle,
        }
    }

    pub fn http_url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn ws_url(&self, identity: &str) -> String {
        format!("ws://{}/ws?identity={}", self.addr, identity)
    }

    /// POST /api/channels
    pub async fn create_channel(&self, name: &str, creator: &str) -> reqwest::Response {
        reqwest::Client::new()
            .post(self.http_url("/api/channels"))
            .json(&serde_json::json!({ "name": name, "creator": creator }))
            .send()
            .await
            .unwrap()
    }

    /// GET /debug/connections
    pub async fn connections(&self) -> Vec<Value> {
        reqwest::get(self.http_url("/debug/connections"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap()
    }

    pub async fn shutdown(self) {
        self.shutdown.cancel();
        let _ = tokio::time::timeout(RECV_TIMEOUT, self.handle).await;
    }
}

/// Helper struct for a WebSocket client
pub struct WsClient {
    stream: WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>,
    pub connection_id: String,
}

impl WsClient {
    /// 接続して `connected` フレームを受け取るまで待つ
    pub async fn connect(server: &TestServer, identity: &str) -> Self {
        let (stream, _) = connect_async(server.ws_url(identity)).await.unwrap();
        let mut client = Self {
            stream,
            connection_id: String::new(),
        };
        let connected = client.expect("connected").await;
        client.connection_id = connected["connection_id"].as_str().unwrap().to_string();
        client
    }

    pub async fn send(&mut self, frame: Value) {
        self.stream
            .send(Message::Text(frame.to_string().into()))
            .await
            .unwrap();
    }

    /// 次のテキストフレーム（タイムアウトした場合は None）
    pub async fn next_frame(&mut self) -> Option<Value> {
        loop {
            let message = tokio::time::timeout(RECV_TIMEOUT, self.stream.next())
                .await
                .ok()??
                .ok()?;
            match message {
                Message::Text(text) => return Some(serde_json::from_str(&text).unwrap()),
                Message::Close(_) => return None,
                _ => continue,
            }
        }
    }

    /// 指定した type のフレームが届くまで読み進める
    pub async fn expect(&mut self, frame_type: &str) -> Value {
        loop {
            match self.next_frame().await {
                Some(frame) if frame["type"] == frame_type => return frame,
                Some(_) => continue,
                None => panic!("connection ended before receiving '{}'", frame_type),
            }
        }
    }

    /// サーバー側から閉じられるまで読み進める
    pub async fn expect_closed(&mut self) {
        while self.next_frame().await.is_some() {}
    }

    pub async fn close(mut self) {
        let _ = self.stream.close(None).await;
    }
}
