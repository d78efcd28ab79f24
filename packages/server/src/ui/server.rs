//! Server execution logic.

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, put},
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::{
    domain::MessagePusher,
    usecase::{ChannelAdminUseCase, PresenceHub},
};

use super::{
    handler::{
        create_channel, debug_connections, delete_channel, get_channel_detail,
        get_channel_messages, health_check, list_channels, set_channel_manager, set_channel_mute,
        websocket_handler,
    },
    signal::shutdown_signal,
    state::AppState,
};

/// Presence hub server
///
/// This struct encapsulates the server dependencies and provides methods to run the server.
///
/// # Example
///
/// ```ignore
/// let server = Server::new(hub, channel_admin, message_pusher);
/// server.run("127.0.0.1".to_string(), 8080, CancellationToken::new()).await?;
/// ```
pub struct Server {
    /// PresenceHub（WebSocket イベントの処理）
    hub: Arc<PresenceHub>,
    /// ChannelAdminUseCase（チャンネル管理 API）
    channel_admin: Arc<ChannelAdminUseCase>,
    /// MessagePusher（WebSocket 送信チャンネルの登録先）
    message_pusher: Arc<dyn MessagePusher>,
}

impl Server {
    /// Create a new Server instance
    ///
    /// # Arguments
    ///
    /// * `hub` - Presence hub shared with the background workers
    /// * `channel_admin` - UseCase for the channel management API
    /// * `message_pusher` - MessagePusher that owns the outbound WebSocket channels
    pub fn new(
        hub: Arc<PresenceHub>,
        channel_admin: Arc<ChannelAdminUseCase>,
        message_pusher: Arc<dyn MessagePusher>,
    ) -> Self {
        Self {
            hub,
            channel_admin,
            message_pusher,
        }
    }

    /// Build the axum router
    ///
    /// `shutdown` を cancel すると、開いている WebSocket 接続がすべて閉じられる。
    pub fn router(&self, shutdown: CancellationToken) -> Router {
        let app_state = Arc::new(AppState {
            hub: self.hub.clone(),
            channel_admin: self.channel_admin.clone(),
            message_pusher: self.message_pusher.clone(),
            shutdown,
        });

        Router::new()
            // WebSocket エンドポイント
            .route("/ws", get(websocket_handler))
            // HTTP エンドポイント
            .route("/api/health", get(health_check))
            .route("/api/channels", get(list_channels).post(create_channel))
            .route(
                "/api/channels/{name}",
                get(get_channel_detail).delete(delete_channel),
            )
            .route("/api/channels/{name}/messages", get(get_channel_messages))
            .route("/api/channels/{name}/mute", put(set_channel_mute))
            .route("/api/channels/{name}/manager", put(set_channel_manager))
            .route("/debug/connections", get(debug_connections))
            .layer(TraceLayer::new_for_http())
            .with_state(app_state)
    }

    /// Run the presence hub server
    ///
    /// # Arguments
    ///
    /// * `host` - The host address to bind to (e.g., "127.0.0.1")
    /// * `port` - The port number to bind to (e.g., 8080)
    /// * `shutdown` - Cancelled when the server stops; cancelling it also stops the server
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind to the specified address or
    /// if there's an error during server execution.
    pub async fn run(
        self,
        host: String,
        port: u16,
        shutdown: CancellationToken,
    ) -> Result<(), Box<dyn std::error::Error>> {
        // Bind the server to the host and port
        let bind_addr = format!("{}:{}", host, port);
        let listener = TcpListener::bind(&bind_addr).await?;
        tracing::info!("Connect to: ws://{}/ws?identity=<name>", bind_addr);
        tracing::info!("Press Ctrl+C to shutdown gracefully");

        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener
    pub async fn serve(
        self,
        listener: TcpListener,
        shutdown: CancellationToken,
    ) -> Result<(), Box<dyn std::error::Error>> {
        tracing::info!(
            "Presence hub server listening on {}",
            listener.local_addr()?
        );
        let app = self.router(shutdown.clone());

        // Set up graceful shutdown: OS signal or token cancellation
        let token = shutdown.clone();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                tokio::select! {
                    _ = shutdown_signal() => {}
                    _ = token.cancelled() => {}
                }
                token.cancel();
            })
            .await?;

        shutdown.cancel();
        tracing::info!("Server shutdown complete");

        Ok(())
    }
}
