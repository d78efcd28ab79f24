//! Hiroba presence hub server.
//!
//! Tracks which identities are connected, which channel each connection is in,
//! and fans channel / direct messages out over WebSocket.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin hiroba-server
//! cargo run --bin hiroba-server -- --host 0.0.0.0 --port 3000 --admin alice
//! ```

use std::{sync::Arc, time::Duration};

use clap::Parser;
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
    usecase::{AutoMuteSentinel, ChannelAdminUseCase, ConnectionReaper, HubPorts, PresenceHub},
};
use hiroba_shared::{logger::setup_logger, time::SystemClock};
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(name = "hiroba-server")]
#[command(about = "Presence and channel-broadcast hub for multi-room chat", long_about = None)]
struct Args {
    /// Host address to bind the server to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, default_value = "8080")]
    port: u16,

    /// Identifier of this instance in the presence store (random when omitted)
    #[arg(long)]
    instance_id: Option<String>,

    /// Seconds between connection reaper sweeps
    #[arg(long, default_value = "30")]
    reaper_interval_secs: u64,

    /// Seconds of inactivity after which a connection is considered stale
    #[arg(long, default_value = "120")]
    connection_timeout_secs: u64,

    /// Seconds between auto-mute sentinel sweeps
    #[arg(long, default_value = "60")]
    sentinel_interval_secs: u64,

    /// Seconds of inactivity after which a channel manager is considered absent
    #[arg(long, default_value = "120")]
    manager_inactivity_secs: u64,

    /// Upper bound in milliseconds for a single store call
    #[arg(long, default_value = "2000")]
    store_timeout_ms: u64,

    /// Retries for transient store errors in background workers
    #[arg(long, default_value = "3")]
    max_retries: u32,

    /// Privileged identity (repeatable)
    #[arg(long = "admin")]
    admins: Vec<String>,

    /// Default log level when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn hub_config(&self) -> HubConfig {
        HubConfig {
            instance_id: self
                .instance_id
                .clone()
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            reaper_interval: Duration::from_secs(self.reaper_interval_secs),
            connection_timeout: Duration::from_secs(self.connection_timeout_secs),
            sentinel_interval: Duration::from_secs(self.sentinel_interval_secs),
            manager_inactivity_timeout: Duration::from_secs(self.manager_inactivity_secs),
            store_timeout: Duration::from_millis(self.store_timeout_ms),
            max_retries: self.max_retries,
            ..HubConfig::default()
        }
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), &args.log_level);

    let config = args.hub_config();
    let mut admins = Vec::with_capacity(args.admins.len());
    for raw in &args.admins {
        match Identity::new(raw) {
            Ok(identity) => admins.push(identity),
            Err(e) => {
                tracing::error!("Invalid --admin '{}': {}", raw, e);
                std::process::exit(2);
            }
        }
    }
    tracing::info!(instance_id = %config.instance_id, admins = admins.len(), "Starting presence hub");

    // Initialize dependencies in order:
    // 1. Repositories
    // 2. MessagePusher / BroadcastRouter
    // 3. Hub and UseCases
    // 4. Background workers
    // 5. Server

    // 1. Create Repositories (in-memory stores)
    let connections = Arc::new(InMemoryConnectionRepository::new());
    let channels = Arc::new(InMemoryChannelRepository::new());
    let messages = Arc::new(InMemoryMessageRepository::new());
    let privileges = Arc::new(StaticPrivilegeChecker::new(admins));

    // 2. Create MessagePusher (WebSocket implementation) and the group router on top of it
    let message_pusher: Arc<dyn MessagePusher> = Arc::new(WebSocketMessagePusher::new());
    let router = Arc::new(BroadcastRouter::new(message_pusher.clone()));
    let clock = Arc::new(SystemClock);

    // 3. Create Hub and UseCases
    let hub = Arc::new(PresenceHub::new(
        HubPorts {
            connections: connections.clone(),
            channels: channels.clone(),
            messages,
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

    // 4. Start background workers
    let shutdown = CancellationToken::new();
    let reaper = Arc::new(ConnectionReaper::new(hub.clone(), connections.clone()));
    let sentinel = Arc::new(AutoMuteSentinel::new(
        channels,
        connections,
        router,
        clock,
        config,
    ));
    let reaper_handle = reaper.spawn(shutdown.clone());
    let sentinel_handle = sentinel.spawn(shutdown.clone());

    // 5. Create and run the server
    let server = Server::new(hub, channel_admin, message_pusher);
    let result = server
        .run(args.host, args.port, shutdown.clone())
        .await;

    shutdown.cancel();
    let _ = tokio::join!(reaper_handle, sentinel_handle);

    if let Err(e) = result {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
