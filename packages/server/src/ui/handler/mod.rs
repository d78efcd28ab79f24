//! Request handlers.

pub mod http;
pub mod websocket;

pub use http::{
    create_channel, debug_connections, delete_channel, get_channel_detail, get_channel_messages,
    health_check, list_channels, set_channel_manager, set_channel_mute,
};
pub use websocket::websocket_handler;
