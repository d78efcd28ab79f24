//! UI 層
//!
//! WebSocket（クライアントイベント）と HTTP（チャンネル管理・デバッグ）の入口。

pub mod handler;
pub mod server;
pub mod signal;
pub mod state;

pub use server::Server;
pub use state::AppState;
