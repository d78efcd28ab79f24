//! Infrastructure 層
//!
//! ドメイン層のインターフェースの具体的な実装と、メモリ上のグループ射影（Broadcast Router）。

pub mod auth;
pub mod broadcast_router;
pub mod dto;
pub mod message_pusher;
pub mod repository;

pub use broadcast_router::BroadcastRouter;
