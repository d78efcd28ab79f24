//! UseCase 層
//!
//! Presence Hub（接続ごとのイベント処理）、2 つのバックグラウンド処理
//! （Connection Reaper / Auto-Mute Sentinel）、チャンネル管理を提供します。

pub mod background;
pub mod channel_admin;
pub mod error;
pub mod hub;
pub mod reaper;
pub mod retry;
pub mod sentinel;

pub use channel_admin::{ChannelAdminUseCase, ChannelSummary};
pub use error::{ChannelAdminError, JoinError, SendMessageError};
pub use hub::{HubPorts, PresenceHub};
pub use reaper::{ConnectionReaper, ReapReport};
pub use sentinel::{AutoMuteSentinel, SentinelReport};
