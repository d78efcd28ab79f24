//! Hiroba presence hub.
//!
//! マルチルームチャットの接続プレゼンス管理とチャンネルへのブロードキャストを行うサーバー。
//! Presence Store を正とし、WebSocket のグループはそのキャッシュとして扱う。

// layers
pub mod domain;
pub mod infrastructure;
pub mod ui;
pub mod usecase;

pub mod config;
