//! HTTP API DTOs.

use serde::{Deserialize, Serialize};

/// チャンネル一覧の要素
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSummaryDto {
    pub name: String,
    pub creator: String,
    pub is_muted: bool,
    pub member_count: usize,
}

/// チャンネル詳細
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelDetailDto {
    pub name: String,
    pub creator: String,
    pub active_manager: Option<String>,
    pub is_muted: bool,
    pub description: Option<String>,
    pub created_at: Option<String>,
    pub members: Vec<String>,
}

/// 接続の一覧（デバッグ用）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionDto {
    pub connection_id: String,
    pub identity: String,
    pub channel: Option<String>,
    pub last_activity: Option<String>,
    pub owner_instance: String,
}

/// POST /api/channels
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CreateChannelRequest {
    pub name: String,
    pub creator: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// PUT /api/channels/{name}/mute
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SetMuteRequest {
    pub actor: String,
    pub muted: bool,
}

/// PUT /api/channels/{name}/manager
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SetManagerRequest {
    pub actor: String,
    #[serde(default)]
    pub manager: Option<String>,
}

/// DELETE /api/channels/{name}?actor=
#[derive(Debug, Clone, Deserialize)]
pub struct ActorQuery {
    pub actor: String,
}

/// GET /api/channels/{name}/messages?limit=
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryQuery {
    #[serde(default)]
    pub limit: Option<usize>,
}

/// エラーレスポンス
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
