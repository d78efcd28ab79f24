//! HTTP API endpoint handlers.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::{
    infrastructure::dto::{
        http::{
            ActorQuery, ChannelDetailDto, ChannelSummaryDto, ConnectionDto, CreateChannelRequest,
            ErrorResponse, HistoryQuery, SetManagerRequest, SetMuteRequest,
        },
        websocket::ChannelMessageDto,
    },
    ui::state::AppState,
    usecase::ChannelAdminError,
};

/// ChannelAdminError を HTTP レスポンスに変換するためのラッパー
#[derive(Debug)]
pub struct ApiError(ChannelAdminError);

impl From<ChannelAdminError> for ApiError {
    fn from(error: ChannelAdminError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            ChannelAdminError::ChannelNotFound(_) => StatusCode::NOT_FOUND,
            ChannelAdminError::ChannelAlreadyExists(_) => StatusCode::CONFLICT,
            ChannelAdminError::Forbidden { .. } => StatusCode::FORBIDDEN,
            ChannelAdminError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ChannelAdminError::Store(e) if e.is_transient() => StatusCode::SERVICE_UNAVAILABLE,
            ChannelAdminError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!("Channel API failed: {}", self.0);
        }
        let body = ErrorResponse {
            error: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Health check endpoint
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Get list of channels
pub async fn list_channels(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ChannelSummaryDto>>, ApiError> {
    let summaries = state.channel_admin.list_channels().await?;

    // Domain Model から DTO への変換
    let channels = summaries
        .iter()
        .map(|s| ChannelSummaryDto::from_channel(&s.channel, s.member_count))
        .collect();
    Ok(Json(channels))
}

/// Create a channel
pub async fn create_channel(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateChannelRequest>,
) -> Result<(StatusCode, Json<ChannelDetailDto>), ApiError> {
    let channel = state
        .channel_admin
        .create_channel(&request.name, &request.creator, request.description)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(ChannelDetailDto::from_channel(&channel, &[])),
    ))
}

/// Get channel detail by name
pub async fn get_channel_detail(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<ChannelDetailDto>, ApiError> {
    let (channel, members) = state.channel_admin.channel_detail(&name).await?;
    Ok(Json(ChannelDetailDto::from_channel(&channel, &members)))
}

/// 履歴取得の既定の件数
const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Get recent messages of a channel, oldest first
pub async fn get_channel_messages(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<ChannelMessageDto>>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    let messages = state.channel_admin.channel_history(&name, limit).await?;
    Ok(Json(messages.iter().map(ChannelMessageDto::from).collect()))
}

/// Delete a channel (`?actor=` must be the creator or a privileged identity)
pub async fn delete_channel(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Query(query): Query<ActorQuery>,
) -> Result<StatusCode, ApiError> {
    state
        .channel_admin
        .delete_channel(&name, &query.actor)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Mute or unmute a channel
pub async fn set_channel_mute(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Json(request): Json<SetMuteRequest>,
) -> Result<Json<ChannelDetailDto>, ApiError> {
    state
        .channel_admin
        .set_muted(&name, &request.actor, request.muted)
        .await?;
    get_channel_detail(State(state), Path(name)).await
}

/// Assign or clear the active manager
pub async fn set_channel_manager(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Json(request): Json<SetManagerRequest>,
) -> Result<Json<ChannelDetailDto>, ApiError> {
    state
        .channel_admin
        .set_active_manager(&name, &request.actor, request.manager.as_deref())
        .await?;
    get_channel_detail(State(state), Path(name)).await
}

/// Debug endpoint to list every row in the presence store
pub async fn debug_connections(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ConnectionDto>>, ApiError> {
    let connections = state.channel_admin.list_connections().await?;
    Ok(Json(connections.iter().map(ConnectionDto::from).collect()))
}
