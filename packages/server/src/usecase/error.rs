//! UseCase 層のエラー定義

use thiserror::Error;

use crate::domain::{RepositoryError, ValueObjectError};

/// Join の失敗
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JoinError {
    /// 呼び出し元にだけ `ChannelNotFound` が通知済み
    #[error("Channel '{0}' not found")]
    ChannelNotFound(String),

    #[error(transparent)]
    Store(#[from] RepositoryError),
}

/// チャンネル投稿の失敗
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendMessageError {
    #[error("Channel '{0}' not found")]
    ChannelNotFound(String),

    /// 呼び出し元にだけ `MessageBlocked` が通知済み
    #[error("Message blocked: {0}")]
    Blocked(String),

    #[error(transparent)]
    Store(#[from] RepositoryError),
}

/// チャンネル管理操作の失敗
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelAdminError {
    #[error("Channel '{0}' not found")]
    ChannelNotFound(String),

    #[error("Channel '{0}' already exists")]
    ChannelAlreadyExists(String),

    #[error("'{actor}' is not allowed to manage channel '{channel}'")]
    Forbidden { actor: String, channel: String },

    #[error(transparent)]
    InvalidInput(#[from] ValueObjectError),

    #[error(transparent)]
    Store(RepositoryError),
}

impl From<RepositoryError> for ChannelAdminError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::ChannelNotFound(name) => Self::ChannelNotFound(name),
            RepositoryError::ChannelAlreadyExists(name) => Self::ChannelAlreadyExists(name),
            other => Self::Store(other),
        }
    }
}
