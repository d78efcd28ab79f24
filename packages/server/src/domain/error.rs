//! ドメイン層のエラー定義

use thiserror::Error;

/// Value Object の生成に失敗した
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueObjectError {
    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("{kind} must be at most {max} characters")]
    TooLong { kind: &'static str, max: usize },

    #[error("{0} contains control characters")]
    InvalidCharacter(&'static str),
}

/// Repository（Presence Store / Channel Registry / Message Store）のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    #[error("Channel '{0}' not found")]
    ChannelNotFound(String),

    #[error("Channel '{0}' already exists")]
    ChannelAlreadyExists(String),

    #[error("Connection '{0}' not found")]
    ConnectionNotFound(String),

    /// ストアが一時的に利用できない（リトライ対象）
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// ストア操作がタイムアウトした（リトライ対象）
    #[error("Store operation timed out")]
    Timeout,
}

impl RepositoryError {
    /// 再試行で回復し得るエラーか
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout)
    }
}

/// MessagePusher（トランスポート）のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessagePushError {
    #[error("Client '{0}' not found")]
    ClientNotFound(String),

    #[error("Failed to push message: {0}")]
    PushFailed(String),

    #[error("Failed to encode event: {0}")]
    EncodeFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_errors() {
        // テスト項目: Unavailable / Timeout のみがリトライ対象になる
        // given (前提条件):
        let transient = [
            RepositoryError::Unavailable("locked".to_string()),
            RepositoryError::Timeout,
        ];
        let permanent = [
            RepositoryError::ChannelNotFound("general".to_string()),
            RepositoryError::ConnectionNotFound("c1".to_string()),
        ];

        // when (操作) / then (期待する結果):
        assert!(transient.iter().all(RepositoryError::is_transient));
        assert!(!permanent.iter().any(RepositoryError::is_transient));
    }
}
