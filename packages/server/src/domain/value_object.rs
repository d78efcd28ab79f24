//! Value Object 定義
//!
//! 識別子や名前などの不変な値を型で表現します。
//! Identity / ChannelName は境界で一度だけ case-fold した比較キーを持ち、
//! 以降の Map / Store のキーには常にこの正規化済みキーを使います。

use std::{
    fmt,
    hash::{Hash, Hasher},
};

use serde::{Serialize, Serializer};

use super::error::ValueObjectError;

/// Identity（表示名）の最大文字数
pub const MAX_IDENTITY_LENGTH: usize = 32;
/// チャンネル名の最大文字数
pub const MAX_CHANNEL_NAME_LENGTH: usize = 64;
/// メッセージ本文の最大文字数
pub const MAX_MESSAGE_LENGTH: usize = 2000;

fn validate_name(raw: &str, kind: &'static str, max: usize) -> Result<String, ValueObjectError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValueObjectError::Empty(kind));
    }
    if trimmed.chars().count() > max {
        return Err(ValueObjectError::TooLong { kind, max });
    }
    if trimmed.chars().any(char::is_control) {
        return Err(ValueObjectError::InvalidCharacter(kind));
    }
    Ok(trimmed.to_string())
}

/// 正規化キーを持つ名前型を定義する
///
/// `display` は利用者が入力した表記、`key` は比較に使う小文字化済みの値。
/// 等価性とハッシュは `key` のみで決まる。
macro_rules! case_folded_name {
    ($(#[$meta:meta])* $name:ident, $kind:literal, $max:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone)]
        pub struct $name {
            display: String,
            key: String,
        }

        impl $name {
            pub fn new(raw: impl AsRef<str>) -> Result<Self, ValueObjectError> {
                let display = validate_name(raw.as_ref(), $kind, $max)?;
                let key = display.to_lowercase();
                Ok(Self { display, key })
            }

            /// 入力された表記
            pub fn as_str(&self) -> &str {
                &self.display
            }

            /// case-fold 済みの比較キー
            pub fn key(&self) -> &str {
                &self.key
            }

            pub fn into_string(self) -> String {
                self.display
            }
        }

        impl PartialEq for $name {
            fn eq(&self, other: &Self) -> bool {
                self.key == other.key
            }
        }

        impl Eq for $name {}

        impl Hash for $name {
            fn hash<H: Hasher>(&self, state: &mut H) {
                self.key.hash(state);
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.display)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.display)
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValueObjectError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }
    };
}

case_folded_name!(
    /// ユーザーの表示名。複数の接続が同じ Identity を共有できる。
    Identity,
    "identity",
    MAX_IDENTITY_LENGTH
);

case_folded_name!(
    /// チャンネル名（大文字小文字を区別しない）
    ChannelName,
    "channel name",
    MAX_CHANNEL_NAME_LENGTH
);

/// 物理接続の ID（トランスポート層が払い出す）
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn new(value: impl Into<String>) -> Result<Self, ValueObjectError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(ValueObjectError::Empty("connection id"));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// ConnectionId の生成
pub struct ConnectionIdFactory;

impl ConnectionIdFactory {
    /// UUID v4 で新しい ConnectionId を生成
    pub fn generate() -> ConnectionId {
        ConnectionId(uuid::Uuid::new_v4().to_string())
    }
}

/// Unix timestamp（JST, ミリ秒）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> i64 {
        self.0
    }

    /// `now` 時点で `timeout_millis` より古いか（境界値ちょうどは古くない）
    pub fn is_older_than(&self, now: Timestamp, timeout_millis: i64) -> bool {
        now.0.saturating_sub(self.0) > timeout_millis
    }
}

/// メッセージ本文
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct MessageContent(String);

impl MessageContent {
    pub fn new(value: String) -> Result<Self, ValueObjectError> {
        if value.trim().is_empty() {
            return Err(ValueObjectError::Empty("message content"));
        }
        if value.chars().count() > MAX_MESSAGE_LENGTH {
            return Err(ValueObjectError::TooLong {
                kind: "message content",
                max: MAX_MESSAGE_LENGTH,
            });
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl TryFrom<String> for MessageContent {
    type Error = ValueObjectError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// 永続化されたメッセージの ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct MessageId(u64);

impl MessageId {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}
