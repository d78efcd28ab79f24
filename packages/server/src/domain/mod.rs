//! Domain 層
//!
//! Entity / Value Object / イベント、および外部コラボレーターへの
//! インターフェース（Repository, MessagePusher）を定義します。

pub mod entity;
pub mod error;
pub mod event;
pub mod pusher;
pub mod repository;
pub mod value_object;

pub use entity::{Channel, ChannelMessage, Connection, DirectMessage};
pub use error::{MessagePushError, RepositoryError, ValueObjectError};
pub use event::HubEvent;
pub use pusher::{MessagePusher, PusherChannel};
pub use repository::{ChannelRepository, ConnectionRepository, MessageRepository, PrivilegeChecker};
pub use value_object::{
    ChannelName, ConnectionId, ConnectionIdFactory, Identity, MessageContent, MessageId, Timestamp,
};
