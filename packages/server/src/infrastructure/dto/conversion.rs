//! Conversion logic between DTOs and domain entities.

use hiroba_shared::time::timestamp_to_jst_rfc3339;

use crate::domain::{Channel, ChannelMessage, Connection, DirectMessage, HubEvent, Identity};
use crate::infrastructure::dto::{http, websocket as dto};

// ========================================
// Domain → WebSocket DTO
// ========================================

impl From<&ChannelMessage> for dto::ChannelMessageDto {
    fn from(model: &ChannelMessage) -> Self {
        Self {
            id: model.id.value(),
            channel: model.channel.to_string(),
            from: model.from.to_string(),
            content: model.content.as_str().to_string(),
            timestamp: model.timestamp.value(),
        }
    }
}

impl From<&DirectMessage> for dto::DirectMessageDto {
    fn from(model: &DirectMessage) -> Self {
        Self {
            id: model.id.value(),
            from: model.from.to_string(),
            to: model.to.to_string(),
            content: model.content.as_str().to_string(),
            timestamp: model.timestamp.value(),
            is_read: model.is_read,
        }
    }
}

fn names(identities: &[Identity]) -> Vec<String> {
    identities.iter().map(ToString::to_string).collect()
}

impl From<&HubEvent> for dto::ServerMessage {
    fn from(event: &HubEvent) -> Self {
        match event {
            HubEvent::Connected { connection_id } => Self::Connected {
                connection_id: connection_id.to_string(),
            },
            HubEvent::UserJoined { identity, channel } => Self::UserJoined {
                identity: identity.to_string(),
                channel: channel.to_string(),
            },
            HubEvent::UserLeft { identity, channel } => Self::UserLeft {
                identity: identity.to_string(),
                channel: channel.to_string(),
            },
            HubEvent::UpdateUserList { channel, users } => Self::UpdateUserList {
                channel: channel.to_string(),
                users: names(users),
            },
            HubEvent::ChannelMuteStatusChanged { channel, muted } => {
                Self::ChannelMuteStatusChanged {
                    channel: channel.to_string(),
                    muted: *muted,
                }
            }
            HubEvent::ChannelNotFound { channel } => Self::ChannelNotFound {
                channel: channel.clone(),
            },
            HubEvent::MessageBlocked { reason } => Self::MessageBlocked {
                reason: reason.clone(),
            },
            HubEvent::ReceiveMessage { message } => Self::ReceiveMessage {
                message: message.into(),
            },
            HubEvent::ReceivePrivateMessage { message } => Self::ReceivePrivateMessage {
                message: message.into(),
            },
            HubEvent::PrivateMessageSent { message } => Self::PrivateMessageSent {
                message: message.into(),
            },
            HubEvent::PrivateMessagesRead { reader, ids } => Self::PrivateMessagesRead {
                reader: reader.to_string(),
                ids: ids.iter().map(|id| id.value()).collect(),
            },
            HubEvent::UserStatusChanged { identity, online } => Self::UserStatusChanged {
                identity: identity.to_string(),
                online: *online,
            },
            HubEvent::ChannelDeleted { channel, actor } => Self::ChannelDeleted {
                channel: channel.to_string(),
                actor: actor.to_string(),
            },
            HubEvent::ChannelListUpdated => Self::ChannelListUpdated,
        }
    }
}

// ========================================
// Domain → HTTP DTO
// ========================================

impl From<&Connection> for http::ConnectionDto {
    fn from(model: &Connection) -> Self {
        Self {
            connection_id: model.id.to_string(),
            identity: model.identity.to_string(),
            channel: model.channel.as_ref().map(ToString::to_string),
            last_activity: timestamp_to_jst_rfc3339(model.last_activity.value()),
            owner_instance: model.owner_instance.clone(),
        }
    }
}

impl http::ChannelDetailDto {
    pub fn from_channel(channel: &Channel, members: &[Identity]) -> Self {
        Self {
            name: channel.name.to_string(),
            creator: channel.creator.to_string(),
            active_manager: channel.active_manager.as_ref().map(ToString::to_string),
            is_muted: channel.is_muted,
            description: channel.description.clone(),
            created_at: timestamp_to_jst_rfc3339(channel.created_at.value()),
            members: names(members),
        }
    }
}

impl http::ChannelSummaryDto {
    pub fn from_channel(channel: &Channel, member_count: usize) -> Self {
        Self {
            name: channel.name.to_string(),
            creator: channel.creator.to_string(),
            is_muted: channel.is_muted,
            member_count,
        }
    }
}
