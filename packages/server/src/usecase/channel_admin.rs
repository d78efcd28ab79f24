//! チャンネル管理
//!
//! Hub の外側にある管理 API（HTTP）から呼ばれる操作。
//! 作成・削除・ミュート切り替え・マネージャー変更と、その通知を担う。
//! 変更系の操作は作成者か特権 Identity にしか許可しない。

use std::sync::Arc;

use crate::{
    domain::{
        Channel, ChannelMessage, ChannelName, ChannelRepository, Connection, ConnectionRepository,
        HubEvent, Identity, ValueObjectError,
    },
    usecase::{error::ChannelAdminError, hub::PresenceHub},
};

/// チャンネル説明文の上限（文字数）
pub const MAX_DESCRIPTION_LENGTH: usize = 256;

/// 履歴取得の件数の上限
pub const MAX_HISTORY_LIMIT: usize = 100;

/// 一覧表示用のチャンネルと参加者数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSummary {
    pub channel: Channel,
    pub member_count: usize,
}

pub struct ChannelAdminUseCase {
    channels: Arc<dyn ChannelRepository>,
    connections: Arc<dyn ConnectionRepository>,
    hub: Arc<PresenceHub>,
}

impl ChannelAdminUseCase {
    pub fn new(
        channels: Arc<dyn ChannelRepository>,
        connections: Arc<dyn ConnectionRepository>,
        hub: Arc<PresenceHub>,
    ) -> Self {
        Self {
            channels,
            connections,
            hub,
        }
    }

    pub async fn create_channel(
        &self,
        name: &str,
        creator: &str,
        description: Option<String>,
    ) -> Result<Channel, ChannelAdminError> {
        let name = ChannelName::new(name)?;
        let creator = Identity::new(creator)?;
        let description = normalize_description(description)?;

        let channel = Channel::new(name, creator, description, self.hub.now());
        self.hub
            .bounded(self.channels.create_channel(channel.clone()))
            .await?;
        tracing::info!(channel = %channel.name, creator = %channel.creator, "Channel created");

        self.hub
            .router()
            .send_to_all(&HubEvent::ChannelListUpdated)
            .await;
        Ok(channel)
    }

    /// チャンネルを削除する。参加中の接続は全て退出させる
    pub async fn delete_channel(&self, name: &str, actor: &str) -> Result<Channel, ChannelAdminError> {
        let (channel, actor) = self.authorize(name, actor).await?;

        let Some(deleted) = self
            .hub
            .bounded(self.channels.delete_channel(&channel.name))
            .await?
        else {
            return Err(ChannelAdminError::ChannelNotFound(channel.name.to_string()));
        };
        self.hub.evacuate_channel(&deleted.name, &actor).await?;
        tracing::info!(channel = %deleted.name, actor = %actor, "Channel deleted");

        self.hub
            .router()
            .send_to_all(&HubEvent::ChannelListUpdated)
            .await;
        Ok(deleted)
    }

    /// ミュート状態を切り替える。状態が変わった場合だけグループへ通知する
    pub async fn set_muted(
        &self,
        name: &str,
        actor: &str,
        muted: bool,
    ) -> Result<Channel, ChannelAdminError> {
        let (channel, actor) = self.authorize(name, actor).await?;

        let changed = self
            .hub
            .bounded(self.channels.set_muted(&channel.name, muted))
            .await?;
        if changed {
            tracing::info!(channel = %channel.name, actor = %actor, muted, "Mute status changed");
            let event = HubEvent::ChannelMuteStatusChanged {
                channel: channel.name.clone(),
                muted,
            };
            self.hub.send_to_group(&channel.name, &event).await;
        }
        self.require_channel(&channel.name).await
    }

    /// マネージャーを設定する（`None` で作成者に戻す）
    pub async fn set_active_manager(
        &self,
        name: &str,
        actor: &str,
        manager: Option<&str>,
    ) -> Result<Channel, ChannelAdminError> {
        let (channel, actor) = self.authorize(name, actor).await?;
        let manager = manager.map(Identity::new).transpose()?;

        self.hub
            .bounded(
                self.channels
                    .set_active_manager(&channel.name, manager.clone()),
            )
            .await?;
        tracing::info!(
            channel = %channel.name,
            actor = %actor,
            manager = manager.as_ref().map(|m| m.as_str()).unwrap_or("<creator>"),
            "Active manager changed"
        );
        self.require_channel(&channel.name).await
    }

    pub async fn list_channels(&self) -> Result<Vec<ChannelSummary>, ChannelAdminError> {
        let channels = self.hub.bounded(self.channels.list_channels()).await?;
        let mut summaries = Vec::with_capacity(channels.len());
        for channel in channels {
            let member_count = self.hub.roster(&channel.name).await?.len();
            summaries.push(ChannelSummary {
                channel,
                member_count,
            });
        }
        Ok(summaries)
    }

    /// チャンネルと参加者一覧
    pub async fn channel_detail(
        &self,
        name: &str,
    ) -> Result<(Channel, Vec<Identity>), ChannelAdminError> {
        let name = ChannelName::new(name)
            .map_err(|_| ChannelAdminError::ChannelNotFound(name.to_string()))?;
        let channel = self.require_channel(&name).await?;
        let members = self.hub.roster(&channel.name).await?;
        Ok((channel, members))
    }

    /// チャンネルの直近の投稿（古い順、最大 `MAX_HISTORY_LIMIT` 件）
    pub async fn channel_history(
        &self,
        name: &str,
        limit: usize,
    ) -> Result<Vec<ChannelMessage>, ChannelAdminError> {
        let name = ChannelName::new(name)
            .map_err(|_| ChannelAdminError::ChannelNotFound(name.to_string()))?;
        if !self.hub.bounded(self.channels.exists(&name)).await? {
            return Err(ChannelAdminError::ChannelNotFound(name.to_string()));
        }
        let limit = limit.min(MAX_HISTORY_LIMIT);
        Ok(self.hub.channel_history(&name, limit).await?)
    }

    /// Presence Store の全接続（デバッグ用）
    pub async fn list_connections(&self) -> Result<Vec<Connection>, ChannelAdminError> {
        let mut connections = self.hub.bounded(self.connections.list_all()).await?;
        connections.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(connections)
    }

    async fn require_channel(&self, name: &ChannelName) -> Result<Channel, ChannelAdminError> {
        self.hub
            .bounded(self.channels.get_channel(name))
            .await?
            .ok_or_else(|| ChannelAdminError::ChannelNotFound(name.to_string()))
    }

    /// 作成者か特権 Identity であることを確かめる
    async fn authorize(
        &self,
        name: &str,
        actor: &str,
    ) -> Result<(Channel, Identity), ChannelAdminError> {
        let name = ChannelName::new(name)
            .map_err(|_| ChannelAdminError::ChannelNotFound(name.to_string()))?;
        let actor = Identity::new(actor)?;
        let channel = self.require_channel(&name).await?;

        if channel.is_creator(&actor) || self.hub.is_privileged(&actor, &channel.name).await {
            Ok((channel, actor))
        } else {
            tracing::info!(channel = %channel.name, actor = %actor, "Channel admin action forbidden");
            Err(ChannelAdminError::Forbidden {
                actor: actor.to_string(),
                channel: channel.name.to_string(),
            })
        }
    }
}

fn normalize_description(
    description: Option<String>,
) -> Result<Option<String>, ValueObjectError> {
    let Some(description) = description else {
        return Ok(None);
    };
    let trimmed = description.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if trimmed.chars().count() > MAX_DESCRIPTION_LENGTH {
        return Err(ValueObjectError::TooLong {
            kind: "description",
            max: MAX_DESCRIPTION_LENGTH,
        });
    }
    Ok(Some(trimmed.to_string()))
}
