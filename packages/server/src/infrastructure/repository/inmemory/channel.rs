//! InMemory Channel Repository 実装（Channel Registry）

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{Channel, ChannelName, ChannelRepository, Identity, RepositoryError};

/// インメモリ Channel Registry
///
/// ミュートの compare-and-set は 1 回のロック内で判定と更新を行うため、
/// Sentinel と明示的なトグルが競合しても状態遷移は 1 回だけになる。
#[derive(Default)]
pub struct InMemoryChannelRepository {
    /// Key: ChannelName（case-fold 済みキーで比較される）
    channels: Mutex<HashMap<ChannelName, Channel>>,
}

impl InMemoryChannelRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChannelRepository for InMemoryChannelRepository {
    async fn exists(&self, name: &ChannelName) -> Result<bool, RepositoryError> {
        let channels = self.channels.lock().await;
        Ok(channels.contains_key(name))
    }

    async fn get_channel(&self, name: &ChannelName) -> Result<Option<Channel>, RepositoryError> {
        let channels = self.channels.lock().await;
        Ok(channels.get(name).cloned())
    }

    async fn list_channels(&self) -> Result<Vec<Channel>, RepositoryError> {
        let channels = self.channels.lock().await;
        let mut list: Vec<Channel> = channels.values().cloned().collect();
        list.sort_by(|a, b| a.name.key().cmp(b.name.key()));
        Ok(list)
    }

    async fn list_unmuted(&self) -> Result<Vec<Channel>, RepositoryError> {
        let channels = self.channels.lock().await;
        Ok(channels.values().filter(|c| !c.is_muted).cloned().collect())
    }

    async fn create_channel(&self, channel: Channel) -> Result<(), RepositoryError> {
        let mut channels = self.channels.lock().await;
        if channels.contains_key(&channel.name) {
            return Err(RepositoryError::ChannelAlreadyExists(
                channel.name.into_string(),
            ));
        }
        channels.insert(channel.name.clone(), channel);
        Ok(())
    }

    async fn delete_channel(&self, name: &ChannelName) -> Result<Option<Channel>, RepositoryError> {
        let mut channels = self.channels.lock().await;
        Ok(channels.remove(name))
    }

    async fn set_muted(&self, name: &ChannelName, muted: bool) -> Result<bool, RepositoryError> {
        let mut channels = self.channels.lock().await;
        let channel = channels
            .get_mut(name)
            .ok_or_else(|| RepositoryError::ChannelNotFound(name.to_string()))?;
        let changed = channel.is_muted != muted;
        channel.is_muted = muted;
        Ok(changed)
    }

    async fn mute_if_unmuted(&self, name: &ChannelName) -> Result<bool, RepositoryError> {
        let mut channels = self.channels.lock().await;
        match channels.get_mut(name) {
            Some(channel) if !channel.is_muted => {
                channel.is_muted = true;
                Ok(true)
            }
            // 既にミュート済み、あるいはスキャン後に削除された
            _ => Ok(false),
        }
    }

    async fn set_active_manager(
        &self,
        name: &ChannelName,
        manager: Option<Identity>,
    ) -> Result<(), RepositoryError> {
        let mut channels = self.channels.lock().await;
        let channel = channels
            .get_mut(name)
            .ok_or_else(|| RepositoryError::ChannelNotFound(name.to_string()))?;
        channel.active_manager = manager;
        Ok(())
    }
}
