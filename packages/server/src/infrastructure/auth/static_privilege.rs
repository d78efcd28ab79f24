//! 起動時に与えられた管理者リストで判定する PrivilegeChecker

use std::collections::HashSet;

use async_trait::async_trait;

use crate::domain::{ChannelName, Identity, PrivilegeChecker};

/// 設定で列挙された Identity を全チャンネルの特権ユーザーとして扱う
#[derive(Debug, Default, Clone)]
pub struct StaticPrivilegeChecker {
    admins: HashSet<Identity>,
}

impl StaticPrivilegeChecker {
    pub fn new(admins: impl IntoIterator<Item = Identity>) -> Self {
        Self {
            admins: admins.into_iter().collect(),
        }
    }
}

#[async_trait]
impl PrivilegeChecker for StaticPrivilegeChecker {
    async fn is_privileged(&self, identity: &Identity, _channel: &ChannelName) -> bool {
        self.admins.contains(identity)
    }
}
