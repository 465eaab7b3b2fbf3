//! 在线状态广播
//!
//! 上线/下线事件只发给当事人的好友，不做全站广播。事件由注册表
//! 的绑定/注销结果驱动：第一条连接上线、最后一条连接下线时才
//! 各广播一次。

use std::sync::Arc;

use domain::repositories::UserRepository;
use domain::UserId;
use tracing::warn;

use crate::errors::AppResult;
use crate::events::ServerEvent;
use crate::registry::ConnectionRegistry;

/// 在线状态广播器
#[derive(Clone)]
pub struct PresenceBroadcaster {
    registry: ConnectionRegistry,
    users: Arc<dyn UserRepository>,
}

impl PresenceBroadcaster {
    pub fn new(registry: ConnectionRegistry, users: Arc<dyn UserRepository>) -> Self {
        Self { registry, users }
    }

    /// 向好友广播上线事件
    pub async fn announce_online(&self, user_id: UserId) -> AppResult<()> {
        self.fanout(user_id, ServerEvent::UserOnline { user_id })
            .await
    }

    /// 向好友广播下线事件
    pub async fn announce_offline(&self, user_id: UserId) -> AppResult<()> {
        self.fanout(user_id, ServerEvent::UserOffline { user_id })
            .await
    }

    async fn fanout(&self, user_id: UserId, event: ServerEvent) -> AppResult<()> {
        let Some(user) = self.users.find_by_id(user_id).await? else {
            // 连接方声称的身份在存储里不存在，跳过广播
            warn!(user_id = %user_id, "presence fanout for unknown user");
            return Ok(());
        };
        for friend_id in user.friends {
            self.registry.send_to_user(friend_id, event.clone()).await;
        }
        Ok(())
    }
}
