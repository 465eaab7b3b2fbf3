//! 房间成员关系与禁言检查
//!
//! 每次检查都从存储层读取最新记录，不做进程内缓存：封禁、踢出、
//! 禁言都可能发生在同一条连接的两个事件之间。过期的禁言记录在
//! 检查时惰性清理并回写。

use std::sync::Arc;

use chrono::Utc;
use domain::repositories::{GroupRepository, UserRepository};
use domain::{Group, GroupId, GroupRole, UserId};
use tracing::debug;

use crate::errors::{AppResult, ApplicationError, MuteNotice};

/// 成员关系解析器
#[derive(Clone)]
pub struct MembershipResolver {
    users: Arc<dyn UserRepository>,
    groups: Arc<dyn GroupRepository>,
}

impl MembershipResolver {
    pub fn new(users: Arc<dyn UserRepository>, groups: Arc<dyn GroupRepository>) -> Self {
        Self { users, groups }
    }

    /// 校验双方互为好友
    pub async fn ensure_friends(&self, sender: UserId, receiver: UserId) -> AppResult<()> {
        if self.users.are_friends(sender, receiver).await? {
            Ok(())
        } else {
            Err(ApplicationError::NotFriends)
        }
    }

    /// 加载群组，不存在则报错
    pub async fn load_group(&self, group_id: GroupId) -> AppResult<Group> {
        self.groups
            .find_by_id(group_id)
            .await?
            .ok_or_else(|| ApplicationError::not_found("Group"))
    }

    /// 校验用户是群成员，返回其角色
    pub async fn require_member(&self, group_id: GroupId, user_id: UserId) -> AppResult<GroupRole> {
        let group = self.load_group(group_id).await?;
        group
            .role_of(user_id)
            .ok_or(ApplicationError::NotGroupMember)
    }

    /// 校验用户可以在群里发言：是成员且未被禁言
    ///
    /// 过期禁言在这里清理并回写，之后的读取不会再看到它。
    pub async fn ensure_can_post(&self, group_id: GroupId, user_id: UserId) -> AppResult<GroupRole> {
        let now = Utc::now();
        let mut group = self.load_group(group_id).await?;
        let role = group
            .role_of(user_id)
            .ok_or(ApplicationError::NotGroupMember)?;

        if group.compact_expired_mutes(now) {
            debug!(group_id = %group_id, "removed expired mutes");
            self.groups.save(&group).await?;
        }

        if let Some(entry) = group.mute_entry(user_id) {
            return Err(ApplicationError::Muted(MuteNotice::from_deadline(
                entry.muted_until,
                now,
            )));
        }
        Ok(role)
    }
}
