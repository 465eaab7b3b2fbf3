//! 群组管控服务
//!
//! 封禁、禁言、踢出和角色变更。权限判定全部走领域层的纯函数，
//! 这里只负责加载最新群组记录、应用变更、回写、通知当事人。
//! 被封禁/踢出的用户的所有连接会立刻被移出群房间。

use std::sync::Arc;

use domain::moderation::{can_assign_role, can_moderate};
use domain::repositories::GroupRepository;
use domain::{Group, GroupId, GroupRole, NotificationKind, UserId};
use serde_json::json;
use tracing::info;

use crate::errors::{AppResult, ApplicationError};
use crate::notifier::{NotificationRequest, Notifier};
use crate::registry::{ConnectionRegistry, RoomKey};

/// 群组管控服务
#[derive(Clone)]
pub struct GroupModerationService {
    groups: Arc<dyn GroupRepository>,
    notifier: Notifier,
    registry: ConnectionRegistry,
}

impl GroupModerationService {
    pub fn new(
        groups: Arc<dyn GroupRepository>,
        notifier: Notifier,
        registry: ConnectionRegistry,
    ) -> Self {
        Self {
            groups,
            notifier,
            registry,
        }
    }

    /// 封禁成员
    pub async fn ban(
        &self,
        group_id: GroupId,
        actor: UserId,
        target: UserId,
        reason: Option<String>,
    ) -> AppResult<Group> {
        let mut group = self.load(group_id).await?;
        self.ensure_can_moderate(&group, actor, target, "ban this member")?;

        group.ban(target, actor, reason.unwrap_or_default())?;
        self.groups.save(&group).await?;
        self.registry
            .evict_user_from_room(target, RoomKey::Group(group_id))
            .await;
        info!(group_id = %group_id, actor = %actor, target = %target, "member banned");

        self.notifier
            .deliver(NotificationRequest {
                recipient_id: target,
                sender_id: Some(actor),
                kind: NotificationKind::GroupBanned,
                message: format!("You have been banned from {}", group.name),
                link: None,
                metadata: Some(json!({ "group_id": group_id })),
            })
            .await?;
        Ok(group)
    }

    /// 解除封禁。需要 admin 及以上角色。
    pub async fn unban(&self, group_id: GroupId, actor: UserId, target: UserId) -> AppResult<Group> {
        let mut group = self.load(group_id).await?;
        let actor_role = self.require_role(&group, actor)?;
        if actor_role < GroupRole::Admin {
            return Err(ApplicationError::permission_denied("unban members"));
        }

        group.unban(target)?;
        self.groups.save(&group).await?;
        info!(group_id = %group_id, actor = %actor, target = %target, "member unbanned");

        self.notifier
            .deliver(NotificationRequest {
                recipient_id: target,
                sender_id: Some(actor),
                kind: NotificationKind::GroupUnbanned,
                message: format!("You have been unbanned from {}", group.name),
                link: None,
                metadata: Some(json!({ "group_id": group_id })),
            })
            .await?;
        Ok(group)
    }

    /// 禁言成员。`duration_minutes` 为 None 表示无限期。
    pub async fn mute(
        &self,
        group_id: GroupId,
        actor: UserId,
        target: UserId,
        duration_minutes: Option<i64>,
        reason: Option<String>,
    ) -> AppResult<Group> {
        let mut group = self.load(group_id).await?;
        self.ensure_can_moderate(&group, actor, target, "mute this member")?;

        group.mute(target, actor, duration_minutes, reason.unwrap_or_default());
        self.groups.save(&group).await?;
        info!(group_id = %group_id, actor = %actor, target = %target, "member muted");

        let message = match duration_minutes {
            Some(minutes) => format!(
                "You have been muted in {} for {} minutes",
                group.name, minutes
            ),
            None => format!("You have been muted in {} indefinitely", group.name),
        };
        self.notifier
            .deliver(NotificationRequest {
                recipient_id: target,
                sender_id: Some(actor),
                kind: NotificationKind::GroupMuted,
                message,
                link: None,
                metadata: Some(json!({ "group_id": group_id })),
            })
            .await?;
        Ok(group)
    }

    /// 解除禁言
    pub async fn unmute(
        &self,
        group_id: GroupId,
        actor: UserId,
        target: UserId,
    ) -> AppResult<Group> {
        let mut group = self.load(group_id).await?;
        self.ensure_can_moderate(&group, actor, target, "unmute this member")?;

        group.unmute(target)?;
        self.groups.save(&group).await?;
        info!(group_id = %group_id, actor = %actor, target = %target, "member unmuted");

        self.notifier
            .deliver(NotificationRequest {
                recipient_id: target,
                sender_id: Some(actor),
                kind: NotificationKind::GroupUnmuted,
                message: format!("You have been unmuted in {}", group.name),
                link: None,
                metadata: Some(json!({ "group_id": group_id })),
            })
            .await?;
        Ok(group)
    }

    /// 踢出成员（不加入封禁列表，可以重新加入）
    pub async fn kick(&self, group_id: GroupId, actor: UserId, target: UserId) -> AppResult<Group> {
        let mut group = self.load(group_id).await?;
        self.ensure_can_moderate(&group, actor, target, "kick this member")?;

        group.remove_member(target);
        self.groups.save(&group).await?;
        self.registry
            .evict_user_from_room(target, RoomKey::Group(group_id))
            .await;
        info!(group_id = %group_id, actor = %actor, target = %target, "member kicked");

        self.notifier
            .deliver(NotificationRequest {
                recipient_id: target,
                sender_id: Some(actor),
                kind: NotificationKind::GroupKicked,
                message: format!("You have been removed from {}", group.name),
                link: None,
                metadata: Some(json!({ "group_id": group_id })),
            })
            .await?;
        Ok(group)
    }

    /// 变更成员角色
    pub async fn change_role(
        &self,
        group_id: GroupId,
        actor: UserId,
        target: UserId,
        new_role: GroupRole,
    ) -> AppResult<Group> {
        let mut group = self.load(group_id).await?;
        let actor_role = self.require_role(&group, actor)?;
        let target_role = group
            .role_of(target)
            .ok_or_else(|| ApplicationError::not_found("Group member"))?;
        if !can_assign_role(actor, actor_role, target, target_role, new_role) {
            return Err(ApplicationError::permission_denied(
                "change this member's role",
            ));
        }

        group.change_role(target, new_role)?;
        self.groups.save(&group).await?;
        info!(
            group_id = %group_id, actor = %actor, target = %target, role = %new_role,
            "member role changed"
        );

        self.notifier
            .deliver(NotificationRequest {
                recipient_id: target,
                sender_id: Some(actor),
                kind: NotificationKind::GroupRoleChanged,
                message: format!("Your role in {} is now {}", group.name, new_role),
                link: None,
                metadata: Some(json!({ "group_id": group_id, "role": new_role })),
            })
            .await?;
        Ok(group)
    }

    async fn load(&self, group_id: GroupId) -> AppResult<Group> {
        self.groups
            .find_by_id(group_id)
            .await?
            .ok_or_else(|| ApplicationError::not_found("Group"))
    }

    fn require_role(&self, group: &Group, user_id: UserId) -> AppResult<GroupRole> {
        group
            .role_of(user_id)
            .ok_or(ApplicationError::NotGroupMember)
    }

    fn ensure_can_moderate(
        &self,
        group: &Group,
        actor: UserId,
        target: UserId,
        action: &str,
    ) -> AppResult<()> {
        let actor_role = self.require_role(group, actor)?;
        let target_role = group
            .role_of(target)
            .ok_or_else(|| ApplicationError::not_found("Group member"))?;
        if !can_moderate(actor, actor_role, target, target_role) {
            return Err(ApplicationError::permission_denied(action));
        }
        Ok(())
    }
}
