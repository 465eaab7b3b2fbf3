//! 群组实体定义
//!
//! 群组聚合了成员列表、禁言列表和封禁列表，成员关系和管理状态
//! 都内嵌在群组记录中，整条记录是业务不变量的一致性单元。

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{DomainError, DomainResult};
use crate::value_objects::{GroupId, UserId};

/// 群组角色，层级全序：creator > admin > moderator > member。
///
/// `Ord` 的派生顺序就是权限层级，管控判定只依赖这个顺序。
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum GroupRole {
    Member,
    Moderator,
    Admin,
    Creator,
}

impl std::fmt::Display for GroupRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GroupRole::Creator => write!(f, "creator"),
            GroupRole::Admin => write!(f, "admin"),
            GroupRole::Moderator => write!(f, "moderator"),
            GroupRole::Member => write!(f, "member"),
        }
    }
}

/// 群组成员
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupMember {
    /// 成员用户ID
    pub user_id: UserId,
    /// 成员角色
    pub role: GroupRole,
    /// 加入时间
    pub joined_at: DateTime<Utc>,
}

/// 禁言记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MutedMember {
    /// 被禁言的用户
    pub user_id: UserId,
    /// 执行禁言的用户
    pub muted_by: UserId,
    /// 禁言时间
    pub muted_at: DateTime<Utc>,
    /// 禁言截止时间，None 表示无限期
    pub muted_until: Option<DateTime<Utc>>,
    /// 禁言原因
    pub reason: String,
}

impl MutedMember {
    /// 禁言是否已过期（无限期禁言永不过期）
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.muted_until {
            Some(until) => now > until,
            None => false,
        }
    }
}

/// 封禁记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BannedMember {
    /// 被封禁的用户
    pub user_id: UserId,
    /// 执行封禁的用户
    pub banned_by: UserId,
    /// 封禁时间
    pub banned_at: DateTime<Utc>,
    /// 封禁原因
    pub reason: String,
}

/// 群组实体
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    /// 群组ID
    pub id: GroupId,
    /// 群组名称
    pub name: String,
    /// 群组描述
    pub description: Option<String>,
    /// 创建者ID，创建后永不变更
    pub creator_id: UserId,
    /// 成员列表（含创建者）
    pub members: Vec<GroupMember>,
    /// 禁言列表
    pub muted_members: Vec<MutedMember>,
    /// 封禁列表
    pub banned_members: Vec<BannedMember>,
    /// 最近活跃时间，发群消息时更新
    pub last_activity: DateTime<Utc>,
    /// 群消息总数
    pub message_count: u64,
    /// 创建时间
    pub created_at: DateTime<Utc>,
}

impl Group {
    /// 创建新群组。创建者自动成为唯一的 creator 成员。
    pub fn new(name: impl Into<String>, description: Option<String>, creator_id: UserId) -> DomainResult<Self> {
        let name = name.into().trim().to_owned();
        if name.is_empty() {
            return Err(DomainError::validation_error("name", "cannot be empty"));
        }
        if name.chars().count() > 50 {
            return Err(DomainError::validation_error("name", "too long"));
        }

        let now = Utc::now();
        Ok(Self {
            id: GroupId::new(Uuid::new_v4()),
            name,
            description,
            creator_id,
            members: vec![GroupMember {
                user_id: creator_id,
                role: GroupRole::Creator,
                joined_at: now,
            }],
            muted_members: Vec::new(),
            banned_members: Vec::new(),
            last_activity: now,
            message_count: 0,
            created_at: now,
        })
    }

    /// 查找成员记录
    pub fn member(&self, user_id: UserId) -> Option<&GroupMember> {
        self.members.iter().find(|m| m.user_id == user_id)
    }

    /// 获取成员角色，非成员返回 None
    pub fn role_of(&self, user_id: UserId) -> Option<GroupRole> {
        self.member(user_id).map(|m| m.role)
    }

    /// 是否为群组成员
    pub fn is_member(&self, user_id: UserId) -> bool {
        self.member(user_id).is_some()
    }

    /// 是否已被封禁
    pub fn is_banned(&self, user_id: UserId) -> bool {
        self.banned_members.iter().any(|b| b.user_id == user_id)
    }

    /// 查找禁言记录
    pub fn mute_entry(&self, user_id: UserId) -> Option<&MutedMember> {
        self.muted_members.iter().find(|m| m.user_id == user_id)
    }

    /// 添加普通成员。已是成员或已被封禁时拒绝。
    pub fn add_member(&mut self, user_id: UserId) -> DomainResult<()> {
        if self.is_member(user_id) {
            return Err(DomainError::resource_already_exists(
                "group_member",
                user_id.to_string(),
            ));
        }
        if self.is_banned(user_id) {
            return Err(DomainError::permission_denied("join banned group"));
        }
        self.members.push(GroupMember {
            user_id,
            role: GroupRole::Member,
            joined_at: Utc::now(),
        });
        Ok(())
    }

    /// 从成员列表中移除（踢出/封禁共用），同时清掉禁言记录。
    pub fn remove_member(&mut self, user_id: UserId) {
        self.members.retain(|m| m.user_id != user_id);
        self.muted_members.retain(|m| m.user_id != user_id);
    }

    /// 封禁用户：移出成员列表并加入封禁列表。
    pub fn ban(&mut self, target: UserId, banned_by: UserId, reason: impl Into<String>) -> DomainResult<()> {
        if self.is_banned(target) {
            return Err(DomainError::resource_already_exists(
                "banned_member",
                target.to_string(),
            ));
        }
        self.remove_member(target);
        self.banned_members.push(BannedMember {
            user_id: target,
            banned_by,
            banned_at: Utc::now(),
            reason: reason.into(),
        });
        Ok(())
    }

    /// 解除封禁
    pub fn unban(&mut self, target: UserId) -> DomainResult<()> {
        let before = self.banned_members.len();
        self.banned_members.retain(|b| b.user_id != target);
        if self.banned_members.len() == before {
            return Err(DomainError::resource_not_found(
                "banned_member",
                target.to_string(),
            ));
        }
        Ok(())
    }

    /// 禁言用户。重复禁言时覆盖原有记录（更新时长和原因）。
    pub fn mute(
        &mut self,
        target: UserId,
        muted_by: UserId,
        duration_minutes: Option<i64>,
        reason: impl Into<String>,
    ) {
        let now = Utc::now();
        let muted_until = duration_minutes.map(|minutes| now + Duration::minutes(minutes));
        let reason = reason.into();

        if let Some(existing) = self.muted_members.iter_mut().find(|m| m.user_id == target) {
            existing.muted_by = muted_by;
            existing.muted_at = now;
            existing.muted_until = muted_until;
            existing.reason = reason;
        } else {
            self.muted_members.push(MutedMember {
                user_id: target,
                muted_by,
                muted_at: now,
                muted_until,
                reason,
            });
        }
    }

    /// 解除禁言
    pub fn unmute(&mut self, target: UserId) -> DomainResult<()> {
        let before = self.muted_members.len();
        self.muted_members.retain(|m| m.user_id != target);
        if self.muted_members.len() == before {
            return Err(DomainError::resource_not_found(
                "muted_member",
                target.to_string(),
            ));
        }
        Ok(())
    }

    /// 移除已过期的禁言记录，返回是否有变化。
    ///
    /// 过期禁言采用惰性清理：只在下一次禁言检查时移除，
    /// 不做后台定时扫描。
    pub fn compact_expired_mutes(&mut self, now: DateTime<Utc>) -> bool {
        let before = self.muted_members.len();
        self.muted_members.retain(|m| !m.is_expired(now));
        self.muted_members.len() != before
    }

    /// 变更成员角色。creator 角色不可通过此方法赋予或移除。
    pub fn change_role(&mut self, target: UserId, new_role: GroupRole) -> DomainResult<()> {
        let member = self
            .members
            .iter_mut()
            .find(|m| m.user_id == target)
            .ok_or_else(|| DomainError::resource_not_found("group_member", target.to_string()))?;

        if member.role == GroupRole::Creator || new_role == GroupRole::Creator {
            return Err(DomainError::business_rule_violation(
                "creator role cannot be assigned or removed",
            ));
        }

        member.role = new_role;
        Ok(())
    }

    /// 记录一条新群消息：更新活跃时间和消息计数。
    pub fn record_message(&mut self, now: DateTime<Utc>) {
        self.last_activity = now;
        self.message_count += 1;
    }
}
