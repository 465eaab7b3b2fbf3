//! Repository 接口定义
//!
//! 持久化存储的窄接口。所有权限敏感的检查（好友关系、群成员、
//! 禁言状态）都必须穿透到存储层读取最新记录，不允许进程内缓存，
//! 因为管控状态可能在同一连接的两个事件之间发生变化。

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::entities::group::Group;
use crate::entities::group_message::GroupMessage;
use crate::entities::message::DirectMessage;
use crate::entities::notification::Notification;
use crate::entities::user::User;
use crate::errors::DomainResult;
use crate::value_objects::{GroupId, MessageId, NotificationId, UserId};

/// 用户Repository接口
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// 创建用户
    async fn create(&self, user: &User) -> DomainResult<User>;

    /// 根据ID查找用户
    async fn find_by_id(&self, id: UserId) -> DomainResult<Option<User>>;

    /// 判断两个用户是否互为好友（每次都读最新记录）
    async fn are_friends(&self, a: UserId, b: UserId) -> DomainResult<bool>;

    /// 建立双向好友关系（两边的好友列表都更新）
    async fn add_friendship(&self, a: UserId, b: UserId) -> DomainResult<()>;
}

/// 私聊消息Repository接口
#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// 保存消息
    async fn create(&self, message: &DirectMessage) -> DomainResult<DirectMessage>;

    /// 根据ID查找消息
    async fn find_by_id(&self, id: MessageId) -> DomainResult<Option<DirectMessage>>;

    /// 标记已读
    async fn mark_read(&self, id: MessageId) -> DomainResult<()>;

    /// 获取两个用户之间的会话消息（按时间倒序）
    async fn find_conversation(
        &self,
        a: UserId,
        b: UserId,
        limit: u32,
    ) -> DomainResult<Vec<DirectMessage>>;
}

/// 群组Repository接口
///
/// 群组记录整体读写（成员/禁言/封禁列表内嵌），`save` 覆盖保存
/// 整条记录。
#[async_trait]
pub trait GroupRepository: Send + Sync {
    /// 创建群组
    async fn create(&self, group: &Group) -> DomainResult<Group>;

    /// 根据ID查找群组
    async fn find_by_id(&self, id: GroupId) -> DomainResult<Option<Group>>;

    /// 覆盖保存群组记录
    async fn save(&self, group: &Group) -> DomainResult<()>;

    /// 记录一条新消息：更新 last_activity 并递增消息计数
    async fn touch_activity(&self, id: GroupId, at: DateTime<Utc>) -> DomainResult<()>;
}

/// 群消息Repository接口
#[async_trait]
pub trait GroupMessageRepository: Send + Sync {
    /// 保存群消息
    async fn create(&self, message: &GroupMessage) -> DomainResult<GroupMessage>;

    /// 获取群组最近消息（按时间倒序）
    async fn find_by_group(&self, group_id: GroupId, limit: u32)
        -> DomainResult<Vec<GroupMessage>>;
}

/// 通知Repository接口
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    /// 创建通知
    async fn create(&self, notification: &Notification) -> DomainResult<Notification>;

    /// 获取用户通知列表（按时间倒序）
    async fn find_by_user(&self, user_id: UserId, limit: u32) -> DomainResult<Vec<Notification>>;

    /// 标记通知为已读
    async fn mark_as_read(&self, id: NotificationId) -> DomainResult<()>;

    /// 获取未读通知数量
    async fn count_unread(&self, user_id: UserId) -> DomainResult<u64>;
}
