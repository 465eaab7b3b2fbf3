//! 内存版 Repository 实现
//!
//! 未配置数据库时的退路实现，进程重启即丢失。事件分发的场景
//! 测试也基于这套实现。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::repositories::{
    GroupMessageRepository, GroupRepository, MessageRepository, NotificationRepository,
    UserRepository,
};
use domain::{
    DirectMessage, DomainError, DomainResult, Group, GroupId, GroupMessage, MessageId,
    Notification, NotificationId, User, UserId,
};
use tokio::sync::RwLock;

/// 内存用户存储
#[derive(Default)]
pub struct MemoryUserRepository {
    users: Arc<RwLock<HashMap<UserId, User>>>,
}

impl MemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn create(&self, user: &User) -> DomainResult<User> {
        let mut users = self.users.write().await;
        if users.contains_key(&user.id) {
            return Err(DomainError::resource_already_exists(
                "user",
                user.id.to_string(),
            ));
        }
        users.insert(user.id, user.clone());
        Ok(user.clone())
    }

    async fn find_by_id(&self, id: UserId) -> DomainResult<Option<User>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn are_friends(&self, a: UserId, b: UserId) -> DomainResult<bool> {
        let users = self.users.read().await;
        Ok(users.get(&a).is_some_and(|user| user.is_friend(b)))
    }

    async fn add_friendship(&self, a: UserId, b: UserId) -> DomainResult<()> {
        let mut users = self.users.write().await;
        if let Some(user) = users.get_mut(&a) {
            user.add_friend(b);
        }
        if let Some(user) = users.get_mut(&b) {
            user.add_friend(a);
        }
        Ok(())
    }
}

/// 内存私聊消息存储
#[derive(Default)]
pub struct MemoryMessageRepository {
    messages: Arc<RwLock<HashMap<MessageId, DirectMessage>>>,
}

impl MemoryMessageRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageRepository for MemoryMessageRepository {
    async fn create(&self, message: &DirectMessage) -> DomainResult<DirectMessage> {
        self.messages
            .write()
            .await
            .insert(message.id, message.clone());
        Ok(message.clone())
    }

    async fn find_by_id(&self, id: MessageId) -> DomainResult<Option<DirectMessage>> {
        Ok(self.messages.read().await.get(&id).cloned())
    }

    async fn mark_read(&self, id: MessageId) -> DomainResult<()> {
        let mut messages = self.messages.write().await;
        let message = messages
            .get_mut(&id)
            .ok_or_else(|| DomainError::resource_not_found("message", id.to_string()))?;
        message.mark_read();
        Ok(())
    }

    async fn find_conversation(
        &self,
        a: UserId,
        b: UserId,
        limit: u32,
    ) -> DomainResult<Vec<DirectMessage>> {
        let messages = self.messages.read().await;
        let mut result: Vec<DirectMessage> = messages
            .values()
            .filter(|m| {
                !m.deleted
                    && ((m.sender_id == a && m.receiver_id == b)
                        || (m.sender_id == b && m.receiver_id == a))
            })
            .cloned()
            .collect();
        result.sort_by(|x, y| y.created_at.cmp(&x.created_at));
        result.truncate(limit as usize);
        Ok(result)
    }
}

/// 内存群组存储
#[derive(Default)]
pub struct MemoryGroupRepository {
    groups: Arc<RwLock<HashMap<GroupId, Group>>>,
}

impl MemoryGroupRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GroupRepository for MemoryGroupRepository {
    async fn create(&self, group: &Group) -> DomainResult<Group> {
        let mut groups = self.groups.write().await;
        if groups.contains_key(&group.id) {
            return Err(DomainError::resource_already_exists(
                "group",
                group.id.to_string(),
            ));
        }
        groups.insert(group.id, group.clone());
        Ok(group.clone())
    }

    async fn find_by_id(&self, id: GroupId) -> DomainResult<Option<Group>> {
        Ok(self.groups.read().await.get(&id).cloned())
    }

    async fn save(&self, group: &Group) -> DomainResult<()> {
        self.groups.write().await.insert(group.id, group.clone());
        Ok(())
    }

    async fn touch_activity(&self, id: GroupId, at: DateTime<Utc>) -> DomainResult<()> {
        let mut groups = self.groups.write().await;
        let group = groups
            .get_mut(&id)
            .ok_or_else(|| DomainError::resource_not_found("group", id.to_string()))?;
        group.record_message(at);
        Ok(())
    }
}

/// 内存群消息存储
#[derive(Default)]
pub struct MemoryGroupMessageRepository {
    messages: Arc<RwLock<Vec<GroupMessage>>>,
}

impl MemoryGroupMessageRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GroupMessageRepository for MemoryGroupMessageRepository {
    async fn create(&self, message: &GroupMessage) -> DomainResult<GroupMessage> {
        self.messages.write().await.push(message.clone());
        Ok(message.clone())
    }

    async fn find_by_group(
        &self,
        group_id: GroupId,
        limit: u32,
    ) -> DomainResult<Vec<GroupMessage>> {
        let messages = self.messages.read().await;
        let mut result: Vec<GroupMessage> = messages
            .iter()
            .filter(|m| m.group_id == group_id && !m.deleted)
            .cloned()
            .collect();
        result.sort_by(|x, y| y.created_at.cmp(&x.created_at));
        result.truncate(limit as usize);
        Ok(result)
    }
}

/// 内存通知存储
#[derive(Default)]
pub struct MemoryNotificationRepository {
    notifications: Arc<RwLock<Vec<Notification>>>,
}

impl MemoryNotificationRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NotificationRepository for MemoryNotificationRepository {
    async fn create(&self, notification: &Notification) -> DomainResult<Notification> {
        self.notifications.write().await.push(notification.clone());
        Ok(notification.clone())
    }

    async fn find_by_user(&self, user_id: UserId, limit: u32) -> DomainResult<Vec<Notification>> {
        let notifications = self.notifications.read().await;
        let mut result: Vec<Notification> = notifications
            .iter()
            .filter(|n| n.recipient_id == user_id)
            .cloned()
            .collect();
        result.sort_by(|x, y| y.created_at.cmp(&x.created_at));
        result.truncate(limit as usize);
        Ok(result)
    }

    async fn mark_as_read(&self, id: NotificationId) -> DomainResult<()> {
        let mut notifications = self.notifications.write().await;
        let notification = notifications
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| DomainError::resource_not_found("notification", id.to_string()))?;
        notification.mark_as_read();
        Ok(())
    }

    async fn count_unread(&self, user_id: UserId) -> DomainResult<u64> {
        let notifications = self.notifications.read().await;
        Ok(notifications
            .iter()
            .filter(|n| n.recipient_id == user_id && !n.is_read)
            .count() as u64)
    }
}
