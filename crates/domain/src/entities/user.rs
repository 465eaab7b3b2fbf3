//! 用户实体定义

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{DomainError, DomainResult};
use crate::value_objects::UserId;

/// 用户实体
///
/// 好友关系是对称的：A 在 B 的好友列表里当且仅当 B 也在 A 的
/// 列表里，私聊消息只允许在互为好友的用户间发送。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// 用户ID
    pub id: UserId,
    /// 用户名
    pub username: String,
    /// 邮箱
    pub email: String,
    /// 头像URL
    pub avatar_url: Option<String>,
    /// 好友ID列表
    pub friends: Vec<UserId>,
    /// 创建时间
    pub created_at: DateTime<Utc>,
}

impl User {
    /// 创建新用户
    pub fn new(username: impl Into<String>, email: impl Into<String>) -> DomainResult<Self> {
        let username = username.into().trim().to_owned();
        if username.is_empty() {
            return Err(DomainError::validation_error("username", "cannot be empty"));
        }
        if username.chars().count() > 50 {
            return Err(DomainError::validation_error("username", "too long"));
        }
        let email = email.into().trim().to_owned();
        if !email.contains('@') {
            return Err(DomainError::validation_error("email", "must contain '@'"));
        }

        Ok(Self {
            id: UserId::new(Uuid::new_v4()),
            username,
            email,
            avatar_url: None,
            friends: Vec::new(),
            created_at: Utc::now(),
        })
    }

    /// 是否与指定用户互为好友（从本方列表判断）
    pub fn is_friend(&self, other: UserId) -> bool {
        self.friends.contains(&other)
    }

    /// 添加好友（幂等）
    pub fn add_friend(&mut self, other: UserId) {
        if !self.friends.contains(&other) {
            self.friends.push(other);
        }
    }
}
