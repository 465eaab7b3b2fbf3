//! 通知实体定义
//!
//! 通知是只追加的记录，带已读/未读状态。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::value_objects::{NotificationId, UserId};

/// 通知类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    NewMessage,
    GroupBanned,
    GroupUnbanned,
    GroupMuted,
    GroupUnmuted,
    GroupKicked,
    GroupRoleChanged,
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            NotificationKind::NewMessage => "new_message",
            NotificationKind::GroupBanned => "group_banned",
            NotificationKind::GroupUnbanned => "group_unbanned",
            NotificationKind::GroupMuted => "group_muted",
            NotificationKind::GroupUnmuted => "group_unmuted",
            NotificationKind::GroupKicked => "group_kicked",
            NotificationKind::GroupRoleChanged => "group_role_changed",
        };
        f.write_str(s)
    }
}

/// 通知实体
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    /// 通知ID
    pub id: NotificationId,
    /// 接收者ID
    pub recipient_id: UserId,
    /// 触发者ID（系统通知为 None）
    pub sender_id: Option<UserId>,
    /// 通知类型
    pub kind: NotificationKind,
    /// 通知文案
    pub message: String,
    /// 跳转链接
    pub link: Option<String>,
    /// 附加元数据
    pub metadata: JsonValue,
    /// 是否已读
    pub is_read: bool,
    /// 创建时间
    pub created_at: DateTime<Utc>,
}

impl Notification {
    /// 创建新通知
    pub fn new(
        recipient_id: UserId,
        sender_id: Option<UserId>,
        kind: NotificationKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: NotificationId::new(Uuid::new_v4()),
            recipient_id,
            sender_id,
            kind,
            message: message.into(),
            link: None,
            metadata: JsonValue::Object(serde_json::Map::new()),
            is_read: false,
            created_at: Utc::now(),
        }
    }

    /// 设置跳转链接
    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }

    /// 设置元数据
    pub fn with_metadata(mut self, metadata: JsonValue) -> Self {
        self.metadata = metadata;
        self
    }

    /// 标记为已读
    pub fn mark_as_read(&mut self) {
        self.is_read = true;
    }
}
