//! 群消息实体定义

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::message::{MediaRef, MessageKind};
use crate::value_objects::{GroupId, MessageContent, MessageId, UserId};

/// 群消息实体
///
/// 发送者在发送时刻的角色不持久化在消息记录里，只在广播事件中
/// 附带（反规范化），角色变更不会回写历史消息。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupMessage {
    /// 消息ID
    pub id: MessageId,
    /// 所属群组ID
    pub group_id: GroupId,
    /// 发送者ID
    pub sender_id: UserId,
    /// 文本内容
    pub content: String,
    /// 内容类型
    pub kind: MessageKind,
    /// 媒体附件
    pub media: Option<MediaRef>,
    /// 软删除标记
    pub deleted: bool,
    /// 创建时间
    pub created_at: DateTime<Utc>,
}

impl GroupMessage {
    /// 创建群消息
    pub fn new(
        group_id: GroupId,
        sender_id: UserId,
        content: MessageContent,
        kind: MessageKind,
        media: Option<MediaRef>,
    ) -> Self {
        Self {
            id: MessageId::new(Uuid::new_v4()),
            group_id,
            sender_id,
            content: content.as_str().to_owned(),
            kind,
            media,
            deleted: false,
            created_at: Utc::now(),
        }
    }

    /// 软删除
    pub fn soft_delete(&mut self) {
        self.deleted = true;
    }
}
