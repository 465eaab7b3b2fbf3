//! 私聊消息实体定义

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::value_objects::{MessageContent, MessageId, UserId};

/// 消息内容类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Image,
    Video,
    Audio,
}

impl Default for MessageKind {
    fn default() -> Self {
        MessageKind::Text
    }
}

/// 媒体附件引用
///
/// 由外部对象上传服务生成，这里只保存返回的 URL 和不透明标识。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef {
    pub url: String,
    pub public_id: String,
    /// 缩略图URL（视频/图片）
    #[serde(default)]
    pub thumbnail: Option<String>,
    /// 时长秒数（音频/视频）
    #[serde(default)]
    pub duration_secs: Option<u32>,
}

/// 私聊消息实体
///
/// 只做软删除，记录永不物理移除。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectMessage {
    /// 消息ID
    pub id: MessageId,
    /// 发送者ID
    pub sender_id: UserId,
    /// 接收者ID
    pub receiver_id: UserId,
    /// 文本内容
    pub content: String,
    /// 内容类型
    pub kind: MessageKind,
    /// 媒体附件
    pub media: Option<MediaRef>,
    /// 已读标记
    pub read: bool,
    /// 软删除标记
    pub deleted: bool,
    /// 创建时间
    pub created_at: DateTime<Utc>,
}

impl DirectMessage {
    /// 创建文本消息。内容校验（非空、长度）在 `MessageContent` 中完成。
    pub fn new_text(
        sender_id: UserId,
        receiver_id: UserId,
        content: MessageContent,
    ) -> Self {
        Self {
            id: MessageId::new(Uuid::new_v4()),
            sender_id,
            receiver_id,
            content: content.as_str().to_owned(),
            kind: MessageKind::Text,
            media: None,
            read: false,
            deleted: false,
            created_at: Utc::now(),
        }
    }

    /// 创建带媒体附件的消息
    pub fn new_media(
        sender_id: UserId,
        receiver_id: UserId,
        content: MessageContent,
        kind: MessageKind,
        media: MediaRef,
    ) -> Self {
        Self {
            id: MessageId::new(Uuid::new_v4()),
            sender_id,
            receiver_id,
            content: content.as_str().to_owned(),
            kind,
            media: Some(media),
            read: false,
            deleted: false,
            created_at: Utc::now(),
        }
    }

    /// 标记已读（幂等）。返回是否发生状态变化。
    pub fn mark_read(&mut self) -> bool {
        if self.read {
            false
        } else {
            self.read = true;
            true
        }
    }

    /// 软删除
    pub fn soft_delete(&mut self) {
        self.deleted = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mark_read_is_idempotent() {
        let sender = UserId::new(Uuid::new_v4());
        let receiver = UserId::new(Uuid::new_v4());
        let mut message = DirectMessage::new_text(
            sender,
            receiver,
            MessageContent::new("hi").unwrap(),
        );

        assert!(message.mark_read());
        assert!(!message.mark_read());
        assert!(message.read);
    }
}
