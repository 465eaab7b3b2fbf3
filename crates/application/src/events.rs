//! WebSocket 事件协议定义
//!
//! 客户端与服务端各有一个封闭的事件枚举，`event` 字段做标签，
//! 事件名和字段名统一 snake_case。未知事件在反序列化阶段直接
//! 失败，由连接层回发 `error` 事件。

use domain::{
    DirectMessage, GroupId, GroupMessage, GroupRole, MediaRef, MessageId, MessageKind,
    Notification, UserId,
};
use serde::{Deserialize, Serialize};

/// 客户端上行事件
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ClientEvent {
    /// 绑定连接身份，必须是连接上的第一个事件
    Join { user_id: UserId },
    /// 发送私聊消息
    SendMessage {
        receiver_id: UserId,
        content: String,
        #[serde(default)]
        kind: MessageKind,
        #[serde(default)]
        media: Option<MediaRef>,
        /// 客户端临时ID，原样回传给发送方用于对账
        #[serde(default)]
        temp_id: Option<String>,
    },
    /// 正在输入（私聊）
    Typing { receiver_id: UserId },
    /// 停止输入（私聊）
    StopTyping { receiver_id: UserId },
    /// 标记私聊消息已读
    MarkRead { message_id: MessageId },
    /// 加入群组房间
    JoinGroup { group_id: GroupId },
    /// 离开群组房间
    LeaveGroup { group_id: GroupId },
    /// 发送群消息
    SendGroupMessage {
        group_id: GroupId,
        content: String,
        #[serde(default)]
        kind: MessageKind,
        #[serde(default)]
        media: Option<MediaRef>,
        #[serde(default)]
        temp_id: Option<String>,
    },
    /// 正在输入（群聊）
    GroupTyping { group_id: GroupId },
    /// 停止输入（群聊）
    GroupStopTyping { group_id: GroupId },
}

/// 广播用的群消息载荷
///
/// 在消息记录之外附带发送者当时的群内角色，角色反规范化只存在
/// 于事件里，不回写历史消息。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutgoingGroupMessage {
    #[serde(flatten)]
    pub message: GroupMessage,
    pub sender_role: GroupRole,
}

/// 服务端下行事件
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ServerEvent {
    /// join 成功后回发的在线用户快照
    OnlineUsers { user_ids: Vec<UserId> },
    /// 好友上线（该用户的第一条连接建立）
    UserOnline { user_id: UserId },
    /// 好友下线（该用户的最后一条连接断开）
    UserOffline { user_id: UserId },
    /// 收到私聊消息，sender_id 顶层冗余一份方便客户端路由
    ReceiveMessage {
        message: DirectMessage,
        sender_id: UserId,
    },
    /// 私聊消息落库成功的发送方回执
    MessageSent {
        message: DirectMessage,
        #[serde(skip_serializing_if = "Option::is_none")]
        temp_id: Option<String>,
    },
    /// 私聊消息被对方读取
    MessageRead {
        message_id: MessageId,
        reader_id: UserId,
    },
    /// 对方正在输入（私聊）
    UserTyping { sender_id: UserId },
    /// 对方停止输入（私聊）
    UserStopTyping { sender_id: UserId },
    /// 有用户进入群组房间
    UserJoinedGroup { group_id: GroupId, user_id: UserId },
    /// 有用户离开群组房间
    UserLeftGroup { group_id: GroupId, user_id: UserId },
    /// 收到群消息（发送方自己也会收到），temp_id 原样透传
    ReceiveGroupMessage {
        message: OutgoingGroupMessage,
        group_id: GroupId,
        #[serde(skip_serializing_if = "Option::is_none")]
        temp_id: Option<String>,
    },
    /// 群消息落库成功的发送方回执
    GroupMessageSent {
        message: OutgoingGroupMessage,
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        temp_id: Option<String>,
    },
    /// 群内有人正在输入
    UserTypingGroup { group_id: GroupId, sender_id: UserId },
    /// 群内有人停止输入
    UserStopTypingGroup { group_id: GroupId, sender_id: UserId },
    /// 新通知
    NewNotification { notification: Notification },
    /// 错误事件
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn client_event_uses_snake_case_tag() {
        let raw = format!(
            r#"{{"event":"send_message","receiver_id":"{}","content":"hi","temp_id":"t-1"}}"#,
            Uuid::nil()
        );
        let event: ClientEvent = serde_json::from_str(&raw).unwrap();
        match event {
            ClientEvent::SendMessage {
                content,
                kind,
                temp_id,
                ..
            } => {
                assert_eq!(content, "hi");
                assert_eq!(kind, MessageKind::Text);
                assert_eq!(temp_id.as_deref(), Some("t-1"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn unknown_client_event_is_rejected() {
        let raw = r#"{"event":"shutdown_server"}"#;
        assert!(serde_json::from_str::<ClientEvent>(raw).is_err());
    }

    #[test]
    fn server_event_serializes_event_tag() {
        let event = ServerEvent::UserOnline {
            user_id: UserId::new(Uuid::nil()),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "user_online");
        assert_eq!(json["user_id"], Uuid::nil().to_string());
    }

    #[test]
    fn message_sent_omits_absent_temp_id() {
        let message = DirectMessage::new_text(
            UserId::new(Uuid::new_v4()),
            UserId::new(Uuid::new_v4()),
            domain::MessageContent::new("hello").unwrap(),
        );
        let event = ServerEvent::MessageSent {
            message,
            temp_id: None,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert!(json.get("temp_id").is_none());
    }

    #[test]
    fn outgoing_group_message_flattens_record() {
        let message = GroupMessage::new(
            GroupId::new(Uuid::new_v4()),
            UserId::new(Uuid::new_v4()),
            domain::MessageContent::new("hello group").unwrap(),
            MessageKind::Text,
            None,
        );
        let group_id = message.group_id;
        let event = ServerEvent::ReceiveGroupMessage {
            message: OutgoingGroupMessage {
                message,
                sender_role: GroupRole::Moderator,
            },
            group_id,
            temp_id: None,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "receive_group_message");
        assert_eq!(json["group_id"], group_id.to_string());
        assert_eq!(json["message"]["sender_role"], "moderator");
        assert_eq!(json["message"]["content"], "hello group");
    }

    #[test]
    fn receive_message_carries_top_level_sender_id() {
        let sender = UserId::new(Uuid::new_v4());
        let message = DirectMessage::new_text(
            sender,
            UserId::new(Uuid::new_v4()),
            domain::MessageContent::new("hi").unwrap(),
        );
        let event = ServerEvent::ReceiveMessage {
            message,
            sender_id: sender,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "receive_message");
        assert_eq!(json["sender_id"], sender.to_string());
    }
}
