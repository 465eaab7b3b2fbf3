//! 事件分发引擎
//!
//! 每个客户端事件在这里完成权限校验、持久化和扇出。处理顺序
//! 固定：先校验（每次穿透到存储层），后落库，最后广播。任何一步
//! 失败都会折叠成发回当前连接的 `error` 事件，连接本身不断开。

use std::sync::Arc;

use domain::repositories::{GroupMessageRepository, GroupRepository, MessageRepository};
use domain::{
    DirectMessage, GroupId, GroupMessage, MediaRef, MessageContent, MessageId, MessageKind,
    NotificationKind, UserId,
};
use tracing::{info, warn};

use crate::errors::{AppResult, ApplicationError};
use crate::events::{ClientEvent, OutgoingGroupMessage, ServerEvent};
use crate::membership::MembershipResolver;
use crate::notifier::{NotificationRequest, Notifier};
use crate::presence::PresenceBroadcaster;
use crate::registry::{ConnectionId, ConnectionRegistry, RoomKey};

/// 事件分发引擎
#[derive(Clone)]
pub struct DispatchEngine {
    registry: ConnectionRegistry,
    messages: Arc<dyn MessageRepository>,
    groups: Arc<dyn GroupRepository>,
    group_messages: Arc<dyn GroupMessageRepository>,
    membership: MembershipResolver,
    presence: PresenceBroadcaster,
    notifier: Notifier,
}

impl DispatchEngine {
    pub fn new(
        registry: ConnectionRegistry,
        messages: Arc<dyn MessageRepository>,
        groups: Arc<dyn GroupRepository>,
        group_messages: Arc<dyn GroupMessageRepository>,
        membership: MembershipResolver,
        presence: PresenceBroadcaster,
        notifier: Notifier,
    ) -> Self {
        Self {
            registry,
            messages,
            groups,
            group_messages,
            membership,
            presence,
            notifier,
        }
    }

    /// 连接层访问注册表（attach 发送端、测试用）
    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// 处理一个客户端事件，错误折叠为 `error` 事件发回当前连接
    pub async fn handle(&self, conn_id: ConnectionId, event: ClientEvent) {
        if let Err(err) = self.dispatch(conn_id, event).await {
            warn!(conn_id = %conn_id, error = %err, "event rejected");
            self.registry
                .send_to_connection(
                    conn_id,
                    ServerEvent::Error {
                        message: err.to_string(),
                    },
                )
                .await;
        }
    }

    /// 连接断开：注销连接，最后一条连接断开时广播下线
    pub async fn disconnect(&self, conn_id: ConnectionId) {
        let Some(outcome) = self.registry.detach(conn_id).await else {
            return;
        };
        info!(conn_id = %conn_id, user_id = %outcome.user_id, "connection closed");
        if outcome.went_offline {
            if let Err(err) = self.presence.announce_offline(outcome.user_id).await {
                warn!(user_id = %outcome.user_id, error = %err, "offline broadcast failed");
            }
        }
    }

    async fn dispatch(&self, conn_id: ConnectionId, event: ClientEvent) -> AppResult<()> {
        match event {
            ClientEvent::Join { user_id } => self.join(conn_id, user_id).await,
            ClientEvent::SendMessage {
                receiver_id,
                content,
                kind,
                media,
                temp_id,
            } => {
                self.send_message(conn_id, receiver_id, content, kind, media, temp_id)
                    .await
            }
            ClientEvent::Typing { receiver_id } => {
                self.relay_typing(conn_id, receiver_id, true).await
            }
            ClientEvent::StopTyping { receiver_id } => {
                self.relay_typing(conn_id, receiver_id, false).await
            }
            ClientEvent::MarkRead { message_id } => self.mark_read(conn_id, message_id).await,
            ClientEvent::JoinGroup { group_id } => self.join_group(conn_id, group_id).await,
            ClientEvent::LeaveGroup { group_id } => self.leave_group(conn_id, group_id).await,
            ClientEvent::SendGroupMessage {
                group_id,
                content,
                kind,
                media,
                temp_id,
            } => {
                self.send_group_message(conn_id, group_id, content, kind, media, temp_id)
                    .await
            }
            ClientEvent::GroupTyping { group_id } => {
                self.relay_group_typing(conn_id, group_id, true).await
            }
            ClientEvent::GroupStopTyping { group_id } => {
                self.relay_group_typing(conn_id, group_id, false).await
            }
        }
    }

    /// join 之后才允许其他事件
    async fn require_joined(&self, conn_id: ConnectionId) -> AppResult<UserId> {
        self.registry
            .user_of(conn_id)
            .await
            .ok_or(ApplicationError::NotJoined)
    }

    async fn join(&self, conn_id: ConnectionId, user_id: UserId) -> AppResult<()> {
        let outcome = self.registry.bind(conn_id, user_id).await;
        info!(conn_id = %conn_id, user_id = %user_id, "user joined");
        if outcome.came_online {
            self.presence.announce_online(user_id).await?;
        }
        let user_ids = self.registry.online_user_ids().await;
        self.registry
            .send_to_connection(conn_id, ServerEvent::OnlineUsers { user_ids })
            .await;
        Ok(())
    }

    async fn send_message(
        &self,
        conn_id: ConnectionId,
        receiver_id: UserId,
        content: String,
        kind: MessageKind,
        media: Option<MediaRef>,
        temp_id: Option<String>,
    ) -> AppResult<()> {
        let sender_id = self.require_joined(conn_id).await?;
        self.membership.ensure_friends(sender_id, receiver_id).await?;

        let message = build_direct_message(sender_id, receiver_id, content, kind, media)?;
        let saved = self.messages.create(&message).await?;

        self.registry
            .send_to_user(
                receiver_id,
                ServerEvent::ReceiveMessage {
                    message: saved.clone(),
                    sender_id,
                },
            )
            .await;
        self.registry
            .send_to_connection(
                conn_id,
                ServerEvent::MessageSent {
                    message: saved.clone(),
                    temp_id,
                },
            )
            .await;

        // 通知总是落库，接收方在线时同时实时推送
        self.notifier
            .deliver(NotificationRequest {
                recipient_id: receiver_id,
                sender_id: Some(sender_id),
                kind: NotificationKind::NewMessage,
                message: "You have a new message".to_owned(),
                link: Some(format!("/chat/{sender_id}")),
                metadata: None,
            })
            .await?;
        Ok(())
    }

    async fn relay_typing(
        &self,
        conn_id: ConnectionId,
        receiver_id: UserId,
        typing: bool,
    ) -> AppResult<()> {
        let sender_id = self.require_joined(conn_id).await?;
        let event = if typing {
            ServerEvent::UserTyping { sender_id }
        } else {
            ServerEvent::UserStopTyping { sender_id }
        };
        self.registry.send_to_user(receiver_id, event).await;
        Ok(())
    }

    async fn mark_read(&self, conn_id: ConnectionId, message_id: MessageId) -> AppResult<()> {
        let reader_id = self.require_joined(conn_id).await?;
        let message = self
            .messages
            .find_by_id(message_id)
            .await?
            .ok_or_else(|| ApplicationError::not_found("Message"))?;
        if message.receiver_id != reader_id {
            return Err(ApplicationError::permission_denied(
                "mark this message as read",
            ));
        }
        // 已读是幂等的：重复标记不再通知发送方
        if message.read {
            return Ok(());
        }
        self.messages.mark_read(message_id).await?;
        self.registry
            .send_to_user(
                message.sender_id,
                ServerEvent::MessageRead {
                    message_id,
                    reader_id,
                },
            )
            .await;
        Ok(())
    }

    async fn join_group(&self, conn_id: ConnectionId, group_id: GroupId) -> AppResult<()> {
        let user_id = self.require_joined(conn_id).await?;
        self.membership.require_member(group_id, user_id).await?;
        let room = RoomKey::Group(group_id);
        self.registry.join_room(conn_id, room).await;
        self.registry
            .broadcast_room(
                room,
                ServerEvent::UserJoinedGroup { group_id, user_id },
                Some(conn_id),
            )
            .await;
        Ok(())
    }

    async fn leave_group(&self, conn_id: ConnectionId, group_id: GroupId) -> AppResult<()> {
        let user_id = self.require_joined(conn_id).await?;
        let room = RoomKey::Group(group_id);
        self.registry.leave_room(conn_id, room).await;
        self.registry
            .broadcast_room(
                room,
                ServerEvent::UserLeftGroup { group_id, user_id },
                Some(conn_id),
            )
            .await;
        Ok(())
    }

    async fn send_group_message(
        &self,
        conn_id: ConnectionId,
        group_id: GroupId,
        content: String,
        kind: MessageKind,
        media: Option<MediaRef>,
        temp_id: Option<String>,
    ) -> AppResult<()> {
        let sender_id = self.require_joined(conn_id).await?;
        let sender_role = self.membership.ensure_can_post(group_id, sender_id).await?;

        let message = build_group_message(group_id, sender_id, content, kind, media)?;
        let saved = self.group_messages.create(&message).await?;
        self.groups
            .touch_activity(group_id, saved.created_at)
            .await?;

        let outgoing = OutgoingGroupMessage {
            message: saved,
            sender_role,
        };
        // 群消息广播包含发送方自己，回执单独发给发起连接
        self.registry
            .broadcast_room(
                RoomKey::Group(group_id),
                ServerEvent::ReceiveGroupMessage {
                    message: outgoing.clone(),
                    group_id,
                    temp_id: temp_id.clone(),
                },
                None,
            )
            .await;
        self.registry
            .send_to_connection(
                conn_id,
                ServerEvent::GroupMessageSent {
                    message: outgoing,
                    success: true,
                    temp_id,
                },
            )
            .await;
        Ok(())
    }

    async fn relay_group_typing(
        &self,
        conn_id: ConnectionId,
        group_id: GroupId,
        typing: bool,
    ) -> AppResult<()> {
        let sender_id = self.require_joined(conn_id).await?;
        let event = if typing {
            ServerEvent::UserTypingGroup {
                group_id,
                sender_id,
            }
        } else {
            ServerEvent::UserStopTypingGroup {
                group_id,
                sender_id,
            }
        };
        self.registry
            .broadcast_room(RoomKey::Group(group_id), event, Some(conn_id))
            .await;
        Ok(())
    }
}

/// 校验内容并构造私聊消息。媒体消息允许空文本，回退为媒体 URL。
fn build_direct_message(
    sender_id: UserId,
    receiver_id: UserId,
    content: String,
    kind: MessageKind,
    media: Option<MediaRef>,
) -> AppResult<DirectMessage> {
    match media {
        Some(media) => {
            let text = effective_text(content, &media);
            let content = MessageContent::new(text)
                .map_err(|e| ApplicationError::invalid_message(e.to_string()))?;
            Ok(DirectMessage::new_media(
                sender_id,
                receiver_id,
                content,
                kind,
                media,
            ))
        }
        None => {
            let content = MessageContent::new(content)
                .map_err(|e| ApplicationError::invalid_message(e.to_string()))?;
            Ok(DirectMessage::new_text(sender_id, receiver_id, content))
        }
    }
}

/// 校验内容并构造群消息
fn build_group_message(
    group_id: GroupId,
    sender_id: UserId,
    content: String,
    kind: MessageKind,
    media: Option<MediaRef>,
) -> AppResult<GroupMessage> {
    let text = match &media {
        Some(media) => effective_text(content, media),
        None => content,
    };
    let content =
        MessageContent::new(text).map_err(|e| ApplicationError::invalid_message(e.to_string()))?;
    Ok(GroupMessage::new(group_id, sender_id, content, kind, media))
}

fn effective_text(content: String, media: &MediaRef) -> String {
    if content.trim().is_empty() {
        media.url.clone()
    } else {
        content
    }
}
