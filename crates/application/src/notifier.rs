//! 通知投递
//!
//! 先落库再实时推送。接收者就是触发者本人时直接跳过，不产生
//! 记录也不推送。推送只发给在线连接，离线用户之后通过通知列表
//! 接口补拉。

use std::sync::Arc;

use domain::repositories::NotificationRepository;
use domain::{Notification, NotificationKind, UserId};
use serde_json::Value as JsonValue;

use crate::errors::AppResult;
use crate::events::ServerEvent;
use crate::registry::ConnectionRegistry;

/// 通知投递参数
#[derive(Debug, Clone)]
pub struct NotificationRequest {
    pub recipient_id: UserId,
    pub sender_id: Option<UserId>,
    pub kind: NotificationKind,
    pub message: String,
    pub link: Option<String>,
    pub metadata: Option<JsonValue>,
}

/// 通知投递器
#[derive(Clone)]
pub struct Notifier {
    registry: ConnectionRegistry,
    notifications: Arc<dyn NotificationRepository>,
}

impl Notifier {
    pub fn new(
        registry: ConnectionRegistry,
        notifications: Arc<dyn NotificationRepository>,
    ) -> Self {
        Self {
            registry,
            notifications,
        }
    }

    /// 创建并推送一条通知，自己给自己的请求被静默跳过
    pub async fn deliver(&self, request: NotificationRequest) -> AppResult<Option<Notification>> {
        if request.sender_id == Some(request.recipient_id) {
            return Ok(None);
        }

        let mut notification = Notification::new(
            request.recipient_id,
            request.sender_id,
            request.kind,
            request.message,
        );
        if let Some(link) = request.link {
            notification = notification.with_link(link);
        }
        if let Some(metadata) = request.metadata {
            notification = notification.with_metadata(metadata);
        }

        let saved = self.notifications.create(&notification).await?;
        self.registry
            .send_to_user(
                saved.recipient_id,
                ServerEvent::NewNotification {
                    notification: saved.clone(),
                },
            )
            .await;
        Ok(Some(saved))
    }
}
