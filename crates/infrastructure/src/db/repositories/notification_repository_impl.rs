//! 通知Repository实现

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::errors::{DomainError, DomainResult};
use domain::repositories::NotificationRepository;
use domain::{Notification, NotificationId, NotificationKind, UserId};
use serde_json::Value as JsonValue;
use sqlx::{query, query_as, query_scalar, FromRow};
use std::sync::Arc;
use uuid::Uuid;

use crate::db::DbPool;

/// 数据库通知模型
#[derive(Debug, Clone, FromRow)]
struct DbNotification {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub sender_id: Option<Uuid>,
    pub kind: String,
    pub message: String,
    pub link: Option<String>,
    pub metadata: JsonValue,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

fn kind_from_str(kind: &str) -> NotificationKind {
    match kind {
        "group_banned" => NotificationKind::GroupBanned,
        "group_unbanned" => NotificationKind::GroupUnbanned,
        "group_muted" => NotificationKind::GroupMuted,
        "group_unmuted" => NotificationKind::GroupUnmuted,
        "group_kicked" => NotificationKind::GroupKicked,
        "group_role_changed" => NotificationKind::GroupRoleChanged,
        _ => NotificationKind::NewMessage,
    }
}

impl From<DbNotification> for Notification {
    fn from(db_notification: DbNotification) -> Self {
        Notification {
            id: NotificationId::new(db_notification.id),
            recipient_id: UserId::new(db_notification.recipient_id),
            sender_id: db_notification.sender_id.map(UserId::new),
            kind: kind_from_str(&db_notification.kind),
            message: db_notification.message,
            link: db_notification.link,
            metadata: db_notification.metadata,
            is_read: db_notification.is_read,
            created_at: db_notification.created_at,
        }
    }
}

pub struct PostgresNotificationRepository {
    pool: Arc<DbPool>,
}

impl PostgresNotificationRepository {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }
}

const NOTIFICATION_COLUMNS: &str =
    "id, recipient_id, sender_id, kind, message, link, metadata, is_read, created_at";

#[async_trait]
impl NotificationRepository for PostgresNotificationRepository {
    async fn create(&self, notification: &Notification) -> DomainResult<Notification> {
        let result = query_as::<_, DbNotification>(&format!(
            r#"
            INSERT INTO notifications (id, recipient_id, sender_id, kind, message, link, metadata, is_read, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {NOTIFICATION_COLUMNS}
            "#,
        ))
        .bind(notification.id.0)
        .bind(notification.recipient_id.0)
        .bind(notification.sender_id.map(|s| s.0))
        .bind(notification.kind.to_string())
        .bind(&notification.message)
        .bind(&notification.link)
        .bind(&notification.metadata)
        .bind(notification.is_read)
        .bind(notification.created_at)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| DomainError::storage(e.to_string()))?;

        Ok(result.into())
    }

    async fn find_by_user(&self, user_id: UserId, limit: u32) -> DomainResult<Vec<Notification>> {
        let result = query_as::<_, DbNotification>(&format!(
            r#"
            SELECT {NOTIFICATION_COLUMNS}
            FROM notifications
            WHERE recipient_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        ))
        .bind(user_id.0)
        .bind(i64::from(limit))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| DomainError::storage(e.to_string()))?;

        Ok(result.into_iter().map(Into::into).collect())
    }

    async fn mark_as_read(&self, id: NotificationId) -> DomainResult<()> {
        query("UPDATE notifications SET is_read = TRUE WHERE id = $1")
            .bind(id.0)
            .execute(&*self.pool)
            .await
            .map_err(|e| DomainError::storage(e.to_string()))?;
        Ok(())
    }

    async fn count_unread(&self, user_id: UserId) -> DomainResult<u64> {
        let count: i64 = query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE recipient_id = $1 AND NOT is_read",
        )
        .bind(user_id.0)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| DomainError::storage(e.to_string()))?;
        Ok(count as u64)
    }
}
