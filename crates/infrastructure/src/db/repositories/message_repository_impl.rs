//! 私聊消息Repository实现

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::errors::{DomainError, DomainResult};
use domain::repositories::MessageRepository;
use domain::{DirectMessage, MediaRef, MessageId, MessageKind, UserId};
use sqlx::types::Json;
use sqlx::{query, query_as, FromRow};
use std::sync::Arc;
use uuid::Uuid;

use crate::db::DbPool;

/// 数据库消息模型。媒体附件存为 JSONB。
#[derive(Debug, Clone, FromRow)]
struct DbMessage {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub content: String,
    pub kind: String,
    pub media: Option<Json<MediaRef>>,
    pub read: bool,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
}

pub(crate) fn kind_to_str(kind: MessageKind) -> &'static str {
    match kind {
        MessageKind::Text => "text",
        MessageKind::Image => "image",
        MessageKind::Video => "video",
        MessageKind::Audio => "audio",
    }
}

pub(crate) fn kind_from_str(kind: &str) -> MessageKind {
    match kind {
        "image" => MessageKind::Image,
        "video" => MessageKind::Video,
        "audio" => MessageKind::Audio,
        _ => MessageKind::Text,
    }
}

impl From<DbMessage> for DirectMessage {
    fn from(db_message: DbMessage) -> Self {
        DirectMessage {
            id: MessageId::new(db_message.id),
            sender_id: UserId::new(db_message.sender_id),
            receiver_id: UserId::new(db_message.receiver_id),
            content: db_message.content,
            kind: kind_from_str(&db_message.kind),
            media: db_message.media.map(|m| m.0),
            read: db_message.read,
            deleted: db_message.deleted,
            created_at: db_message.created_at,
        }
    }
}

pub struct PostgresMessageRepository {
    pool: Arc<DbPool>,
}

impl PostgresMessageRepository {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }
}

const MESSAGE_COLUMNS: &str = r#"id, sender_id, receiver_id, content, kind, media, "read", deleted, created_at"#;

#[async_trait]
impl MessageRepository for PostgresMessageRepository {
    async fn create(&self, message: &DirectMessage) -> DomainResult<DirectMessage> {
        let result = query_as::<_, DbMessage>(&format!(
            r#"
            INSERT INTO messages (id, sender_id, receiver_id, content, kind, media, "read", deleted, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {MESSAGE_COLUMNS}
            "#,
        ))
        .bind(message.id.0)
        .bind(message.sender_id.0)
        .bind(message.receiver_id.0)
        .bind(&message.content)
        .bind(kind_to_str(message.kind))
        .bind(message.media.clone().map(Json))
        .bind(message.read)
        .bind(message.deleted)
        .bind(message.created_at)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| DomainError::storage(e.to_string()))?;

        Ok(result.into())
    }

    async fn find_by_id(&self, id: MessageId) -> DomainResult<Option<DirectMessage>> {
        let result = query_as::<_, DbMessage>(&format!(
            r#"
            SELECT {MESSAGE_COLUMNS}
            FROM messages
            WHERE id = $1 AND NOT deleted
            "#,
        ))
        .bind(id.0)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| DomainError::storage(e.to_string()))?;

        Ok(result.map(Into::into))
    }

    async fn mark_read(&self, id: MessageId) -> DomainResult<()> {
        query(r#"UPDATE messages SET "read" = TRUE WHERE id = $1"#)
            .bind(id.0)
            .execute(&*self.pool)
            .await
            .map_err(|e| DomainError::storage(e.to_string()))?;
        Ok(())
    }

    async fn find_conversation(
        &self,
        a: UserId,
        b: UserId,
        limit: u32,
    ) -> DomainResult<Vec<DirectMessage>> {
        let result = query_as::<_, DbMessage>(&format!(
            r#"
            SELECT {MESSAGE_COLUMNS}
            FROM messages
            WHERE NOT deleted
              AND ((sender_id = $1 AND receiver_id = $2) OR (sender_id = $2 AND receiver_id = $1))
            ORDER BY created_at DESC
            LIMIT $3
            "#,
        ))
        .bind(a.0)
        .bind(b.0)
        .bind(i64::from(limit))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| DomainError::storage(e.to_string()))?;

        Ok(result.into_iter().map(Into::into).collect())
    }
}
