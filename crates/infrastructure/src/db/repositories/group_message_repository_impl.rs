//! 群消息Repository实现

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::errors::{DomainError, DomainResult};
use domain::repositories::GroupMessageRepository;
use domain::{GroupId, GroupMessage, MediaRef, MessageId, UserId};
use sqlx::types::Json;
use sqlx::{query_as, FromRow};
use std::sync::Arc;
use uuid::Uuid;

use super::message_repository_impl::{kind_from_str, kind_to_str};
use crate::db::DbPool;

/// 数据库群消息模型
#[derive(Debug, Clone, FromRow)]
struct DbGroupMessage {
    pub id: Uuid,
    pub group_id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    pub kind: String,
    pub media: Option<Json<MediaRef>>,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
}

impl From<DbGroupMessage> for GroupMessage {
    fn from(db_message: DbGroupMessage) -> Self {
        GroupMessage {
            id: MessageId::new(db_message.id),
            group_id: GroupId::new(db_message.group_id),
            sender_id: UserId::new(db_message.sender_id),
            content: db_message.content,
            kind: kind_from_str(&db_message.kind),
            media: db_message.media.map(|m| m.0),
            deleted: db_message.deleted,
            created_at: db_message.created_at,
        }
    }
}

pub struct PostgresGroupMessageRepository {
    pool: Arc<DbPool>,
}

impl PostgresGroupMessageRepository {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }
}

const GROUP_MESSAGE_COLUMNS: &str = "id, group_id, sender_id, content, kind, media, deleted, created_at";

#[async_trait]
impl GroupMessageRepository for PostgresGroupMessageRepository {
    async fn create(&self, message: &GroupMessage) -> DomainResult<GroupMessage> {
        let result = query_as::<_, DbGroupMessage>(&format!(
            r#"
            INSERT INTO group_messages (id, group_id, sender_id, content, kind, media, deleted, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {GROUP_MESSAGE_COLUMNS}
            "#,
        ))
        .bind(message.id.0)
        .bind(message.group_id.0)
        .bind(message.sender_id.0)
        .bind(&message.content)
        .bind(kind_to_str(message.kind))
        .bind(message.media.clone().map(Json))
        .bind(message.deleted)
        .bind(message.created_at)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| DomainError::storage(e.to_string()))?;

        Ok(result.into())
    }

    async fn find_by_group(
        &self,
        group_id: GroupId,
        limit: u32,
    ) -> DomainResult<Vec<GroupMessage>> {
        let result = query_as::<_, DbGroupMessage>(&format!(
            r#"
            SELECT {GROUP_MESSAGE_COLUMNS}
            FROM group_messages
            WHERE group_id = $1 AND NOT deleted
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        ))
        .bind(group_id.0)
        .bind(i64::from(limit))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| DomainError::storage(e.to_string()))?;

        Ok(result.into_iter().map(Into::into).collect())
    }
}
