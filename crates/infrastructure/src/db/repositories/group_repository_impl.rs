//! 群组Repository实现
//!
//! 成员、禁言和封禁列表内嵌在群组记录里，存为 JSONB 列，
//! 整条记录一起读写。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::errors::{DomainError, DomainResult};
use domain::repositories::GroupRepository;
use domain::{BannedMember, Group, GroupId, GroupMember, MutedMember, UserId};
use sqlx::types::Json;
use sqlx::{query, query_as, FromRow};
use std::sync::Arc;
use uuid::Uuid;

use crate::db::DbPool;

/// 数据库群组模型
#[derive(Debug, Clone, FromRow)]
struct DbGroup {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub creator_id: Uuid,
    pub members: Json<Vec<GroupMember>>,
    pub muted_members: Json<Vec<MutedMember>>,
    pub banned_members: Json<Vec<BannedMember>>,
    pub last_activity: DateTime<Utc>,
    pub message_count: i64,
    pub created_at: DateTime<Utc>,
}

impl From<DbGroup> for Group {
    fn from(db_group: DbGroup) -> Self {
        Group {
            id: GroupId::new(db_group.id),
            name: db_group.name,
            description: db_group.description,
            creator_id: UserId::new(db_group.creator_id),
            members: db_group.members.0,
            muted_members: db_group.muted_members.0,
            banned_members: db_group.banned_members.0,
            last_activity: db_group.last_activity,
            message_count: db_group.message_count as u64,
            created_at: db_group.created_at,
        }
    }
}

pub struct PostgresGroupRepository {
    pool: Arc<DbPool>,
}

impl PostgresGroupRepository {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }
}

const GROUP_COLUMNS: &str = "id, name, description, creator_id, members, muted_members, \
                             banned_members, last_activity, message_count, created_at";

#[async_trait]
impl GroupRepository for PostgresGroupRepository {
    async fn create(&self, group: &Group) -> DomainResult<Group> {
        let result = query_as::<_, DbGroup>(&format!(
            r#"
            INSERT INTO groups (id, name, description, creator_id, members, muted_members,
                                banned_members, last_activity, message_count, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {GROUP_COLUMNS}
            "#,
        ))
        .bind(group.id.0)
        .bind(&group.name)
        .bind(&group.description)
        .bind(group.creator_id.0)
        .bind(Json(&group.members))
        .bind(Json(&group.muted_members))
        .bind(Json(&group.banned_members))
        .bind(group.last_activity)
        .bind(group.message_count as i64)
        .bind(group.created_at)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| DomainError::storage(e.to_string()))?;

        Ok(result.into())
    }

    async fn find_by_id(&self, id: GroupId) -> DomainResult<Option<Group>> {
        let result = query_as::<_, DbGroup>(&format!(
            r#"
            SELECT {GROUP_COLUMNS}
            FROM groups
            WHERE id = $1
            "#,
        ))
        .bind(id.0)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| DomainError::storage(e.to_string()))?;

        Ok(result.map(Into::into))
    }

    async fn save(&self, group: &Group) -> DomainResult<()> {
        query(
            r#"
            UPDATE groups
            SET name = $2, description = $3, members = $4, muted_members = $5,
                banned_members = $6, last_activity = $7, message_count = $8
            WHERE id = $1
            "#,
        )
        .bind(group.id.0)
        .bind(&group.name)
        .bind(&group.description)
        .bind(Json(&group.members))
        .bind(Json(&group.muted_members))
        .bind(Json(&group.banned_members))
        .bind(group.last_activity)
        .bind(group.message_count as i64)
        .execute(&*self.pool)
        .await
        .map_err(|e| DomainError::storage(e.to_string()))?;
        Ok(())
    }

    async fn touch_activity(&self, id: GroupId, at: DateTime<Utc>) -> DomainResult<()> {
        query(
            r#"
            UPDATE groups
            SET last_activity = $2, message_count = message_count + 1
            WHERE id = $1
            "#,
        )
        .bind(id.0)
        .bind(at)
        .execute(&*self.pool)
        .await
        .map_err(|e| DomainError::storage(e.to_string()))?;
        Ok(())
    }
}
