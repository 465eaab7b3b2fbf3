//! 用户Repository实现

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::errors::{DomainError, DomainResult};
use domain::repositories::UserRepository;
use domain::{User, UserId};
use sqlx::{query, query_as, query_scalar, FromRow};
use std::sync::Arc;
use uuid::Uuid;

use crate::db::DbPool;

/// 数据库用户模型。好友列表存为 uuid 数组。
#[derive(Debug, Clone, FromRow)]
struct DbUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub avatar_url: Option<String>,
    pub friends: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl From<DbUser> for User {
    fn from(db_user: DbUser) -> Self {
        User {
            id: UserId::new(db_user.id),
            username: db_user.username,
            email: db_user.email,
            avatar_url: db_user.avatar_url,
            friends: db_user.friends.into_iter().map(UserId::new).collect(),
            created_at: db_user.created_at,
        }
    }
}

pub struct PostgresUserRepository {
    pool: Arc<DbPool>,
}

impl PostgresUserRepository {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn create(&self, user: &User) -> DomainResult<User> {
        let friends: Vec<Uuid> = user.friends.iter().map(|f| f.0).collect();
        let result = query_as::<_, DbUser>(
            r#"
            INSERT INTO users (id, username, email, avatar_url, friends, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, username, email, avatar_url, friends, created_at
            "#,
        )
        .bind(user.id.0)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.avatar_url)
        .bind(&friends)
        .bind(user.created_at)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| DomainError::storage(e.to_string()))?;

        Ok(result.into())
    }

    async fn find_by_id(&self, id: UserId) -> DomainResult<Option<User>> {
        let result = query_as::<_, DbUser>(
            r#"
            SELECT id, username, email, avatar_url, friends, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id.0)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| DomainError::storage(e.to_string()))?;

        Ok(result.map(Into::into))
    }

    async fn are_friends(&self, a: UserId, b: UserId) -> DomainResult<bool> {
        let result: Option<bool> = query_scalar(
            r#"
            SELECT $2 = ANY(friends) FROM users WHERE id = $1
            "#,
        )
        .bind(a.0)
        .bind(b.0)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| DomainError::storage(e.to_string()))?;

        Ok(result.unwrap_or(false))
    }

    async fn add_friendship(&self, a: UserId, b: UserId) -> DomainResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DomainError::storage(e.to_string()))?;

        query(
            r#"
            UPDATE users SET friends = array_append(friends, $2)
            WHERE id = $1 AND NOT ($2 = ANY(friends))
            "#,
        )
        .bind(a.0)
        .bind(b.0)
        .execute(&mut *tx)
        .await
        .map_err(|e| DomainError::storage(e.to_string()))?;

        query(
            r#"
            UPDATE users SET friends = array_append(friends, $2)
            WHERE id = $1 AND NOT ($2 = ANY(friends))
            "#,
        )
        .bind(b.0)
        .bind(a.0)
        .execute(&mut *tx)
        .await
        .map_err(|e| DomainError::storage(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| DomainError::storage(e.to_string()))?;
        Ok(())
    }
}
