//! 数据库连接与迁移

use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::time::Duration;

pub mod repositories;

pub type DbPool = Pool<Postgres>;

/// 创建 Postgres 连接池
pub async fn create_pool(
    database_url: &str,
    max_connections: u32,
    acquire_timeout_seconds: u64,
) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(acquire_timeout_seconds))
        .connect(database_url)
        .await
}

/// 执行迁移
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("../../migrations").run(pool).await
}
