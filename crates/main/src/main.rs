//! 主应用程序入口
//!
//! 加载配置，装配存储实现（Postgres 或内存退路），启动 Axum 服务。

use std::sync::Arc;

use application::{
    memory::{
        MemoryGroupMessageRepository, MemoryGroupRepository, MemoryMessageRepository,
        MemoryNotificationRepository, MemoryUserRepository,
    },
    ConnectionRegistry, DispatchEngine, GroupModerationService, MembershipResolver,
    MessageHistoryService, Notifier, PresenceBroadcaster,
};
use domain::repositories::{
    GroupMessageRepository, GroupRepository, MessageRepository, NotificationRepository,
    UserRepository,
};
use infrastructure::db;
use infrastructure::db::repositories::{
    PostgresGroupMessageRepository, PostgresGroupRepository, PostgresMessageRepository,
    PostgresNotificationRepository, PostgresUserRepository,
};
use tracing_subscriber::EnvFilter;
use web_api::{router, AppConfig, AppState};

struct Stores {
    users: Arc<dyn UserRepository>,
    messages: Arc<dyn MessageRepository>,
    groups: Arc<dyn GroupRepository>,
    group_messages: Arc<dyn GroupMessageRepository>,
    notifications: Arc<dyn NotificationRepository>,
}

async fn build_stores(config: &AppConfig) -> anyhow::Result<Stores> {
    match &config.database.url {
        Some(url) => {
            tracing::info!(
                "连接数据库: {}",
                url.split('@').next_back().unwrap_or("unknown")
            );
            let pool = Arc::new(
                db::create_pool(
                    url,
                    config.database.max_connections,
                    config.database.acquire_timeout_seconds,
                )
                .await?,
            );
            db::run_migrations(&pool).await?;
            Ok(Stores {
                users: Arc::new(PostgresUserRepository::new(pool.clone())),
                messages: Arc::new(PostgresMessageRepository::new(pool.clone())),
                groups: Arc::new(PostgresGroupRepository::new(pool.clone())),
                group_messages: Arc::new(PostgresGroupMessageRepository::new(pool.clone())),
                notifications: Arc::new(PostgresNotificationRepository::new(pool)),
            })
        }
        None => {
            tracing::warn!("未配置数据库，使用内存存储（重启即丢失）");
            Ok(Stores {
                users: Arc::new(MemoryUserRepository::new()),
                messages: Arc::new(MemoryMessageRepository::new()),
                groups: Arc::new(MemoryGroupRepository::new()),
                group_messages: Arc::new(MemoryGroupMessageRepository::new()),
                notifications: Arc::new(MemoryNotificationRepository::new()),
            })
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = AppConfig::load()?;
    let stores = build_stores(&config).await?;

    // 装配应用层
    let registry = ConnectionRegistry::new();
    let membership = MembershipResolver::new(stores.users.clone(), stores.groups.clone());
    let presence = PresenceBroadcaster::new(registry.clone(), stores.users.clone());
    let notifier = Notifier::new(registry.clone(), stores.notifications.clone());
    let dispatcher = Arc::new(DispatchEngine::new(
        registry.clone(),
        stores.messages.clone(),
        stores.groups.clone(),
        stores.group_messages.clone(),
        membership.clone(),
        presence,
        notifier.clone(),
    ));
    let moderation = Arc::new(GroupModerationService::new(
        stores.groups.clone(),
        notifier,
        registry,
    ));
    let history = Arc::new(MessageHistoryService::new(
        stores.messages.clone(),
        stores.group_messages.clone(),
        membership,
    ));

    let state = AppState::new(dispatcher, moderation, history, stores.notifications.clone());

    // 启动 Web 服务器
    let app = router(state);
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("vibelink 服务器启动在 http://{addr}");
    axum::serve(listener, app).await?;

    Ok(())
}
