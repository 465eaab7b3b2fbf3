#![allow(dead_code)]

use std::sync::Arc;

use application::{
    memory::{
        MemoryGroupMessageRepository, MemoryGroupRepository, MemoryMessageRepository,
        MemoryNotificationRepository, MemoryUserRepository,
    },
    ConnectionRegistry, DispatchEngine, GroupModerationService, MembershipResolver,
    MessageHistoryService, Notifier, PresenceBroadcaster,
};
use axum::Router;
use web_api::{router, AppState};

pub struct TestApp {
    pub router: Router,
    pub users: Arc<MemoryUserRepository>,
    pub messages: Arc<MemoryMessageRepository>,
    pub groups: Arc<MemoryGroupRepository>,
    pub group_messages: Arc<MemoryGroupMessageRepository>,
    pub notifications: Arc<MemoryNotificationRepository>,
}

pub fn build_app() -> TestApp {
    let registry = ConnectionRegistry::new();
    let users = Arc::new(MemoryUserRepository::new());
    let messages = Arc::new(MemoryMessageRepository::new());
    let groups = Arc::new(MemoryGroupRepository::new());
    let group_messages = Arc::new(MemoryGroupMessageRepository::new());
    let notifications = Arc::new(MemoryNotificationRepository::new());

    let membership = MembershipResolver::new(users.clone(), groups.clone());
    let presence = PresenceBroadcaster::new(registry.clone(), users.clone());
    let notifier = Notifier::new(registry.clone(), notifications.clone());
    let dispatcher = Arc::new(DispatchEngine::new(
        registry.clone(),
        messages.clone(),
        groups.clone(),
        group_messages.clone(),
        membership.clone(),
        presence,
        notifier.clone(),
    ));
    let moderation = Arc::new(GroupModerationService::new(
        groups.clone(),
        notifier,
        registry,
    ));
    let history = Arc::new(MessageHistoryService::new(
        messages.clone(),
        group_messages.clone(),
        membership,
    ));
    let state = AppState::new(dispatcher, moderation, history, notifications.clone());

    TestApp {
        router: router(state),
        users,
        messages,
        groups,
        group_messages,
        notifications,
    }
}
