use std::sync::Arc;

use application::{DispatchEngine, GroupModerationService, MessageHistoryService};
use domain::repositories::NotificationRepository;

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<DispatchEngine>,
    pub moderation: Arc<GroupModerationService>,
    pub history: Arc<MessageHistoryService>,
    pub notifications: Arc<dyn NotificationRepository>,
}

impl AppState {
    pub fn new(
        dispatcher: Arc<DispatchEngine>,
        moderation: Arc<GroupModerationService>,
        history: Arc<MessageHistoryService>,
        notifications: Arc<dyn NotificationRepository>,
    ) -> Self {
        Self {
            dispatcher,
            moderation,
            history,
            notifications,
        }
    }
}
