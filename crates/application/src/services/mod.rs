//! 应用服务

pub mod group_moderation;
pub mod message_history;

pub use group_moderation::GroupModerationService;
pub use message_history::MessageHistoryService;
