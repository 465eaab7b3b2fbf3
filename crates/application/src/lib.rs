//! 应用层
//!
//! 连接注册表、事件分发引擎、在线状态广播、通知投递和群组管控
//! 服务。只依赖领域层接口，不关心存储和传输的具体实现。

pub mod dispatch;
pub mod errors;
pub mod events;
pub mod membership;
pub mod memory;
pub mod notifier;
pub mod presence;
pub mod registry;
pub mod services;

#[cfg(test)]
mod dispatch_tests;

pub use dispatch::DispatchEngine;
pub use errors::{AppResult, ApplicationError, MuteNotice};
pub use events::{ClientEvent, OutgoingGroupMessage, ServerEvent};
pub use membership::MembershipResolver;
pub use notifier::{NotificationRequest, Notifier};
pub use presence::PresenceBroadcaster;
pub use registry::{ConnectionId, ConnectionRegistry, RoomKey};
pub use services::{GroupModerationService, MessageHistoryService};
