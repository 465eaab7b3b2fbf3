//! 领域层
//!
//! 实体、值对象、管控权限判定和 Repository 接口定义。
//! 不依赖任何基础设施。

pub mod entities;
pub mod errors;
pub mod moderation;
pub mod repositories;
pub mod value_objects;

pub use entities::{
    BannedMember, DirectMessage, Group, GroupMember, GroupMessage, GroupRole, MediaRef,
    MessageKind, MutedMember, Notification, NotificationKind, User,
};
pub use errors::{DomainError, DomainResult};
pub use value_objects::{GroupId, MessageContent, MessageId, NotificationId, UserId};
