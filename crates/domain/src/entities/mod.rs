//! 领域实体

pub mod group;
pub mod group_message;
pub mod message;
pub mod notification;
pub mod user;

pub use group::{BannedMember, Group, GroupMember, GroupRole, MutedMember};
pub use group_message::GroupMessage;
pub use message::{DirectMessage, MediaRef, MessageKind};
pub use notification::{Notification, NotificationKind};
pub use user::User;
