//! Repository实现模块

pub mod group_message_repository_impl;
pub mod group_repository_impl;
pub mod message_repository_impl;
pub mod notification_repository_impl;
pub mod user_repository_impl;

pub use group_message_repository_impl::PostgresGroupMessageRepository;
pub use group_repository_impl::PostgresGroupRepository;
pub use message_repository_impl::PostgresMessageRepository;
pub use notification_repository_impl::PostgresNotificationRepository;
pub use user_repository_impl::PostgresUserRepository;
