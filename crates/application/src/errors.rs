//! 应用层错误定义
//!
//! 应用层错误最终都会被序列化为发给客户端的 `error` 事件，
//! 所以面向连接的错误文案用英文（线上协议的一部分），
//! 内部日志仍然走 tracing。

use chrono::{DateTime, Utc};
use domain::DomainError;
use thiserror::Error;

/// 禁言剩余时长提示
///
/// 在检查禁言的时刻一次性折算成剩余分钟数，`None` 表示无限期。
/// 折算后文案是确定的，方便测试断言。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MuteNotice {
    /// 剩余分钟数（向上取整），无限期禁言为 None
    pub remaining_minutes: Option<i64>,
}

impl MuteNotice {
    /// 根据截止时间折算剩余分钟数
    pub fn from_deadline(until: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Self {
        let remaining_minutes = until.map(|t| {
            let secs = (t - now).num_seconds().max(0);
            (secs + 59) / 60
        });
        Self { remaining_minutes }
    }
}

impl std::fmt::Display for MuteNotice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.remaining_minutes {
            Some(minutes) => write!(f, "for {minutes} more minutes"),
            None => f.write_str("indefinitely"),
        }
    }
}

/// 应用层错误
#[derive(Debug, Error)]
pub enum ApplicationError {
    /// 领域错误
    #[error("{0}")]
    Domain(#[from] DomainError),

    /// 连接还没有完成 join 身份绑定
    #[error("You must join before sending events")]
    NotJoined,

    /// 不是好友，私聊被拒绝
    #[error("You can only message your friends")]
    NotFriends,

    /// 不是群成员
    #[error("You are not a member of this group")]
    NotGroupMember,

    /// 在群里被禁言
    #[error("You are muted in this group {0}")]
    Muted(MuteNotice),

    /// 消息内容不合法
    #[error("Invalid message: {reason}")]
    InvalidMessage { reason: String },

    /// 资源不存在
    #[error("{resource} not found")]
    NotFound { resource: String },

    /// 权限不足
    #[error("You do not have permission to {action}")]
    PermissionDenied { action: String },
}

impl ApplicationError {
    /// 消息不合法错误
    pub fn invalid_message(reason: impl Into<String>) -> Self {
        Self::InvalidMessage {
            reason: reason.into(),
        }
    }

    /// 资源不存在错误
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// 权限不足错误
    pub fn permission_denied(action: impl Into<String>) -> Self {
        Self::PermissionDenied {
            action: action.into(),
        }
    }
}

/// 应用层Result类型别名
pub type AppResult<T> = Result<T, ApplicationError>;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn mute_notice_rounds_remaining_minutes_up() {
        let now = Utc::now();
        let notice = MuteNotice::from_deadline(Some(now + Duration::seconds(61)), now);
        assert_eq!(notice.remaining_minutes, Some(2));
        assert_eq!(
            ApplicationError::Muted(notice).to_string(),
            "You are muted in this group for 2 more minutes"
        );
    }

    #[test]
    fn mute_notice_indefinite() {
        let now = Utc::now();
        let notice = MuteNotice::from_deadline(None, now);
        assert_eq!(
            ApplicationError::Muted(notice).to_string(),
            "You are muted in this group indefinitely"
        );
    }

    #[test]
    fn mute_notice_past_deadline_clamps_to_zero() {
        let now = Utc::now();
        let notice = MuteNotice::from_deadline(Some(now - Duration::minutes(5)), now);
        assert_eq!(notice.remaining_minutes, Some(0));
    }
}
