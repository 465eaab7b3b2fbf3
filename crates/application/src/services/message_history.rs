//! 历史消息查询服务
//!
//! 私聊会话与群消息历史的读取入口。群历史要求调用者是当前成员，
//! 私聊历史只返回调用者参与的那一侧会话。

use std::sync::Arc;

use domain::repositories::{GroupMessageRepository, MessageRepository};
use domain::{DirectMessage, GroupId, GroupMessage, UserId};

use crate::errors::AppResult;
use crate::membership::MembershipResolver;

/// 历史消息查询服务
pub struct MessageHistoryService {
    messages: Arc<dyn MessageRepository>,
    group_messages: Arc<dyn GroupMessageRepository>,
    membership: MembershipResolver,
}

impl MessageHistoryService {
    pub fn new(
        messages: Arc<dyn MessageRepository>,
        group_messages: Arc<dyn GroupMessageRepository>,
        membership: MembershipResolver,
    ) -> Self {
        Self {
            messages,
            group_messages,
            membership,
        }
    }

    /// 调用者与对端之间的私聊记录，按时间倒序
    pub async fn conversation(
        &self,
        actor: UserId,
        peer: UserId,
        limit: u32,
    ) -> AppResult<Vec<DirectMessage>> {
        Ok(self.messages.find_conversation(actor, peer, limit).await?)
    }

    /// 群消息历史，仅限当前成员读取
    pub async fn group_history(
        &self,
        group_id: GroupId,
        actor: UserId,
        limit: u32,
    ) -> AppResult<Vec<GroupMessage>> {
        self.membership.require_member(group_id, actor).await?;
        Ok(self.group_messages.find_by_group(group_id, limit).await?)
    }
}
