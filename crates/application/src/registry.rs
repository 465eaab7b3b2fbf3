//! 连接注册表
//!
//! 管理 WebSocket 连接、用户绑定和房间成员关系。一个用户可以有
//! 多条连接（多端在线），上线/下线以第一条连接建立、最后一条
//! 连接断开为准。所有表都在同一把写锁下更新，保证彼此一致。

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use domain::{GroupId, UserId};
use tokio::sync::{mpsc, RwLock};
use tracing::debug;
use uuid::Uuid;

use crate::events::ServerEvent;

/// 连接ID，连接建立时生成，与用户身份无关
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 房间标识
///
/// 每个用户有一个个人房间（私聊投递、输入提示走这里），
/// 每个群组有一个群房间。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoomKey {
    User(UserId),
    Group(GroupId),
}

/// 绑定结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindOutcome {
    /// 是否是该用户的第一条连接（触发 user_online 广播）
    pub came_online: bool,
}

/// 解绑结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetachOutcome {
    pub user_id: UserId,
    /// 是否是该用户的最后一条连接（触发 user_offline 广播）
    pub went_offline: bool,
}

#[derive(Default)]
struct Inner {
    /// 连接 -> 下行事件发送端
    senders: HashMap<ConnectionId, mpsc::UnboundedSender<ServerEvent>>,
    /// 连接 -> 已绑定的用户
    users: HashMap<ConnectionId, UserId>,
    /// 用户 -> 该用户的所有连接
    user_connections: HashMap<UserId, HashSet<ConnectionId>>,
    /// 房间 -> 房间内的连接
    rooms: HashMap<RoomKey, HashSet<ConnectionId>>,
    /// 连接 -> 该连接加入的房间（断开时反向清理用）
    connection_rooms: HashMap<ConnectionId, HashSet<RoomKey>>,
}

/// 连接注册表
#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    inner: Arc<RwLock<Inner>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册一条新连接（此时还未绑定用户）
    pub async fn attach(&self, conn_id: ConnectionId, sender: mpsc::UnboundedSender<ServerEvent>) {
        let mut inner = self.inner.write().await;
        inner.senders.insert(conn_id, sender);
        inner.connection_rooms.entry(conn_id).or_default();
    }

    /// 将连接绑定到用户，并把连接加入用户的个人房间
    pub async fn bind(&self, conn_id: ConnectionId, user_id: UserId) -> BindOutcome {
        let mut inner = self.inner.write().await;
        // 重复 join 先解除旧绑定，连接始终只属于一个用户
        if let Some(previous) = inner.users.insert(conn_id, user_id) {
            if previous != user_id {
                remove_user_connection(&mut inner, conn_id, previous);
                leave_room_locked(&mut inner, conn_id, RoomKey::User(previous));
            }
        }
        let connections = inner.user_connections.entry(user_id).or_default();
        let came_online = connections.is_empty();
        connections.insert(conn_id);
        join_room_locked(&mut inner, conn_id, RoomKey::User(user_id));
        BindOutcome { came_online }
    }

    /// 注销连接，返回绑定过的用户及其是否因此下线
    pub async fn detach(&self, conn_id: ConnectionId) -> Option<DetachOutcome> {
        let mut inner = self.inner.write().await;
        inner.senders.remove(&conn_id);
        if let Some(joined) = inner.connection_rooms.remove(&conn_id) {
            for room in joined {
                if let Some(members) = inner.rooms.get_mut(&room) {
                    members.remove(&conn_id);
                    if members.is_empty() {
                        inner.rooms.remove(&room);
                    }
                }
            }
        }
        let user_id = inner.users.remove(&conn_id)?;
        let went_offline = remove_user_connection(&mut inner, conn_id, user_id);
        Some(DetachOutcome {
            user_id,
            went_offline,
        })
    }

    /// 连接绑定的用户
    pub async fn user_of(&self, conn_id: ConnectionId) -> Option<UserId> {
        self.inner.read().await.users.get(&conn_id).copied()
    }

    /// 加入房间
    pub async fn join_room(&self, conn_id: ConnectionId, room: RoomKey) {
        let mut inner = self.inner.write().await;
        join_room_locked(&mut inner, conn_id, room);
    }

    /// 离开房间
    pub async fn leave_room(&self, conn_id: ConnectionId, room: RoomKey) {
        let mut inner = self.inner.write().await;
        leave_room_locked(&mut inner, conn_id, room);
    }

    /// 把某个用户的全部连接踢出一个房间（封禁/踢出后生效）
    pub async fn evict_user_from_room(&self, user_id: UserId, room: RoomKey) {
        let mut inner = self.inner.write().await;
        let connections: Vec<ConnectionId> = inner
            .user_connections
            .get(&user_id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();
        for conn_id in connections {
            leave_room_locked(&mut inner, conn_id, room);
        }
    }

    /// 当前在线用户快照
    pub async fn online_user_ids(&self) -> Vec<UserId> {
        self.inner
            .read()
            .await
            .user_connections
            .keys()
            .copied()
            .collect()
    }

    /// 用户是否在线（至少一条连接）
    pub async fn is_online(&self, user_id: UserId) -> bool {
        self.inner
            .read()
            .await
            .user_connections
            .contains_key(&user_id)
    }

    /// 发送到单条连接
    pub async fn send_to_connection(&self, conn_id: ConnectionId, event: ServerEvent) {
        let inner = self.inner.read().await;
        if let Some(sender) = inner.senders.get(&conn_id) {
            if sender.send(event).is_err() {
                debug!(conn_id = %conn_id, "connection channel closed, dropping event");
            }
        }
    }

    /// 发送到某个用户的所有连接
    pub async fn send_to_user(&self, user_id: UserId, event: ServerEvent) {
        let inner = self.inner.read().await;
        let Some(connections) = inner.user_connections.get(&user_id) else {
            return;
        };
        for conn_id in connections {
            if let Some(sender) = inner.senders.get(conn_id) {
                if sender.send(event.clone()).is_err() {
                    debug!(conn_id = %conn_id, "connection channel closed, dropping event");
                }
            }
        }
    }

    /// 广播到房间内的所有连接，可选排除一条连接（通常是发起方）
    pub async fn broadcast_room(
        &self,
        room: RoomKey,
        event: ServerEvent,
        exclude: Option<ConnectionId>,
    ) {
        let inner = self.inner.read().await;
        let Some(members) = inner.rooms.get(&room) else {
            return;
        };
        for conn_id in members {
            if Some(*conn_id) == exclude {
                continue;
            }
            if let Some(sender) = inner.senders.get(conn_id) {
                if sender.send(event.clone()).is_err() {
                    debug!(conn_id = %conn_id, "connection channel closed, dropping event");
                }
            }
        }
    }
}

fn join_room_locked(inner: &mut Inner, conn_id: ConnectionId, room: RoomKey) {
    inner.rooms.entry(room).or_default().insert(conn_id);
    inner.connection_rooms.entry(conn_id).or_default().insert(room);
}

fn leave_room_locked(inner: &mut Inner, conn_id: ConnectionId, room: RoomKey) {
    if let Some(members) = inner.rooms.get_mut(&room) {
        members.remove(&conn_id);
        if members.is_empty() {
            inner.rooms.remove(&room);
        }
    }
    if let Some(joined) = inner.connection_rooms.get_mut(&conn_id) {
        joined.remove(&room);
    }
}

/// 从用户连接表里移除连接，返回该用户是否因此下线
fn remove_user_connection(inner: &mut Inner, conn_id: ConnectionId, user_id: UserId) -> bool {
    match inner.user_connections.get_mut(&user_id) {
        Some(connections) => {
            connections.remove(&conn_id);
            if connections.is_empty() {
                inner.user_connections.remove(&user_id);
                true
            } else {
                false
            }
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn new_conn(
        registry: &ConnectionRegistry,
    ) -> (ConnectionId, mpsc::UnboundedReceiver<ServerEvent>) {
        let conn_id = ConnectionId::new();
        let (tx, rx) = mpsc::unbounded_channel();
        registry.attach(conn_id, tx).await;
        (conn_id, rx)
    }

    #[tokio::test]
    async fn first_bind_reports_online_second_does_not() {
        let registry = ConnectionRegistry::new();
        let user = UserId::new(Uuid::new_v4());
        let (c1, _rx1) = new_conn(&registry).await;
        let (c2, _rx2) = new_conn(&registry).await;

        assert!(registry.bind(c1, user).await.came_online);
        assert!(!registry.bind(c2, user).await.came_online);
        assert!(registry.is_online(user).await);
    }

    #[tokio::test]
    async fn offline_only_after_last_connection_detaches() {
        let registry = ConnectionRegistry::new();
        let user = UserId::new(Uuid::new_v4());
        let (c1, _rx1) = new_conn(&registry).await;
        let (c2, _rx2) = new_conn(&registry).await;
        registry.bind(c1, user).await;
        registry.bind(c2, user).await;

        let first = registry.detach(c1).await.unwrap();
        assert!(!first.went_offline);
        let second = registry.detach(c2).await.unwrap();
        assert!(second.went_offline);
        assert!(!registry.is_online(user).await);
    }

    #[tokio::test]
    async fn detach_before_bind_yields_no_user() {
        let registry = ConnectionRegistry::new();
        let (c1, _rx1) = new_conn(&registry).await;
        assert!(registry.detach(c1).await.is_none());
    }

    #[tokio::test]
    async fn send_to_user_reaches_every_connection() {
        let registry = ConnectionRegistry::new();
        let user = UserId::new(Uuid::new_v4());
        let (c1, mut rx1) = new_conn(&registry).await;
        let (c2, mut rx2) = new_conn(&registry).await;
        registry.bind(c1, user).await;
        registry.bind(c2, user).await;

        registry
            .send_to_user(user, ServerEvent::UserOnline { user_id: user })
            .await;
        assert!(matches!(rx1.try_recv(), Ok(ServerEvent::UserOnline { .. })));
        assert!(matches!(rx2.try_recv(), Ok(ServerEvent::UserOnline { .. })));
    }

    #[tokio::test]
    async fn broadcast_room_respects_exclusion() {
        let registry = ConnectionRegistry::new();
        let group = GroupId::new(Uuid::new_v4());
        let room = RoomKey::Group(group);
        let (c1, mut rx1) = new_conn(&registry).await;
        let (c2, mut rx2) = new_conn(&registry).await;
        registry.join_room(c1, room).await;
        registry.join_room(c2, room).await;

        let event = ServerEvent::UserTypingGroup {
            group_id: group,
            sender_id: UserId::new(Uuid::new_v4()),
        };
        registry.broadcast_room(room, event, Some(c1)).await;
        assert!(rx1.try_recv().is_err());
        assert!(rx2.try_recv().is_ok());
    }

    #[tokio::test]
    async fn detach_cleans_room_membership() {
        let registry = ConnectionRegistry::new();
        let group = GroupId::new(Uuid::new_v4());
        let room = RoomKey::Group(group);
        let (c1, mut rx1) = new_conn(&registry).await;
        let user = UserId::new(Uuid::new_v4());
        registry.bind(c1, user).await;
        registry.join_room(c1, room).await;
        registry.detach(c1).await;

        let event = ServerEvent::UserStopTypingGroup {
            group_id: group,
            sender_id: user,
        };
        registry.broadcast_room(room, event, None).await;
        assert!(rx1.try_recv().is_err());
    }
}
