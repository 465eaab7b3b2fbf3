//! 事件分发引擎的场景测试
//!
//! 基于内存存储跑完整的事件链路：注册连接、join、收发消息、
//! 群聊、禁言、管控。断言的是发到各连接通道里的事件序列。

use std::sync::Arc;

use chrono::{Duration, Utc};
use domain::repositories::{GroupRepository, MessageRepository, NotificationRepository, UserRepository};
use domain::{Group, GroupRole, NotificationKind, User, UserId};
use tokio::sync::mpsc;

use crate::dispatch::DispatchEngine;
use crate::events::{ClientEvent, ServerEvent};
use crate::membership::MembershipResolver;
use crate::memory::{
    MemoryGroupMessageRepository, MemoryGroupRepository, MemoryMessageRepository,
    MemoryNotificationRepository, MemoryUserRepository,
};
use crate::notifier::Notifier;
use crate::presence::PresenceBroadcaster;
use crate::registry::{ConnectionId, ConnectionRegistry};
use crate::services::GroupModerationService;

struct Harness {
    engine: DispatchEngine,
    moderation: GroupModerationService,
    users: Arc<MemoryUserRepository>,
    messages: Arc<MemoryMessageRepository>,
    groups: Arc<MemoryGroupRepository>,
    notifications: Arc<MemoryNotificationRepository>,
}

impl Harness {
    fn new() -> Self {
        let registry = ConnectionRegistry::new();
        let users = Arc::new(MemoryUserRepository::new());
        let messages = Arc::new(MemoryMessageRepository::new());
        let groups = Arc::new(MemoryGroupRepository::new());
        let group_messages = Arc::new(MemoryGroupMessageRepository::new());
        let notifications = Arc::new(MemoryNotificationRepository::new());

        let membership = MembershipResolver::new(users.clone(), groups.clone());
        let presence = PresenceBroadcaster::new(registry.clone(), users.clone());
        let notifier = Notifier::new(registry.clone(), notifications.clone());
        let engine = DispatchEngine::new(
            registry.clone(),
            messages.clone(),
            groups.clone(),
            group_messages,
            membership,
            presence,
            notifier.clone(),
        );
        let moderation = GroupModerationService::new(groups.clone(), notifier, registry);

        Self {
            engine,
            moderation,
            users,
            messages,
            groups,
            notifications,
        }
    }

    async fn add_user(&self, name: &str) -> UserId {
        let user = User::new(name, format!("{name}@example.com")).unwrap();
        self.users.create(&user).await.unwrap().id
    }

    async fn befriend(&self, a: UserId, b: UserId) {
        self.users.add_friendship(a, b).await.unwrap();
    }

    async fn connect(&self) -> (ConnectionId, mpsc::UnboundedReceiver<ServerEvent>) {
        let conn_id = ConnectionId::new();
        let (tx, rx) = mpsc::unbounded_channel();
        self.engine.registry().attach(conn_id, tx).await;
        (conn_id, rx)
    }

    async fn connect_as(
        &self,
        user_id: UserId,
    ) -> (ConnectionId, mpsc::UnboundedReceiver<ServerEvent>) {
        let (conn_id, mut rx) = self.connect().await;
        self.engine
            .handle(conn_id, ClientEvent::Join { user_id })
            .await;
        // 丢掉 join 自己产生的快照
        drain(&mut rx);
        (conn_id, rx)
    }
}

fn drain(rx: &mut mpsc::UnboundedReceiver<ServerEvent>) -> Vec<ServerEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn join_returns_online_snapshot() {
    let h = Harness::new();
    let alice = h.add_user("alice").await;
    let bob = h.add_user("bob").await;
    let (_c1, _rx1) = h.connect_as(alice).await;

    let (c2, mut rx2) = h.connect().await;
    h.engine
        .handle(c2, ClientEvent::Join { user_id: bob })
        .await;

    let events = drain(&mut rx2);
    let snapshot = events
        .iter()
        .find_map(|e| match e {
            ServerEvent::OnlineUsers { user_ids } => Some(user_ids.clone()),
            _ => None,
        })
        .expect("snapshot missing");
    assert!(snapshot.contains(&alice));
    assert!(snapshot.contains(&bob));
}

#[tokio::test]
async fn friends_see_exactly_one_online_event_across_devices() {
    let h = Harness::new();
    let alice = h.add_user("alice").await;
    let bob = h.add_user("bob").await;
    h.befriend(alice, bob).await;
    let (_ca, mut rx_a) = h.connect_as(alice).await;

    // bob 两台设备先后上线，alice 只收到一次 user_online
    let (cb1, _rx_b1) = h.connect_as(bob).await;
    let (cb2, _rx_b2) = h.connect_as(bob).await;
    let online: Vec<_> = drain(&mut rx_a)
        .into_iter()
        .filter(|e| matches!(e, ServerEvent::UserOnline { user_id } if *user_id == bob))
        .collect();
    assert_eq!(online.len(), 1);

    // 第一条连接断开不算下线，最后一条才广播 user_offline
    h.engine.disconnect(cb1).await;
    assert!(drain(&mut rx_a).is_empty());
    h.engine.disconnect(cb2).await;
    let offline: Vec<_> = drain(&mut rx_a)
        .into_iter()
        .filter(|e| matches!(e, ServerEvent::UserOffline { user_id } if *user_id == bob))
        .collect();
    assert_eq!(offline.len(), 1);
}

#[tokio::test]
async fn non_friends_cannot_message() {
    let h = Harness::new();
    let alice = h.add_user("alice").await;
    let bob = h.add_user("bob").await;
    let (ca, mut rx_a) = h.connect_as(alice).await;
    let (_cb, mut rx_b) = h.connect_as(bob).await;

    h.engine
        .handle(
            ca,
            ClientEvent::SendMessage {
                receiver_id: bob,
                content: "hi".into(),
                kind: Default::default(),
                media: None,
                temp_id: None,
            },
        )
        .await;

    let events = drain(&mut rx_a);
    assert!(matches!(
        events.as_slice(),
        [ServerEvent::Error { message }] if message == "You can only message your friends"
    ));
    assert!(drain(&mut rx_b).is_empty());
    let stored = h.messages.find_conversation(alice, bob, 10).await.unwrap();
    assert!(stored.is_empty());
}

#[tokio::test]
async fn direct_message_reaches_receiver_and_acks_with_temp_id() {
    let h = Harness::new();
    let alice = h.add_user("alice").await;
    let bob = h.add_user("bob").await;
    h.befriend(alice, bob).await;
    let (ca, mut rx_a) = h.connect_as(alice).await;
    let (_cb, mut rx_b) = h.connect_as(bob).await;
    drain(&mut rx_a);

    h.engine
        .handle(
            ca,
            ClientEvent::SendMessage {
                receiver_id: bob,
                content: "hello bob".into(),
                kind: Default::default(),
                media: None,
                temp_id: Some("t-42".into()),
            },
        )
        .await;

    let received = drain(&mut rx_b);
    assert!(matches!(
        &received[0],
        ServerEvent::ReceiveMessage { message, sender_id }
            if message.content == "hello bob" && *sender_id == alice
    ));
    // 通知也实时推到接收方
    assert!(matches!(
        &received[1],
        ServerEvent::NewNotification { notification }
            if notification.kind == NotificationKind::NewMessage
    ));
    let acks = drain(&mut rx_a);
    match acks.as_slice() {
        [ServerEvent::MessageSent { message, temp_id }] => {
            assert_eq!(message.sender_id, alice);
            assert_eq!(temp_id.as_deref(), Some("t-42"));
        }
        other => panic!("unexpected ack: {other:?}"),
    }
    assert_eq!(h.notifications.count_unread(bob).await.unwrap(), 1);
}

#[tokio::test]
async fn offline_receiver_gets_notification() {
    let h = Harness::new();
    let alice = h.add_user("alice").await;
    let bob = h.add_user("bob").await;
    h.befriend(alice, bob).await;
    let (ca, _rx_a) = h.connect_as(alice).await;

    h.engine
        .handle(
            ca,
            ClientEvent::SendMessage {
                receiver_id: bob,
                content: "are you there".into(),
                kind: Default::default(),
                media: None,
                temp_id: None,
            },
        )
        .await;

    let pending = h.notifications.find_by_user(bob, 10).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].kind, NotificationKind::NewMessage);
    assert_eq!(pending[0].sender_id, Some(alice));
}

#[tokio::test]
async fn mark_read_notifies_sender_once() {
    let h = Harness::new();
    let alice = h.add_user("alice").await;
    let bob = h.add_user("bob").await;
    h.befriend(alice, bob).await;
    let (ca, mut rx_a) = h.connect_as(alice).await;
    let (cb, mut rx_b) = h.connect_as(bob).await;
    drain(&mut rx_a);

    h.engine
        .handle(
            ca,
            ClientEvent::SendMessage {
                receiver_id: bob,
                content: "read me".into(),
                kind: Default::default(),
                media: None,
                temp_id: None,
            },
        )
        .await;
    drain(&mut rx_a);
    let message_id = match drain(&mut rx_b).as_slice() {
        [ServerEvent::ReceiveMessage { message, .. }] => message.id,
        other => panic!("unexpected: {other:?}"),
    };

    h.engine
        .handle(cb, ClientEvent::MarkRead { message_id })
        .await;
    let first = drain(&mut rx_a);
    assert!(matches!(
        first.as_slice(),
        [ServerEvent::MessageRead { message_id: id, reader_id }]
            if *id == message_id && *reader_id == bob
    ));

    // 重复标记是幂等的，不再通知
    h.engine
        .handle(cb, ClientEvent::MarkRead { message_id })
        .await;
    assert!(drain(&mut rx_a).is_empty());
    assert!(drain(&mut rx_b).is_empty());
}

#[tokio::test]
async fn only_receiver_can_mark_read() {
    let h = Harness::new();
    let alice = h.add_user("alice").await;
    let bob = h.add_user("bob").await;
    h.befriend(alice, bob).await;
    let (ca, mut rx_a) = h.connect_as(alice).await;

    h.engine
        .handle(
            ca,
            ClientEvent::SendMessage {
                receiver_id: bob,
                content: "mine".into(),
                kind: Default::default(),
                media: None,
                temp_id: None,
            },
        )
        .await;
    let message_id = match drain(&mut rx_a).as_slice() {
        [ServerEvent::MessageSent { message, .. }] => message.id,
        other => panic!("unexpected: {other:?}"),
    };

    // 发送方自己标记已读被拒绝
    h.engine
        .handle(ca, ClientEvent::MarkRead { message_id })
        .await;
    let events = drain(&mut rx_a);
    assert!(matches!(events.as_slice(), [ServerEvent::Error { .. }]));
}

#[tokio::test]
async fn events_before_join_are_rejected() {
    let h = Harness::new();
    let bob = h.add_user("bob").await;
    let (conn, mut rx) = h.connect().await;

    h.engine
        .handle(
            conn,
            ClientEvent::SendMessage {
                receiver_id: bob,
                content: "hi".into(),
                kind: Default::default(),
                media: None,
                temp_id: None,
            },
        )
        .await;

    let events = drain(&mut rx);
    assert!(matches!(
        events.as_slice(),
        [ServerEvent::Error { message }] if message == "You must join before sending events"
    ));
}

#[tokio::test]
async fn typing_relays_to_receiver_without_persistence() {
    let h = Harness::new();
    let alice = h.add_user("alice").await;
    let bob = h.add_user("bob").await;
    let (ca, _rx_a) = h.connect_as(alice).await;
    let (_cb, mut rx_b) = h.connect_as(bob).await;

    h.engine
        .handle(ca, ClientEvent::Typing { receiver_id: bob })
        .await;
    h.engine
        .handle(ca, ClientEvent::StopTyping { receiver_id: bob })
        .await;

    let events = drain(&mut rx_b);
    assert!(matches!(
        events.as_slice(),
        [
            ServerEvent::UserTyping { sender_id: a },
            ServerEvent::UserStopTyping { sender_id: b },
        ] if *a == alice && *b == alice
    ));
}

async fn seed_group(h: &Harness, creator: UserId, members: &[UserId]) -> Group {
    let mut group = Group::new("rustaceans", None, creator).unwrap();
    for member in members {
        group.add_member(*member).unwrap();
    }
    h.groups.create(&group).await.unwrap()
}

#[tokio::test]
async fn group_message_broadcasts_to_all_members_including_sender() {
    let h = Harness::new();
    let alice = h.add_user("alice").await;
    let bob = h.add_user("bob").await;
    let group = seed_group(&h, alice, &[bob]).await;

    let (ca, mut rx_a) = h.connect_as(alice).await;
    let (cb, mut rx_b) = h.connect_as(bob).await;
    h.engine
        .handle(ca, ClientEvent::JoinGroup { group_id: group.id })
        .await;
    h.engine
        .handle(cb, ClientEvent::JoinGroup { group_id: group.id })
        .await;
    drain(&mut rx_a);
    drain(&mut rx_b);

    h.engine
        .handle(
            cb,
            ClientEvent::SendGroupMessage {
                group_id: group.id,
                content: "hello group".into(),
                kind: Default::default(),
                media: None,
                temp_id: Some("g-1".into()),
            },
        )
        .await;

    // 其他成员收到广播
    let for_alice = drain(&mut rx_a);
    assert!(matches!(
        for_alice.as_slice(),
        [ServerEvent::ReceiveGroupMessage { message, group_id, temp_id }]
            if message.message.sender_id == bob
                && message.sender_role == GroupRole::Member
                && *group_id == group.id
                && temp_id.as_deref() == Some("g-1")
    ));

    // 发送方自己也在广播里，另收一条带 temp_id 的回执
    let for_bob = drain(&mut rx_b);
    assert_eq!(for_bob.len(), 2);
    assert!(for_bob
        .iter()
        .any(|e| matches!(e, ServerEvent::ReceiveGroupMessage { .. })));
    assert!(for_bob.iter().any(|e| matches!(
        e,
        ServerEvent::GroupMessageSent { success: true, temp_id, .. }
            if temp_id.as_deref() == Some("g-1")
    )));

    // 群活跃信息被更新
    let stored = h.groups.find_by_id(group.id).await.unwrap().unwrap();
    assert_eq!(stored.message_count, 1);
}

#[tokio::test]
async fn sender_with_two_devices_sees_broadcast_on_both() {
    let h = Harness::new();
    let alice = h.add_user("alice").await;
    let bob = h.add_user("bob").await;
    let group = seed_group(&h, alice, &[bob]).await;

    let (cb1, mut rx_b1) = h.connect_as(bob).await;
    let (cb2, mut rx_b2) = h.connect_as(bob).await;
    h.engine
        .handle(cb1, ClientEvent::JoinGroup { group_id: group.id })
        .await;
    h.engine
        .handle(cb2, ClientEvent::JoinGroup { group_id: group.id })
        .await;
    drain(&mut rx_b1);
    drain(&mut rx_b2);

    h.engine
        .handle(
            cb1,
            ClientEvent::SendGroupMessage {
                group_id: group.id,
                content: "from my phone".into(),
                kind: Default::default(),
                media: None,
                temp_id: None,
            },
        )
        .await;

    // 两台设备都收到广播，发起连接额外收到回执
    let first = drain(&mut rx_b1);
    assert!(first
        .iter()
        .any(|e| matches!(e, ServerEvent::ReceiveGroupMessage { .. })));
    assert!(first
        .iter()
        .any(|e| matches!(e, ServerEvent::GroupMessageSent { .. })));
    let second = drain(&mut rx_b2);
    assert!(matches!(
        second.as_slice(),
        [ServerEvent::ReceiveGroupMessage { .. }]
    ));
}

#[tokio::test]
async fn non_member_cannot_post_to_group() {
    let h = Harness::new();
    let alice = h.add_user("alice").await;
    let carol = h.add_user("carol").await;
    let group = seed_group(&h, alice, &[]).await;
    let (cc, mut rx_c) = h.connect_as(carol).await;

    h.engine
        .handle(
            cc,
            ClientEvent::SendGroupMessage {
                group_id: group.id,
                content: "let me in".into(),
                kind: Default::default(),
                media: None,
                temp_id: None,
            },
        )
        .await;

    let events = drain(&mut rx_c);
    assert!(matches!(
        events.as_slice(),
        [ServerEvent::Error { message }] if message == "You are not a member of this group"
    ));
}

#[tokio::test]
async fn muted_member_is_rejected_with_remaining_minutes() {
    let h = Harness::new();
    let alice = h.add_user("alice").await;
    let bob = h.add_user("bob").await;
    let mut group = seed_group(&h, alice, &[bob]).await;
    group.mute(bob, alice, Some(30), "spam");
    h.groups.save(&group).await.unwrap();

    let (cb, mut rx_b) = h.connect_as(bob).await;
    h.engine
        .handle(
            cb,
            ClientEvent::SendGroupMessage {
                group_id: group.id,
                content: "hello?".into(),
                kind: Default::default(),
                media: None,
                temp_id: None,
            },
        )
        .await;

    let events = drain(&mut rx_b);
    assert!(matches!(
        events.as_slice(),
        [ServerEvent::Error { message }]
            if message == "You are muted in this group for 30 more minutes"
    ));
}

#[tokio::test]
async fn expired_mute_is_cleared_on_next_send() {
    let h = Harness::new();
    let alice = h.add_user("alice").await;
    let bob = h.add_user("bob").await;
    let mut group = seed_group(&h, alice, &[bob]).await;
    group.mute(bob, alice, Some(1), "spam");
    group.muted_members[0].muted_until = Some(Utc::now() - Duration::minutes(1));
    h.groups.save(&group).await.unwrap();

    let (cb, mut rx_b) = h.connect_as(bob).await;
    h.engine
        .handle(
            cb,
            ClientEvent::SendGroupMessage {
                group_id: group.id,
                content: "back again".into(),
                kind: Default::default(),
                media: None,
                temp_id: None,
            },
        )
        .await;

    let events = drain(&mut rx_b);
    assert!(events
        .iter()
        .all(|e| !matches!(e, ServerEvent::Error { .. })));
    // 过期记录已被惰性清理并回写
    let stored = h.groups.find_by_id(group.id).await.unwrap().unwrap();
    assert!(stored.muted_members.is_empty());
}

#[tokio::test]
async fn ban_evicts_target_from_group_room() {
    let h = Harness::new();
    let alice = h.add_user("alice").await;
    let bob = h.add_user("bob").await;
    let group = seed_group(&h, alice, &[bob]).await;

    let (ca, mut rx_a) = h.connect_as(alice).await;
    let (cb, mut rx_b) = h.connect_as(bob).await;
    h.engine
        .handle(ca, ClientEvent::JoinGroup { group_id: group.id })
        .await;
    h.engine
        .handle(cb, ClientEvent::JoinGroup { group_id: group.id })
        .await;
    drain(&mut rx_a);
    drain(&mut rx_b);

    h.moderation.ban(group.id, alice, bob, None).await.unwrap();

    // bob 收到封禁通知，之后群广播不再到达
    let for_bob = drain(&mut rx_b);
    assert!(matches!(
        for_bob.as_slice(),
        [ServerEvent::NewNotification { notification }]
            if notification.kind == NotificationKind::GroupBanned
    ));
    h.engine
        .handle(
            ca,
            ClientEvent::SendGroupMessage {
                group_id: group.id,
                content: "peace at last".into(),
                kind: Default::default(),
                media: None,
                temp_id: None,
            },
        )
        .await;
    assert!(drain(&mut rx_b).is_empty());

    let stored = h.groups.find_by_id(group.id).await.unwrap().unwrap();
    assert!(stored.is_banned(bob));
    assert!(!stored.is_member(bob));
}

#[tokio::test]
async fn moderation_respects_role_hierarchy() {
    let h = Harness::new();
    let creator = h.add_user("creator").await;
    let admin1 = h.add_user("admin1").await;
    let admin2 = h.add_user("admin2").await;
    let mut group = seed_group(&h, creator, &[admin1, admin2]).await;
    group.change_role(admin1, GroupRole::Admin).unwrap();
    group.change_role(admin2, GroupRole::Admin).unwrap();
    h.groups.save(&group).await.unwrap();

    // admin 不能封禁同级 admin
    let err = h
        .moderation
        .ban(group.id, admin1, admin2, None)
        .await
        .unwrap_err();
    assert!(matches!(err, crate::ApplicationError::PermissionDenied { .. }));

    // creator 可以
    h.moderation.ban(group.id, creator, admin2, None).await.unwrap();
    let stored = h.groups.find_by_id(group.id).await.unwrap().unwrap();
    assert!(stored.is_banned(admin2));
}
