//! 群组管控权限判定
//!
//! 所有管控操作（封禁、禁言、踢出、角色变更）的权限规则都集中在
//! 这里，纯函数，无副作用。HTTP 路由和实时事件处理共用同一套
//! 判定，禁止在调用方重新推导角色比较逻辑。

use crate::entities::group::GroupRole;
use crate::value_objects::UserId;

/// 判定 actor 能否对 target 执行管控操作（封禁/禁言/踢出）。
///
/// 规则：不能对自己操作；目标角色必须严格低于操作者角色。
/// 展开即：creator 可管 admin/moderator/member；admin 可管
/// moderator/member；moderator 只可管 member；member 谁也管不了。
pub fn can_moderate(
    actor: UserId,
    actor_role: GroupRole,
    target: UserId,
    target_role: GroupRole,
) -> bool {
    actor != target && target_role < actor_role
}

/// 判定 actor 能否把 target 的角色改为 new_role。
///
/// 在 `can_moderate` 的基础上追加两条：creator 角色永远不可
/// 赋予或移除；admin 角色只有 creator 能赋予或摘除。
pub fn can_assign_role(
    actor: UserId,
    actor_role: GroupRole,
    target: UserId,
    target_role: GroupRole,
    new_role: GroupRole,
) -> bool {
    if !can_moderate(actor, actor_role, target, target_role) {
        return false;
    }
    if target_role == GroupRole::Creator || new_role == GroupRole::Creator {
        return false;
    }
    if (new_role == GroupRole::Admin || target_role == GroupRole::Admin)
        && actor_role != GroupRole::Creator
    {
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn user() -> UserId {
        UserId::new(Uuid::new_v4())
    }

    #[test]
    fn moderation_table_is_exhaustive() {
        use GroupRole::*;
        let actor = user();
        let target = user();

        // (actor_role, target_role, allowed)
        let cases = [
            (Creator, Creator, false),
            (Creator, Admin, true),
            (Creator, Moderator, true),
            (Creator, Member, true),
            (Admin, Creator, false),
            (Admin, Admin, false),
            (Admin, Moderator, true),
            (Admin, Member, true),
            (Moderator, Creator, false),
            (Moderator, Admin, false),
            (Moderator, Moderator, false),
            (Moderator, Member, true),
            (Member, Creator, false),
            (Member, Admin, false),
            (Member, Moderator, false),
            (Member, Member, false),
        ];

        for (actor_role, target_role, allowed) in cases {
            assert_eq!(
                can_moderate(actor, actor_role, target, target_role),
                allowed,
                "{actor_role} -> {target_role}"
            );
        }
    }

    #[test]
    fn never_acts_on_self() {
        let actor = user();
        assert!(!can_moderate(
            actor,
            GroupRole::Creator,
            actor,
            GroupRole::Member
        ));
    }

    #[test]
    fn only_creator_assigns_or_removes_admin() {
        let actor = user();
        let target = user();
        use GroupRole::*;

        // creator 提拔 moderator 为 admin：允许
        assert!(can_assign_role(actor, Creator, target, Moderator, Admin));
        // creator 把 admin 降为 member：允许
        assert!(can_assign_role(actor, Creator, target, Admin, Member));
        // admin 提拔 member 为 admin：拒绝
        assert!(!can_assign_role(actor, Admin, target, Member, Admin));
        // admin 把 moderator 改成 member：允许
        assert!(can_assign_role(actor, Admin, target, Moderator, Member));
    }

    #[test]
    fn creator_role_never_transferable() {
        let actor = user();
        let target = user();
        use GroupRole::*;

        assert!(!can_assign_role(actor, Creator, target, Member, Creator));
        assert!(!can_assign_role(actor, Creator, target, Creator, Member));
    }
}
