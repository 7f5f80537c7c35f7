//! Local authorization: roles, members, and effective permission evaluation.
//!
//! Permission checks never leave the process. [`compute_permissions`] is a
//! pure function over an explicit [`AuthContext`]; the
//! [`AuthorizationOracle`] trait is the seam channels consult before building
//! privileged actions.

use crate::channel::GuildChannel;
use crate::overrides::{OverrideTarget, PermissionOverride};
use hearth_types::{GuildId, Permission, PermissionSet, RoleId, UserId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// A guild role and the permissions it grants guild-wide.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub guild_id: GuildId,
    pub name: String,
    pub permissions: PermissionSet,
}

impl Role {
    pub fn new(id: RoleId, guild_id: GuildId, name: impl Into<String>, permissions: PermissionSet) -> Self {
        Self {
            id,
            guild_id,
            name: name.into(),
            permissions,
        }
    }

    /// The `@everyone` role of `guild_id`.
    pub fn everyone(guild_id: GuildId, permissions: PermissionSet) -> Self {
        Self::new(guild_id.everyone_role(), guild_id, "@everyone", permissions)
    }

    pub fn is_everyone(&self) -> bool {
        self.id == self.guild_id.everyone_role()
    }
}

/// A user's membership in a guild.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub user_id: UserId,
    pub guild_id: GuildId,
    #[serde(default)]
    pub role_ids: Vec<RoleId>,
}

impl Member {
    pub fn new(user_id: UserId, guild_id: GuildId) -> Self {
        Self {
            user_id,
            guild_id,
            role_ids: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_role(mut self, role: RoleId) -> Self {
        if !self.role_ids.contains(&role) {
            self.role_ids.push(role);
        }
        self
    }
}

/// The target of an override request: a member or a role.
#[derive(Debug, Clone, Copy)]
pub enum PermissionHolder<'a> {
    Member(&'a Member),
    Role(&'a Role),
}

impl PermissionHolder<'_> {
    pub fn guild_id(&self) -> GuildId {
        match self {
            Self::Member(member) => member.guild_id,
            Self::Role(role) => role.guild_id,
        }
    }

    pub fn target(&self) -> OverrideTarget {
        match self {
            Self::Member(member) => OverrideTarget::Member(member.user_id),
            Self::Role(role) => OverrideTarget::Role(role.id),
        }
    }
}

impl<'a> From<&'a Member> for PermissionHolder<'a> {
    fn from(member: &'a Member) -> Self {
        Self::Member(member)
    }
}

impl<'a> From<&'a Role> for PermissionHolder<'a> {
    fn from(role: &'a Role) -> Self {
        Self::Role(role)
    }
}

/// Everything needed to evaluate one member's permissions in one channel.
#[derive(Debug, Clone, Copy)]
pub struct AuthContext<'a> {
    pub guild_id: GuildId,
    pub owner_id: UserId,
    pub member: &'a Member,
    pub roles: &'a HashMap<RoleId, Role>,
    pub overrides: &'a [Arc<PermissionOverride>],
}

/// Effective permissions of `ctx.member` in the channel whose overrides are
/// `ctx.overrides`.
///
/// The owner and `ADMINISTRATOR` holders get everything. Otherwise the guild
/// base (`@everyone` plus the member's roles) is adjusted by the `@everyone`
/// override, then the combined overrides of the member's roles, then the
/// member's own override. At each step denies apply before allows.
pub fn compute_permissions(ctx: &AuthContext<'_>) -> PermissionSet {
    if ctx.member.user_id == ctx.owner_id {
        return PermissionSet::all();
    }

    let everyone = ctx.guild_id.everyone_role();
    let mut perms = ctx
        .roles
        .get(&everyone)
        .map(|r| r.permissions)
        .unwrap_or_default();
    for role in ctx.member.role_ids.iter().filter_map(|id| ctx.roles.get(id)) {
        perms |= role.permissions;
    }
    if perms.contains(Permission::Administrator) {
        return PermissionSet::all();
    }

    let find = |target: OverrideTarget| ctx.overrides.iter().find(|o| o.target() == target);

    if let Some(o) = find(OverrideTarget::Role(everyone)) {
        perms = perms.difference(o.denied()) | o.allowed();
    }

    let mut role_allow = PermissionSet::empty();
    let mut role_deny = PermissionSet::empty();
    for o in ctx.overrides {
        if let OverrideTarget::Role(id) = o.target() {
            if id != everyone && ctx.member.role_ids.contains(&id) {
                role_allow |= o.allowed();
                role_deny |= o.denied();
            }
        }
    }
    perms = perms.difference(role_deny) | role_allow;

    if let Some(o) = find(OverrideTarget::Member(ctx.member.user_id)) {
        perms = perms.difference(o.denied()) | o.allowed();
    }
    perms
}

/// Answers whether the acting member may do something in a channel.
/// Implementations consult local state only.
pub trait AuthorizationOracle: Send + Sync {
    fn has_permission(&self, channel: &GuildChannel, permission: Permission) -> bool;
}

/// Oracle evaluating the guild's self member with [`compute_permissions`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SelfMemberOracle;

impl AuthorizationOracle for SelfMemberOracle {
    fn has_permission(&self, channel: &GuildChannel, permission: Permission) -> bool {
        let Ok(guild) = channel.guild() else {
            return false;
        };
        let member = guild.self_member();
        let overrides = channel.permission_overrides();
        guild.with_roles(|roles| {
            compute_permissions(&AuthContext {
                guild_id: guild.id(),
                owner_id: guild.owner_id(),
                member: &member,
                roles,
                overrides: &overrides,
            })
            .contains(permission)
        })
    }
}

/// Oracle that grants everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAllOracle;

impl AuthorizationOracle for AllowAllOracle {
    fn has_permission(&self, _channel: &GuildChannel, _permission: Permission) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearth_types::ChannelId;

    const GUILD: GuildId = GuildId::new(1);
    const OWNER: UserId = UserId::new(999);
    const MODS: RoleId = RoleId::new(5);

    fn roles(everyone: PermissionSet, mods: PermissionSet) -> HashMap<RoleId, Role> {
        let mut map = HashMap::new();
        map.insert(GUILD.everyone_role(), Role::everyone(GUILD, everyone));
        map.insert(MODS, Role::new(MODS, GUILD, "mods", mods));
        map
    }

    fn over(target: OverrideTarget, allow: PermissionSet, deny: PermissionSet) -> Arc<PermissionOverride> {
        Arc::new(PermissionOverride::new(ChannelId::new(42), target, allow, deny))
    }

    fn eval(member: &Member, roles: &HashMap<RoleId, Role>, overrides: &[Arc<PermissionOverride>]) -> PermissionSet {
        compute_permissions(&AuthContext {
            guild_id: GUILD,
            owner_id: OWNER,
            member,
            roles,
            overrides,
        })
    }

    #[test]
    fn owner_has_everything() {
        let owner = Member::new(OWNER, GUILD);
        let perms = eval(&owner, &roles(PermissionSet::empty(), PermissionSet::empty()), &[]);
        assert_eq!(perms, PermissionSet::all());
    }

    #[test]
    fn base_is_union_of_everyone_and_member_roles() {
        let member = Member::new(UserId::new(7), GUILD).with_role(MODS);
        let perms = eval(
            &member,
            &roles(Permission::ViewChannel.into(), Permission::ManageChannel.into()),
            &[],
        );
        assert!(perms.contains(Permission::ViewChannel));
        assert!(perms.contains(Permission::ManageChannel));
        assert!(!perms.contains(Permission::ManagePermissions));
    }

    #[test]
    fn administrator_bypasses_overrides() {
        let member = Member::new(UserId::new(7), GUILD).with_role(MODS);
        let deny_all = over(
            OverrideTarget::Member(UserId::new(7)),
            PermissionSet::empty(),
            PermissionSet::all(),
        );
        let perms = eval(
            &member,
            &roles(PermissionSet::empty(), Permission::Administrator.into()),
            &[deny_all],
        );
        assert_eq!(perms, PermissionSet::all());
    }

    #[test]
    fn member_override_beats_role_override() {
        let member = Member::new(UserId::new(7), GUILD).with_role(MODS);
        let overrides = [
            over(OverrideTarget::Role(MODS), PermissionSet::empty(), Permission::ManageChannel.into()),
            over(
                OverrideTarget::Member(UserId::new(7)),
                Permission::ManageChannel.into(),
                PermissionSet::empty(),
            ),
        ];
        let perms = eval(&member, &roles(PermissionSet::empty(), Permission::ManageChannel.into()), &overrides);
        assert!(perms.contains(Permission::ManageChannel));
    }

    #[test]
    fn role_override_allow_wins_over_everyone_deny() {
        let member = Member::new(UserId::new(7), GUILD).with_role(MODS);
        let overrides = [
            over(
                OverrideTarget::Role(GUILD.everyone_role()),
                PermissionSet::empty(),
                Permission::ViewChannel.into(),
            ),
            over(OverrideTarget::Role(MODS), Permission::ViewChannel.into(), PermissionSet::empty()),
        ];
        let perms = eval(&member, &roles(Permission::ViewChannel.into(), PermissionSet::empty()), &overrides);
        assert!(perms.contains(Permission::ViewChannel));

        let outsider = Member::new(UserId::new(8), GUILD);
        let perms = eval(&outsider, &roles(Permission::ViewChannel.into(), PermissionSet::empty()), &overrides);
        assert!(!perms.contains(Permission::ViewChannel));
    }

    #[test]
    fn overrides_of_roles_the_member_lacks_are_ignored() {
        let member = Member::new(UserId::new(7), GUILD);
        let overrides = [over(
            OverrideTarget::Role(MODS),
            Permission::ManagePermissions.into(),
            PermissionSet::empty(),
        )];
        let perms = eval(&member, &roles(PermissionSet::empty(), PermissionSet::empty()), &overrides);
        assert!(!perms.contains(Permission::ManagePermissions));
    }
}
