//! Guild channels with cached permission overrides.
//!
//! A [`GuildChannel`] is the factory for the remote actions that change it:
//! deleting it, writing permission overrides, creating and listing invites,
//! and editing it through a lazily created [`ChannelManager`]. Each factory
//! checks permissions locally through the guild's [`AuthorizationOracle`]
//! and only then hands back a [`RestAction`](hearth_rest::RestAction) for
//! the caller to issue.
//!
//! ```no_run
//! use hearth_entities::{ChannelKind, Guild, Member, Role};
//! use hearth_rest::mock::MockRequester;
//! use hearth_rest::{ExecutionPool, PoolConfig, RestClient};
//! use hearth_types::{ChannelId, GuildId, Permission, RoleId, UserId};
//! use std::sync::Arc;
//!
//! let pool = ExecutionPool::new(&PoolConfig::default()).unwrap();
//! let client = RestClient::new(pool, Arc::new(MockRequester::new()));
//! let guild = Guild::new(GuildId::new(1), UserId::new(99), UserId::new(2), client);
//! guild.add_role(Role::new(RoleId::new(5), guild.id(), "mods", Permission::ManagePermissions.into()));
//! guild.set_self_member(Member::new(UserId::new(2), guild.id()).with_role(RoleId::new(5)));
//!
//! let channel = guild.add_channel(ChannelId::new(42), ChannelKind::Text, "general", 0, None);
//! let member = Member::new(UserId::new(7), guild.id());
//! let record = channel
//!     .create_permission_override(&member)
//!     .unwrap()
//!     .grant(Permission::ViewChannel)
//!     .into_action()
//!     .unwrap()
//!     .complete()
//!     .unwrap();
//! assert!(record.is_member_override());
//! ```

mod auth;
mod channel;
mod guild;
mod invite;
mod manager;
mod override_action;
mod overrides;

pub use auth::{
    compute_permissions, AllowAllOracle, AuthContext, AuthorizationOracle, Member, PermissionHolder, Role,
    SelfMemberOracle,
};
pub use channel::{ChannelKind, GuildChannel};
pub use guild::Guild;
pub use invite::{Invite, InviteAction, MAX_INVITE_AGE, MAX_INVITE_USES};
pub use manager::{ChannelManager, LazyManager, ManagerState};
pub use override_action::PermissionOverrideAction;
pub use overrides::{OverrideCache, OverrideTarget, PermissionOverride};
