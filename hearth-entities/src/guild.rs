//! The guild: owner of channels, roles and the acting member.

use crate::auth::{AuthorizationOracle, Member, Role, SelfMemberOracle};
use crate::channel::{ChannelKind, GuildChannel};
use hearth_rest::RestClient;
use hearth_types::{ChannelId, GuildId, PermissionSet, RoleId, UserId};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

/// Local view of one guild.
///
/// Channels are owned here and point back through a weak reference, so
/// dropping the guild makes guild-dependent channel operations fail instead
/// of keeping stale state alive.
pub struct Guild {
    id: GuildId,
    owner_id: UserId,
    client: RestClient,
    oracle: Arc<dyn AuthorizationOracle>,
    roles: RwLock<HashMap<RoleId, Role>>,
    self_member: RwLock<Member>,
    channels: RwLock<HashMap<ChannelId, Arc<GuildChannel>>>,
}

impl Guild {
    /// Guild acting as `self_user`, checked by [`SelfMemberOracle`].
    /// Starts with an `@everyone` role granting nothing.
    pub fn new(id: GuildId, owner_id: UserId, self_user: UserId, client: RestClient) -> Arc<Self> {
        Self::with_oracle(id, owner_id, self_user, client, Arc::new(SelfMemberOracle))
    }

    pub fn with_oracle(
        id: GuildId,
        owner_id: UserId,
        self_user: UserId,
        client: RestClient,
        oracle: Arc<dyn AuthorizationOracle>,
    ) -> Arc<Self> {
        let everyone = Role::everyone(id, PermissionSet::empty());
        Arc::new(Self {
            id,
            owner_id,
            client,
            oracle,
            roles: RwLock::new(HashMap::from([(everyone.id, everyone)])),
            self_member: RwLock::new(Member::new(self_user, id)),
            channels: RwLock::new(HashMap::new()),
        })
    }

    pub fn id(&self) -> GuildId {
        self.id
    }

    pub fn owner_id(&self) -> UserId {
        self.owner_id
    }

    pub fn client(&self) -> &RestClient {
        &self.client
    }

    pub fn oracle(&self) -> &Arc<dyn AuthorizationOracle> {
        &self.oracle
    }

    // ── roles ─────────────────────────────────────────────────────

    /// Adds or replaces a role.
    pub fn add_role(&self, role: Role) {
        self.roles
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(role.id, role);
    }

    pub fn remove_role(&self, id: RoleId) -> Option<Role> {
        self.roles
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
    }

    pub fn role(&self, id: RoleId) -> Option<Role> {
        self.roles
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }

    pub fn everyone_role(&self) -> Option<Role> {
        self.role(self.id.everyone_role())
    }

    /// Runs `f` with the role table locked for reading.
    pub fn with_roles<R>(&self, f: impl FnOnce(&HashMap<RoleId, Role>) -> R) -> R {
        f(&self.roles.read().unwrap_or_else(PoisonError::into_inner))
    }

    // ── self member ───────────────────────────────────────────────

    pub fn self_member(&self) -> Member {
        self.self_member
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_self_member(&self, member: Member) {
        *self.self_member.write().unwrap_or_else(PoisonError::into_inner) = member;
    }

    // ── channels ──────────────────────────────────────────────────

    /// Registers a channel and returns it. An existing channel with the same
    /// id is replaced.
    pub fn add_channel(
        self: &Arc<Self>,
        id: ChannelId,
        kind: ChannelKind,
        name: impl Into<String>,
        position: i32,
        parent: Option<ChannelId>,
    ) -> Arc<GuildChannel> {
        let channel = Arc::new(GuildChannel::new(id, kind, self, name.into(), position, parent));
        debug!(guild = %self.id, channel = %id, ?kind, "channel added");
        self.channels
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, channel.clone());
        channel
    }

    pub fn channel(&self, id: ChannelId) -> Option<Arc<GuildChannel>> {
        self.channels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }

    /// The channel with `id` if it is a category.
    pub fn category(&self, id: ChannelId) -> Option<Arc<GuildChannel>> {
        self.channel(id).filter(|c| c.kind() == ChannelKind::Category)
    }

    pub fn channels(&self) -> Vec<Arc<GuildChannel>> {
        self.channels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    /// Drops a channel after a delete event and marks it deleted, so any
    /// handle still held elsewhere refuses new managers.
    pub fn remove_channel(&self, id: ChannelId) -> Option<Arc<GuildChannel>> {
        let removed = self
            .channels
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
        if let Some(channel) = &removed {
            channel.mark_deleted();
            debug!(guild = %self.id, channel = %id, "channel removed");
        }
        removed
    }
}

impl std::fmt::Debug for Guild {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Guild")
            .field("id", &self.id)
            .field("owner_id", &self.owner_id)
            .finish_non_exhaustive()
    }
}
