//! Guild channels and their permission-gated actions.
//!
//! Every factory here checks the acting member's permissions against local
//! state first. A refused check returns an error immediately and no action
//! is built, so nothing can reach the remote.

use crate::auth::PermissionHolder;
use crate::guild::Guild;
use crate::invite::{Invite, InviteAction};
use crate::manager::{ChannelManager, LazyManager};
use crate::override_action::PermissionOverrideAction;
use crate::overrides::{OverrideCache, OverrideTarget, PermissionOverride};
use hearth_rest::{routes, RestAction, RestError, RestResult};
use hearth_types::{ChannelId, GuildId, Permission};
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, Weak};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Text,
    Voice,
    Category,
}

#[derive(Debug)]
struct ChannelState {
    name: String,
    parent_id: Option<ChannelId>,
    position: i32,
}

/// A channel inside a guild.
///
/// Identity is the channel id alone. Name, parent and position are updated
/// by the caller once a change is confirmed remotely.
pub struct GuildChannel {
    id: ChannelId,
    kind: ChannelKind,
    guild_id: GuildId,
    guild: Weak<Guild>,
    state: RwLock<ChannelState>,
    overrides: Arc<OverrideCache>,
    manager: LazyManager<ChannelManager>,
    deleted: AtomicBool,
}

/// A raw parent of `0` means "no category".
fn normalize_parent(parent: Option<ChannelId>) -> Option<ChannelId> {
    parent.filter(|p| p.get() != 0)
}

impl GuildChannel {
    pub(crate) fn new(
        id: ChannelId,
        kind: ChannelKind,
        guild: &Arc<Guild>,
        name: String,
        position: i32,
        parent: Option<ChannelId>,
    ) -> Self {
        Self {
            id,
            kind,
            guild_id: guild.id(),
            guild: Arc::downgrade(guild),
            state: RwLock::new(ChannelState {
                name,
                parent_id: normalize_parent(parent),
                position,
            }),
            overrides: Arc::new(OverrideCache::new()),
            manager: LazyManager::new(),
            deleted: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> ChannelId {
        self.id
    }

    pub fn kind(&self) -> ChannelKind {
        self.kind
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    /// The owning guild, if it is still alive.
    pub fn guild(&self) -> RestResult<Arc<Guild>> {
        self.guild.upgrade().ok_or_else(|| {
            RestError::PreconditionViolation(format!(
                "guild {} of channel {} is no longer available",
                self.guild_id, self.id
            ))
        })
    }

    pub fn name(&self) -> String {
        self.state().name.clone()
    }

    pub fn position(&self) -> i32 {
        self.state().position
    }

    pub fn parent_id(&self) -> Option<ChannelId> {
        self.state().parent_id
    }

    /// The category this channel sits in.
    pub fn parent(&self) -> Option<Arc<GuildChannel>> {
        let parent_id = self.parent_id()?;
        self.guild.upgrade()?.category(parent_id)
    }

    pub fn set_name(&self, name: impl Into<String>) -> &Self {
        self.state_mut(|s| s.name = name.into());
        self
    }

    pub fn set_parent(&self, parent: Option<ChannelId>) -> &Self {
        self.state_mut(|s| s.parent_id = normalize_parent(parent));
        self
    }

    pub fn set_position(&self, position: i32) -> &Self {
        self.state_mut(|s| s.position = position);
        self
    }

    pub fn mark_deleted(&self) {
        self.deleted.store(true, Ordering::Release);
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted.load(Ordering::Acquire)
    }

    // ── overrides ─────────────────────────────────────────────────

    pub fn permission_override<'a>(
        &self,
        holder: impl Into<PermissionHolder<'a>>,
    ) -> Option<Arc<PermissionOverride>> {
        self.overrides.get(holder.into().target().id())
    }

    pub fn permission_overrides(&self) -> Vec<Arc<PermissionOverride>> {
        self.overrides.list_all()
    }

    pub fn member_permission_overrides(&self) -> Vec<Arc<PermissionOverride>> {
        self.overrides.list_member_overrides()
    }

    pub fn role_permission_overrides(&self) -> Vec<Arc<PermissionOverride>> {
        self.overrides.list_role_overrides()
    }

    /// Raw cache access for applying override update and delete events.
    pub fn overrides(&self) -> &Arc<OverrideCache> {
        &self.overrides
    }

    // ── permission checks ─────────────────────────────────────────

    /// Fails with `PermissionDenied` unless the acting member holds
    /// `permission` here.
    pub fn check_permission(&self, permission: Permission) -> RestResult<()> {
        self.authorize(permission, None).map(drop)
    }

    fn authorize(&self, permission: Permission, message: Option<&str>) -> RestResult<Arc<Guild>> {
        let guild = self.guild()?;
        if !guild.oracle().has_permission(self, permission) {
            warn!(channel = %self.id, %permission, "missing permission");
            return Err(RestError::PermissionDenied {
                permission,
                message: message.map(str::to_string),
            });
        }
        Ok(guild)
    }

    // ── factories ─────────────────────────────────────────────────

    /// The channel's manager, built on first use. Requires
    /// `MANAGE_CHANNEL` and a live, undeleted channel at that point.
    pub fn manager(&self) -> RestResult<Arc<ChannelManager>> {
        self.manager.get_or_try_init(|| {
            if self.is_deleted() {
                return Err(RestError::PreconditionViolation(format!(
                    "channel {} has been deleted",
                    self.id
                )));
            }
            let guild = self.authorize(Permission::ManageChannel, Some("cannot manage channel"))?;
            Ok(ChannelManager::new(self.id, guild.client().clone()))
        })
    }

    /// Deletes the channel. Requires `MANAGE_CHANNEL`.
    pub fn delete(&self) -> RestResult<RestAction<()>> {
        let guild = self.authorize(Permission::ManageChannel, None)?;
        let route = routes::channels::DELETE_CHANNEL.compile(&[&self.id.to_string()])?;
        Ok(RestAction::discarding(guild.client().clone(), route))
    }

    /// Creates an override for a holder that has none yet.
    ///
    /// Fails with `AlreadyExists` when the holder already has one; use
    /// [`put_permission_override`](Self::put_permission_override) to replace.
    pub fn create_permission_override<'a>(
        &self,
        holder: impl Into<PermissionHolder<'a>>,
    ) -> RestResult<PermissionOverrideAction> {
        let holder = holder.into();
        self.overrides.ensure_absent(holder.target())?;
        self.put_permission_override(holder)
    }

    /// Creates or replaces the holder's override. Requires
    /// `MANAGE_PERMISSIONS`; the holder must belong to this guild.
    pub fn put_permission_override<'a>(
        &self,
        holder: impl Into<PermissionHolder<'a>>,
    ) -> RestResult<PermissionOverrideAction> {
        let holder = holder.into();
        let guild = self.authorize(Permission::ManagePermissions, None)?;
        if holder.guild_id() != self.guild_id {
            return Err(RestError::PreconditionViolation(format!(
                "{} is not from the same guild as channel {}",
                holder.target(),
                self.id
            )));
        }
        Ok(PermissionOverrideAction::new(
            guild.client().clone(),
            self.id,
            holder.target(),
            self.overrides.clone(),
        ))
    }

    /// Removes the target's override. Requires `MANAGE_PERMISSIONS`.
    pub fn delete_permission_override(&self, target: OverrideTarget) -> RestResult<RestAction<()>> {
        let guild = self.authorize(Permission::ManagePermissions, None)?;
        let route = routes::channels::DELETE_PERM_OVERRIDE
            .compile(&[&self.id.to_string(), &target.id().to_string()])?;
        let cache = self.overrides.clone();
        Ok(RestAction::new(guild.client().clone(), route, move |_| {
            cache.remove(target.id());
            Ok(())
        }))
    }

    /// Requires `CREATE_INSTANT_INVITE`.
    pub fn create_invite(&self) -> RestResult<InviteAction> {
        let guild = self.authorize(Permission::CreateInstantInvite, None)?;
        Ok(InviteAction::new(guild.client().clone(), self.id))
    }

    /// Lists the channel's invites. Requires `MANAGE_CHANNEL`.
    pub fn invites(&self) -> RestResult<RestAction<Vec<Invite>>> {
        let guild = self.authorize(Permission::ManageChannel, None)?;
        let route = routes::invites::GET_CHANNEL_INVITES.compile(&[&self.id.to_string()])?;
        Ok(RestAction::new(guild.client().clone(), route, |response| {
            Ok(Invite::list_from(&response)?)
        }))
    }

    fn state(&self) -> RwLockReadGuard<'_, ChannelState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn state_mut(&self, f: impl FnOnce(&mut ChannelState)) {
        f(&mut self.state.write().unwrap_or_else(PoisonError::into_inner));
    }
}

impl PartialEq for GuildChannel {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for GuildChannel {}

impl Hash for GuildChannel {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl std::fmt::Debug for GuildChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state();
        f.debug_struct("GuildChannel")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("guild_id", &self.guild_id)
            .field("name", &state.name)
            .field("position", &state.position)
            .field("parent_id", &state.parent_id)
            .field("overrides", &self.overrides.len())
            .finish()
    }
}
