//! Permission overrides and the per-channel cache that holds them.
//!
//! A channel keeps at most one override per target. Targets are members
//! (keyed by their user id) or roles (keyed by the role id).

use hearth_rest::{RemoteFailure, RestError, RestResult};
use hearth_types::{ChannelId, PermissionSet, RoleId, UserId};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

/// Who an override applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OverrideTarget {
    Member(UserId),
    Role(RoleId),
}

impl OverrideTarget {
    /// Cache key: the user id for members, the role id for roles.
    pub fn id(&self) -> u64 {
        match self {
            Self::Member(user) => user.get(),
            Self::Role(role) => role.get(),
        }
    }

    pub fn is_member(&self) -> bool {
        matches!(self, Self::Member(_))
    }

    pub fn is_role(&self) -> bool {
        matches!(self, Self::Role(_))
    }

    /// Wire discriminator: `0` for roles, `1` for members.
    pub fn wire_type(&self) -> u8 {
        match self {
            Self::Role(_) => 0,
            Self::Member(_) => 1,
        }
    }
}

impl fmt::Display for OverrideTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Member(user) => write!(f, "member {user}"),
            Self::Role(role) => write!(f, "role {role}"),
        }
    }
}

/// Allow/deny masks applied to one target in one channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionOverride {
    channel_id: ChannelId,
    target: OverrideTarget,
    allow: PermissionSet,
    deny: PermissionSet,
}

#[derive(Deserialize)]
struct OverrideWire {
    /// Role or user id depending on `kind`; both share one wire format.
    id: RoleId,
    #[serde(rename = "type")]
    kind: u8,
    #[serde(default)]
    allow: PermissionSet,
    #[serde(default)]
    deny: PermissionSet,
}

impl PermissionOverride {
    pub fn new(
        channel_id: ChannelId,
        target: OverrideTarget,
        allow: PermissionSet,
        deny: PermissionSet,
    ) -> Self {
        Self {
            channel_id,
            target,
            allow,
            deny,
        }
    }

    /// Decodes an override object as sent by the remote
    /// (`{"id", "type", "allow", "deny"}`).
    pub fn from_wire(channel_id: ChannelId, value: &serde_json::Value) -> Result<Self, RemoteFailure> {
        let wire = OverrideWire::deserialize(value)?;
        let id = wire.id.get();
        let target = match wire.kind {
            0 => OverrideTarget::Role(RoleId::new(id)),
            1 => OverrideTarget::Member(UserId::new(id)),
            other => {
                return Err(RemoteFailure::new(
                    None,
                    format!("unknown override type {other}"),
                ))
            }
        };
        Ok(Self::new(channel_id, target, wire.allow, wire.deny))
    }

    pub fn channel_id(&self) -> ChannelId {
        self.channel_id
    }

    pub fn target(&self) -> OverrideTarget {
        self.target
    }

    pub fn target_id(&self) -> u64 {
        self.target.id()
    }

    pub fn is_member_override(&self) -> bool {
        self.target.is_member()
    }

    pub fn is_role_override(&self) -> bool {
        self.target.is_role()
    }

    pub fn allowed(&self) -> PermissionSet {
        self.allow
    }

    pub fn denied(&self) -> PermissionSet {
        self.deny
    }

    /// Bits neither allowed nor denied.
    pub fn inherited(&self) -> PermissionSet {
        PermissionSet::all().difference(self.allow | self.deny)
    }
}

/// Overrides of one channel, keyed by target id.
///
/// Readers take a short shared lock; every record is an immutable `Arc`, so a
/// snapshot taken while writers are active holds only whole records.
#[derive(Debug, Default)]
pub struct OverrideCache {
    entries: RwLock<HashMap<u64, Arc<PermissionOverride>>>,
}

impl OverrideCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, target_id: u64) -> Option<Arc<PermissionOverride>> {
        self.read().get(&target_id).cloned()
    }

    pub fn contains(&self, target_id: u64) -> bool {
        self.read().contains_key(&target_id)
    }

    /// Snapshot of every override, in no particular order.
    pub fn list_all(&self) -> Vec<Arc<PermissionOverride>> {
        self.read().values().cloned().collect()
    }

    pub fn list_member_overrides(&self) -> Vec<Arc<PermissionOverride>> {
        self.list_all()
            .into_iter()
            .filter(|o| o.is_member_override())
            .collect()
    }

    pub fn list_role_overrides(&self) -> Vec<Arc<PermissionOverride>> {
        self.list_all()
            .into_iter()
            .filter(|o| o.is_role_override())
            .collect()
    }

    /// Fails with `AlreadyExists` if `target` already has an override.
    pub fn ensure_absent(&self, target: OverrideTarget) -> RestResult<()> {
        if self.contains(target.id()) {
            return Err(RestError::AlreadyExists(format!(
                "{target} already has a permission override in this channel"
            )));
        }
        Ok(())
    }

    /// Inserts or replaces the override for the record's target.
    pub fn insert(&self, record: PermissionOverride) -> Arc<PermissionOverride> {
        let record = Arc::new(record);
        self.write().insert(record.target_id(), record.clone());
        record
    }

    pub fn remove(&self, target_id: u64) -> Option<Arc<PermissionOverride>> {
        self.write().remove(&target_id)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<u64, Arc<PermissionOverride>>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<u64, Arc<PermissionOverride>>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}
