//! Permission vocabulary and bitset.
//!
//! Each permission is a single bit in a 64-bit mask. Roles carry a mask of
//! granted permissions; channel overrides carry an allow mask and a deny mask.

use crate::repr::U64Repr;
use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::str::FromStr;

/// Individual permission a member may hold in a guild or channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Permission {
    CreateInstantInvite,
    KickMembers,
    BanMembers,
    Administrator,
    ManageChannel,
    ManageServer,
    ViewChannel,
    MessageWrite,
    MessageManage,
    VoiceConnect,
    VoiceSpeak,
    ManagePermissions,
    ManageWebhooks,
}

impl Permission {
    /// Every known permission, in bit order.
    pub const ALL: [Permission; 13] = [
        Self::CreateInstantInvite,
        Self::KickMembers,
        Self::BanMembers,
        Self::Administrator,
        Self::ManageChannel,
        Self::ManageServer,
        Self::ViewChannel,
        Self::MessageWrite,
        Self::MessageManage,
        Self::VoiceConnect,
        Self::VoiceSpeak,
        Self::ManagePermissions,
        Self::ManageWebhooks,
    ];

    /// Bit offset of this permission in the wire mask.
    pub const fn offset(&self) -> u32 {
        match self {
            Self::CreateInstantInvite => 0,
            Self::KickMembers => 1,
            Self::BanMembers => 2,
            Self::Administrator => 3,
            Self::ManageChannel => 4,
            Self::ManageServer => 5,
            Self::ViewChannel => 10,
            Self::MessageWrite => 11,
            Self::MessageManage => 13,
            Self::VoiceConnect => 20,
            Self::VoiceSpeak => 21,
            Self::ManagePermissions => 28,
            Self::ManageWebhooks => 29,
        }
    }

    /// Mask with only this permission's bit set.
    pub const fn raw(&self) -> u64 {
        1 << self.offset()
    }

    /// Upper-case name used in logs and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateInstantInvite => "CREATE_INSTANT_INVITE",
            Self::KickMembers => "KICK_MEMBERS",
            Self::BanMembers => "BAN_MEMBERS",
            Self::Administrator => "ADMINISTRATOR",
            Self::ManageChannel => "MANAGE_CHANNEL",
            Self::ManageServer => "MANAGE_SERVER",
            Self::ViewChannel => "VIEW_CHANNEL",
            Self::MessageWrite => "MESSAGE_WRITE",
            Self::MessageManage => "MESSAGE_MANAGE",
            Self::VoiceConnect => "VOICE_CONNECT",
            Self::VoiceSpeak => "VOICE_SPEAK",
            Self::ManagePermissions => "MANAGE_PERMISSIONS",
            Self::ManageWebhooks => "MANAGE_WEBHOOKS",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Permission {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::InvalidPermission(s.to_string()))
    }
}

/// Set of permissions stored as the raw wire mask.
///
/// Unknown bits received from the remote are preserved so that an override
/// can be written back without dropping permissions this crate does not name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "U64Repr", into = "String")]
pub struct PermissionSet(u64);

impl PermissionSet {
    /// The empty set.
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Every bit set, including bits this crate does not name.
    #[must_use]
    pub const fn all() -> Self {
        Self(u64::MAX)
    }

    /// Wraps a raw wire mask.
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn raw(&self) -> u64 {
        self.0
    }

    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub const fn contains(&self, permission: Permission) -> bool {
        self.0 & permission.raw() != 0
    }

    pub fn insert(&mut self, permission: Permission) {
        self.0 |= permission.raw();
    }

    pub fn remove(&mut self, permission: Permission) {
        self.0 &= !permission.raw();
    }

    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Bits in `self` that are not in `other`.
    #[must_use]
    pub const fn difference(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    /// Known permissions present in this set, in bit order.
    pub fn iter(&self) -> impl Iterator<Item = Permission> + '_ {
        Permission::ALL.into_iter().filter(|p| self.contains(*p))
    }
}

impl From<Permission> for PermissionSet {
    fn from(permission: Permission) -> Self {
        Self(permission.raw())
    }
}

impl FromIterator<Permission> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = Permission>>(iter: I) -> Self {
        let mut set = Self::empty();
        for permission in iter {
            set.insert(permission);
        }
        set
    }
}

impl BitOr for PermissionSet {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl BitOrAssign for PermissionSet {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl From<PermissionSet> for String {
    fn from(set: PermissionSet) -> String {
        set.0.to_string()
    }
}

impl TryFrom<U64Repr> for PermissionSet {
    type Error = std::num::ParseIntError;

    fn try_from(repr: U64Repr) -> Result<Self, Self::Error> {
        repr.into_u64().map(Self)
    }
}
