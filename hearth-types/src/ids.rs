//! Identifier types used throughout hearth.
//!
//! Every remote entity is named by an opaque 64-bit id that is assigned by
//! the service and never reused. Each kind of entity gets its own newtype so
//! a role id cannot be passed where a channel id is expected.

use crate::repr::U64Repr;
use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "U64Repr", into = "String")]
        pub struct $name(u64);

        impl $name {
            /// Wraps a raw id value.
            #[must_use]
            pub const fn new(raw: u64) -> Self {
                Self(raw)
            }

            /// Returns the raw id value.
            #[must_use]
            pub const fn get(&self) -> u64 {
                self.0
            }

            /// Parses an id from its decimal form.
            pub fn parse(s: &str) -> Result<Self, Error> {
                s.trim()
                    .parse()
                    .map(Self)
                    .map_err(|source| Error::InvalidId {
                        input: s.to_string(),
                        source,
                    })
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> String {
                id.0.to_string()
            }
        }

        impl From<$name> for u64 {
            fn from(id: $name) -> u64 {
                id.0
            }
        }

        impl TryFrom<U64Repr> for $name {
            type Error = std::num::ParseIntError;

            fn try_from(repr: U64Repr) -> Result<Self, Self::Error> {
                repr.into_u64().map(Self)
            }
        }
    };
}

entity_id! {
    /// Identifier of a channel (text, voice or category).
    ChannelId
}

entity_id! {
    /// Identifier of a guild, the top-level container of channels and roles.
    /// The guild's `@everyone` role carries the same value.
    GuildId
}

entity_id! {
    /// Identifier of a role inside a guild.
    RoleId
}

entity_id! {
    /// Identifier of a user. A member override is keyed by the member's
    /// user id.
    UserId
}

impl GuildId {
    /// Returns the id of this guild's `@everyone` role.
    #[must_use]
    pub const fn everyone_role(&self) -> RoleId {
        RoleId(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn everyone_role_shares_guild_value() {
        let guild = GuildId::new(81384788765712384);
        assert_eq!(guild.everyone_role().get(), guild.get());
    }

    #[test]
    fn parse_trims_whitespace() {
        assert_eq!(ChannelId::parse(" 42 ").unwrap(), ChannelId::new(42));
    }

    #[test]
    fn parse_reports_input() {
        let err = RoleId::parse("role-7").unwrap_err();
        assert!(err.to_string().contains("role-7"));
    }
}
