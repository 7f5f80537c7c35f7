//! Core type definitions for hearth.
//!
//! This crate defines the small, transport-agnostic types every other
//! hearth crate agrees on:
//! - 64-bit entity identifiers (channels, guilds, roles, users)
//! - The permission vocabulary and its bitset representation
//!
//! Entity state and remote actions live in `hearth-entities` and
//! `hearth-rest`, not here.

mod ids;
mod permission;
mod repr;

pub use ids::{ChannelId, GuildId, RoleId, UserId};
pub use permission::{Permission, PermissionSet};

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid id {input:?}: {source}")]
    InvalidId {
        input: String,
        #[source]
        source: std::num::ParseIntError,
    },

    #[error("invalid permission name: {0}")]
    InvalidPermission(String),
}
