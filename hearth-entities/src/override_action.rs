//! Builder for permission override requests.

use crate::overrides::{OverrideCache, OverrideTarget, PermissionOverride};
use hearth_rest::{routes, RestAction, RestClient, RestResult};
use hearth_types::{ChannelId, PermissionSet};
use serde_json::json;
use std::sync::Arc;

/// Pending create-or-replace of one channel override.
///
/// Starts from the target's current allow/deny (empty for new overrides).
/// A bit is never both allowed and denied: granting clears the deny bit and
/// vice versa.
#[derive(Debug, Clone)]
pub struct PermissionOverrideAction {
    client: RestClient,
    channel_id: ChannelId,
    target: OverrideTarget,
    cache: Arc<OverrideCache>,
    allow: PermissionSet,
    deny: PermissionSet,
    reason: Option<String>,
}

impl PermissionOverrideAction {
    pub(crate) fn new(
        client: RestClient,
        channel_id: ChannelId,
        target: OverrideTarget,
        cache: Arc<OverrideCache>,
    ) -> Self {
        let (allow, deny) = cache
            .get(target.id())
            .map(|o| (o.allowed(), o.denied()))
            .unwrap_or_default();
        Self {
            client,
            channel_id,
            target,
            cache,
            allow,
            deny,
            reason: None,
        }
    }

    pub fn target(&self) -> OverrideTarget {
        self.target
    }

    pub fn allowed(&self) -> PermissionSet {
        self.allow
    }

    pub fn denied(&self) -> PermissionSet {
        self.deny
    }

    #[must_use]
    pub fn grant(mut self, permissions: impl Into<PermissionSet>) -> Self {
        let permissions = permissions.into();
        self.allow |= permissions;
        self.deny = self.deny.difference(permissions);
        self
    }

    #[must_use]
    pub fn deny(mut self, permissions: impl Into<PermissionSet>) -> Self {
        let permissions = permissions.into();
        self.deny |= permissions;
        self.allow = self.allow.difference(permissions);
        self
    }

    /// Makes `permissions` inherited again.
    #[must_use]
    pub fn clear(mut self, permissions: impl Into<PermissionSet>) -> Self {
        let permissions = permissions.into();
        self.allow = self.allow.difference(permissions);
        self.deny = self.deny.difference(permissions);
        self
    }

    /// Replaces the allow mask.
    #[must_use]
    pub fn set_allow(mut self, permissions: impl Into<PermissionSet>) -> Self {
        self.allow = permissions.into();
        self.deny = self.deny.difference(self.allow);
        self
    }

    /// Replaces the deny mask.
    #[must_use]
    pub fn set_deny(mut self, permissions: impl Into<PermissionSet>) -> Self {
        self.deny = permissions.into();
        self.allow = self.allow.difference(self.deny);
        self
    }

    #[must_use]
    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// The PUT action. On success the confirmed override is stored in the
    /// channel's cache and returned.
    pub fn into_action(self) -> RestResult<RestAction<Arc<PermissionOverride>>> {
        let body = json!({
            "allow": self.allow,
            "deny": self.deny,
            "type": self.target.wire_type(),
        });
        let route = routes::channels::CREATE_PERM_OVERRIDE
            .compile(&[&self.channel_id.to_string(), &self.target.id().to_string()])?
            .with_body(body);

        let Self {
            client,
            channel_id,
            target,
            cache,
            allow,
            deny,
            reason,
        } = self;
        let action = RestAction::new(client, route, move |_| {
            Ok(cache.insert(PermissionOverride::new(channel_id, target, allow, deny)))
        });
        Ok(match reason {
            Some(reason) => action.reason(reason),
            None => action,
        })
    }
}
