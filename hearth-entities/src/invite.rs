//! Channel invites and the builder for creating them.

use hearth_rest::{routes, RawResponse, RemoteFailure, RestAction, RestClient, RestError, RestResult};
use hearth_types::{ChannelId, UserId};
use serde::{Deserialize, Serialize};

/// Longest invite lifetime the remote accepts, in seconds (one week).
pub const MAX_INVITE_AGE: u32 = 604_800;
/// Highest use limit the remote accepts.
pub const MAX_INVITE_USES: u32 = 100;

/// An invite link to a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invite {
    pub code: String,
    pub channel_id: Option<ChannelId>,
    pub inviter_id: Option<UserId>,
    /// Lifetime in seconds; `0` never expires.
    pub max_age: u32,
    /// Use limit; `0` is unlimited.
    pub max_uses: u32,
    pub uses: u32,
    pub temporary: bool,
}

#[derive(Deserialize)]
struct Ref<T> {
    id: T,
}

#[derive(Deserialize)]
struct InviteWire {
    code: String,
    channel: Option<Ref<ChannelId>>,
    inviter: Option<Ref<UserId>>,
    #[serde(default)]
    max_age: u32,
    #[serde(default)]
    max_uses: u32,
    #[serde(default)]
    uses: u32,
    #[serde(default)]
    temporary: bool,
}

impl From<InviteWire> for Invite {
    fn from(wire: InviteWire) -> Self {
        Self {
            code: wire.code,
            channel_id: wire.channel.map(|c| c.id),
            inviter_id: wire.inviter.map(|u| u.id),
            max_age: wire.max_age,
            max_uses: wire.max_uses,
            uses: wire.uses,
            temporary: wire.temporary,
        }
    }
}

impl Invite {
    pub fn from_json(value: &serde_json::Value) -> Result<Self, RemoteFailure> {
        Ok(InviteWire::deserialize(value)?.into())
    }

    /// Decodes a response holding a JSON array of invites.
    pub fn list_from(response: &RawResponse) -> Result<Vec<Self>, RemoteFailure> {
        response.array()?.iter().map(Self::from_json).collect()
    }

    pub fn url(&self) -> String {
        format!("https://discord.gg/{}", self.code)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
struct InviteBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    max_age: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_uses: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temporary: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    unique: Option<bool>,
}

/// Pending invite creation. Unset fields use the remote's defaults.
#[derive(Debug, Clone)]
pub struct InviteAction {
    client: RestClient,
    channel_id: ChannelId,
    body: InviteBody,
    reason: Option<String>,
}

impl InviteAction {
    pub(crate) fn new(client: RestClient, channel_id: ChannelId) -> Self {
        Self {
            client,
            channel_id,
            body: InviteBody::default(),
            reason: None,
        }
    }

    /// Lifetime in seconds, `0..=604800`; `0` never expires.
    pub fn max_age(mut self, seconds: u32) -> RestResult<Self> {
        if seconds > MAX_INVITE_AGE {
            return Err(RestError::PreconditionViolation(format!(
                "invite max age must be at most {MAX_INVITE_AGE} seconds, got {seconds}"
            )));
        }
        self.body.max_age = Some(seconds);
        Ok(self)
    }

    /// Use limit, `0..=100`; `0` is unlimited.
    pub fn max_uses(mut self, uses: u32) -> RestResult<Self> {
        if uses > MAX_INVITE_USES {
            return Err(RestError::PreconditionViolation(format!(
                "invite max uses must be at most {MAX_INVITE_USES}, got {uses}"
            )));
        }
        self.body.max_uses = Some(uses);
        Ok(self)
    }

    /// Members joining through a temporary invite are removed when they
    /// disconnect without a role.
    #[must_use]
    pub fn temporary(mut self, temporary: bool) -> Self {
        self.body.temporary = Some(temporary);
        self
    }

    /// Skip reusing a similar existing invite.
    #[must_use]
    pub fn unique(mut self, unique: bool) -> Self {
        self.body.unique = Some(unique);
        self
    }

    #[must_use]
    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn into_action(self) -> RestResult<RestAction<Invite>> {
        let body = serde_json::to_value(&self.body)
            .map_err(|e| RestError::PreconditionViolation(format!("unencodable invite: {e}")))?;
        let route = routes::invites::CREATE_INVITE
            .compile(&[&self.channel_id.to_string()])?
            .with_body(body);
        let action = RestAction::new(self.client, route, |response| {
            let value = response
                .body
                .as_ref()
                .ok_or_else(|| RemoteFailure::new(Some(response.status), "invite response had no body"))?;
            Ok(Invite::from_json(value)?)
        });
        Ok(match self.reason {
            Some(reason) => action.reason(reason),
            None => action,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_nested_ids() {
        let invite = Invite::from_json(&json!({
            "code": "abc123",
            "channel": { "id": "42", "name": "general" },
            "inviter": { "id": "7", "username": "someone" },
            "max_age": 3600,
            "max_uses": 5,
            "uses": 2,
            "temporary": true
        }))
        .unwrap();
        assert_eq!(invite.channel_id, Some(ChannelId::new(42)));
        assert_eq!(invite.inviter_id, Some(UserId::new(7)));
        assert_eq!(invite.max_age, 3600);
        assert_eq!(invite.uses, 2);
        assert!(invite.temporary);
        assert_eq!(invite.url(), "https://discord.gg/abc123");
    }

    #[test]
    fn missing_optional_fields_default() {
        let invite = Invite::from_json(&json!({ "code": "x" })).unwrap();
        assert_eq!(invite.inviter_id, None);
        assert_eq!(invite.max_uses, 0);
        assert!(!invite.temporary);
    }

    #[test]
    fn list_requires_array() {
        let list = Invite::list_from(&RawResponse::ok(json!([{ "code": "a" }, { "code": "b" }]))).unwrap();
        assert_eq!(list.len(), 2);
        assert!(Invite::list_from(&RawResponse::ok(json!({ "code": "a" }))).is_err());
    }
}
