//! Route templates and the compiled call descriptors built from them.
//!
//! A [`Route`] is a static `(method, path template)` pair. Compiling it with
//! concrete ids yields a [`CompiledRoute`], the opaque descriptor a
//! [`Requester`](crate::Requester) knows how to send.

use crate::error::{RestError, RestResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// HTTP-like verb of a remote call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A route template such as `channels/{channel_id}/invites`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Route {
    method: Method,
    template: &'static str,
    params: usize,
}

impl Route {
    pub const fn new(method: Method, template: &'static str) -> Self {
        let bytes = template.as_bytes();
        let mut params = 0;
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] == b'{' {
                params += 1;
            }
            i += 1;
        }
        Self {
            method,
            template,
            params,
        }
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn template(&self) -> &'static str {
        self.template
    }

    /// Number of `{...}` placeholders in the template.
    pub fn param_count(&self) -> usize {
        self.params
    }

    /// Substitutes `params` into the placeholders, left to right.
    pub fn compile(&self, params: &[&str]) -> RestResult<CompiledRoute> {
        if params.len() != self.params {
            return Err(RestError::PreconditionViolation(format!(
                "route {} expects {} parameters, got {}",
                self.template,
                self.params,
                params.len()
            )));
        }

        let mut path = String::with_capacity(self.template.len() + params.len() * 20);
        let mut values = params.iter();
        let mut rest = self.template;
        while let Some(open) = rest.find('{') {
            path.push_str(&rest[..open]);
            let close = rest[open..]
                .find('}')
                .map(|c| open + c)
                .ok_or_else(|| {
                    RestError::PreconditionViolation(format!(
                        "unterminated placeholder in route {}",
                        self.template
                    ))
                })?;
            if let Some(value) = values.next() {
                path.push_str(value);
            }
            rest = &rest[close + 1..];
        }
        path.push_str(rest);

        Ok(CompiledRoute {
            route: *self,
            path,
            body: None,
            reason: None,
        })
    }
}

/// A fully substituted remote call: verb, path, optional JSON body and an
/// optional audit-log reason.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledRoute {
    route: Route,
    path: String,
    body: Option<serde_json::Value>,
    reason: Option<String>,
}

impl CompiledRoute {
    pub fn route(&self) -> Route {
        self.route
    }

    pub fn method(&self) -> Method {
        self.route.method
    }

    /// Path relative to the API base, without a leading slash.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn body(&self) -> Option<&serde_json::Value> {
        self.body.as_ref()
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    #[must_use]
    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.set_reason(reason);
        self
    }

    pub fn set_reason(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        self.reason = if reason.trim().is_empty() {
            None
        } else {
            Some(reason)
        };
    }
}

impl fmt::Display for CompiledRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} /{}", self.route.method, self.path)
    }
}

/// Channel routes.
pub mod channels {
    use super::{Method, Route};

    pub const DELETE_CHANNEL: Route = Route::new(Method::Delete, "channels/{channel_id}");
    pub const MODIFY_CHANNEL: Route = Route::new(Method::Patch, "channels/{channel_id}");
    pub const CREATE_PERM_OVERRIDE: Route =
        Route::new(Method::Put, "channels/{channel_id}/permissions/{target_id}");
    pub const DELETE_PERM_OVERRIDE: Route =
        Route::new(Method::Delete, "channels/{channel_id}/permissions/{target_id}");
}

/// Invite routes.
pub mod invites {
    use super::{Method, Route};

    pub const CREATE_INVITE: Route = Route::new(Method::Post, "channels/{channel_id}/invites");
    pub const GET_CHANNEL_INVITES: Route =
        Route::new(Method::Get, "channels/{channel_id}/invites");
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn counts_placeholders() {
        assert_eq!(channels::DELETE_CHANNEL.param_count(), 1);
        assert_eq!(channels::CREATE_PERM_OVERRIDE.param_count(), 2);
    }

    #[test]
    fn compiles_in_order() {
        let compiled = channels::CREATE_PERM_OVERRIDE.compile(&["42", "7"]).unwrap();
        assert_eq!(compiled.path(), "channels/42/permissions/7");
        assert_eq!(compiled.method(), Method::Put);
        assert_eq!(compiled.to_string(), "PUT /channels/42/permissions/7");
    }

    #[test]
    fn wrong_arity_is_a_precondition_violation() {
        let err = invites::CREATE_INVITE.compile(&[]).unwrap_err();
        assert!(matches!(err, RestError::PreconditionViolation(_)));
    }

    #[test]
    fn blank_reason_is_dropped() {
        let compiled = channels::DELETE_CHANNEL
            .compile(&["1"])
            .unwrap()
            .with_reason("   ");
        assert_eq!(compiled.reason(), None);
        let compiled = compiled.with_reason("cleanup");
        assert_eq!(compiled.reason(), Some("cleanup"));
    }
}
