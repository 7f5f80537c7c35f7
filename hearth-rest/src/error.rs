//! Error types for deferred actions.

use hearth_types::Permission;
use thiserror::Error;

/// Result type for action construction and execution.
pub type RestResult<T> = Result<T, RestError>;

/// Errors produced while building or running a [`RestAction`](crate::RestAction).
///
/// `PreconditionViolation`, `AlreadyExists` and `PermissionDenied` are
/// returned synchronously by the factories that build actions. `Remote` and
/// `Cancelled` only reach the caller through an execution driver.
#[derive(Debug, Clone, Error)]
pub enum RestError {
    /// An argument or local state check failed before any call was issued.
    #[error("precondition violated: {0}")]
    PreconditionViolation(String),

    /// The entry being created is already present locally.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// The acting member lacks a permission.
    #[error("missing permission {permission}{}", message_suffix(.message))]
    PermissionDenied {
        permission: Permission,
        message: Option<String>,
    },

    /// The remote call itself failed.
    #[error(transparent)]
    Remote(#[from] RemoteFailure),

    /// A scheduled action was cancelled, or a pre-dispatch check refused it.
    #[error("action cancelled before dispatch")]
    Cancelled,
}

impl RestError {
    /// Permission failure without extra context.
    pub fn permission(permission: Permission) -> Self {
        Self::PermissionDenied {
            permission,
            message: None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// The missing permission, for `PermissionDenied`.
    pub fn missing_permission(&self) -> Option<Permission> {
        match self {
            Self::PermissionDenied { permission, .. } => Some(*permission),
            _ => None,
        }
    }
}

fn message_suffix(message: &Option<String>) -> String {
    message
        .as_deref()
        .map(|m| format!(": {m}"))
        .unwrap_or_default()
}

/// Failure reported by the transport, or by decoding its response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("remote call failed: {message}")]
pub struct RemoteFailure {
    /// HTTP-like status, when the remote answered at all.
    pub status: Option<u16>,
    pub message: String,
}

impl RemoteFailure {
    pub fn new(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// Failure with no response (connection error, timeout).
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(None, message)
    }
}

impl From<serde_json::Error> for RemoteFailure {
    fn from(err: serde_json::Error) -> Self {
        Self::new(None, format!("failed to decode response: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_denied_display_with_and_without_message() {
        let bare = RestError::permission(Permission::ManageChannel);
        assert_eq!(bare.to_string(), "missing permission MANAGE_CHANNEL");

        let with_msg = RestError::PermissionDenied {
            permission: Permission::ManagePermissions,
            message: Some("cannot edit overrides".into()),
        };
        assert_eq!(
            with_msg.to_string(),
            "missing permission MANAGE_PERMISSIONS: cannot edit overrides"
        );
        assert_eq!(with_msg.missing_permission(), Some(Permission::ManagePermissions));
    }

    #[test]
    fn remote_failure_is_transparent() {
        let err = RestError::from(RemoteFailure::new(Some(500), "boom"));
        assert_eq!(err.to_string(), "remote call failed: boom");
        assert!(!err.is_cancelled());
    }

    #[test]
    fn decode_error_converts_to_remote_failure() {
        let json_err = serde_json::from_str::<u32>("nope").unwrap_err();
        let failure = RemoteFailure::from(json_err);
        assert_eq!(failure.status, None);
        assert!(failure.message.starts_with("failed to decode response"));
    }
}
