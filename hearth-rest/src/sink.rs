//! Destination for failures nobody asked to hear about.

use crate::error::RestError;
use tracing::error;

/// Receives failures of queued actions that were issued without a failure
/// callback. Implementations must not block.
pub trait FailureSink: Send + Sync {
    fn report(&self, error: &RestError);
}

/// Default sink: logs at `ERROR` level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogFailureSink;

impl FailureSink for LogFailureSink {
    fn report(&self, err: &RestError) {
        error!(error = %err, "queued action failed and no failure callback was given");
    }
}
