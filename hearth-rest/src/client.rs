//! The shared context every action runs against.

use crate::pool::{ExecutionPool, PoolConfig};
use crate::requester::{HttpRequester, Requester, RestConfig};
use crate::sink::{FailureSink, LogFailureSink};
use std::sync::Arc;
use thiserror::Error;

/// Errors building a [`RestClient`] from configuration.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("failed to start execution pool: {0}")]
    Runtime(#[from] std::io::Error),

    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

/// Pool, transport and failure sink bundled together. Cheap to clone.
#[derive(Clone)]
pub struct RestClient {
    pool: ExecutionPool,
    requester: Arc<dyn Requester>,
    failure_sink: Arc<dyn FailureSink>,
}

impl RestClient {
    pub fn new(pool: ExecutionPool, requester: Arc<dyn Requester>) -> Self {
        Self {
            pool,
            requester,
            failure_sink: Arc::new(LogFailureSink),
        }
    }

    /// Owned pool plus an HTTP requester.
    pub fn connect(rest: RestConfig, pool: &PoolConfig) -> Result<Self, ClientError> {
        let requester = HttpRequester::new(rest)?;
        let pool = ExecutionPool::new(pool)?;
        Ok(Self::new(pool, Arc::new(requester)))
    }

    #[must_use]
    pub fn with_failure_sink(mut self, sink: Arc<dyn FailureSink>) -> Self {
        self.failure_sink = sink;
        self
    }

    pub fn pool(&self) -> &ExecutionPool {
        &self.pool
    }

    pub fn requester(&self) -> &Arc<dyn Requester> {
        &self.requester
    }

    pub fn failure_sink(&self) -> &Arc<dyn FailureSink> {
        &self.failure_sink
    }
}

impl std::fmt::Debug for RestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestClient")
            .field("spawned_tasks", &self.pool.spawned_tasks())
            .finish_non_exhaustive()
    }
}
