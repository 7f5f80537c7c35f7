//! Deferred remote actions for hearth.
//!
//! A [`RestAction`] is a description of one remote call plus the transform
//! that turns the raw response into a typed value. Building one does
//! nothing; issuing it through one of its drivers hands the call to the
//! [`ExecutionPool`], which runs it on a worker and routes the outcome back.
//!
//! # Components
//!
//! - **Route**: static route templates and compiled call descriptors
//! - **Requester**: the transport seam (reqwest-backed by default)
//! - **Pool**: tokio-backed execution with cancelable delayed scheduling
//! - **Action**: the four execution drivers (queue, complete, submit, delayed)
//!
//! # Example
//!
//! ```no_run
//! use hearth_rest::mock::MockRequester;
//! use hearth_rest::{routes, ExecutionPool, PoolConfig, RestAction, RestClient};
//! use std::sync::Arc;
//!
//! let pool = ExecutionPool::new(&PoolConfig::default()).unwrap();
//! let client = RestClient::new(pool, Arc::new(MockRequester::new()));
//! let route = routes::channels::DELETE_CHANNEL.compile(&["42"]).unwrap();
//!
//! let action = RestAction::discarding(client, route).reason("cleanup");
//! action.complete().unwrap();
//! ```

mod action;
mod client;
mod error;
mod pool;
mod requester;
mod route;
mod sink;

pub use action::{ActionFuture, FailureCallback, RestAction, ScheduledFuture, SuccessCallback};
pub use client::{ClientError, RestClient};
pub use error::{RemoteFailure, RestError, RestResult};
pub use pool::{ExecutionPool, PoolConfig, Scheduled, ScheduledHandle};
pub use requester::{mock, HttpRequester, RawResponse, Requester, RestConfig};
pub use route::{CompiledRoute, Method, Route};
pub use sink::{FailureSink, LogFailureSink};

/// Route templates known to hearth.
pub mod routes {
    pub use crate::route::{channels, invites};
}
