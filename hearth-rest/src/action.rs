//! Deferred remote actions.
//!
//! A [`RestAction`] describes one remote call and how to turn its response
//! into a `T`. Nothing happens until a driver issues it:
//!
//! - [`queue`](RestAction::queue) / [`queue_with`](RestAction::queue_with):
//!   run on the pool, deliver to callbacks on a pool thread
//! - [`complete`](RestAction::complete): block the calling thread for the result
//! - [`submit`](RestAction::submit): get a future for the result
//! - [`submit_after`](RestAction::submit_after) /
//!   [`queue_after`](RestAction::queue_after): run after a delay, cancelable
//!   until dispatch
//!
//! Each driver call dispatches the remote call exactly once and yields
//! exactly one outcome. The action itself is not consumed and can be issued
//! again; concurrent issues from several threads are independent calls.

use crate::client::RestClient;
use crate::error::{RemoteFailure, RestError, RestResult};
use crate::pool::{ScheduledHandle, Scheduled};
use crate::requester::RawResponse;
use crate::route::CompiledRoute;
use crate::sink::FailureSink;
use std::any::Any;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, warn};

type Transform<T> = Arc<dyn Fn(RawResponse) -> RestResult<T> + Send + Sync>;
type Resolver<T> = Arc<dyn Fn() -> T + Send + Sync>;
type Check = Arc<dyn Fn() -> bool + Send + Sync>;

/// Callback receiving a successful result.
pub type SuccessCallback<T> = Box<dyn FnOnce(T) + Send>;
/// Callback receiving a failure.
pub type FailureCallback = Box<dyn FnOnce(RestError) + Send>;

enum Body<T> {
    Remote {
        route: CompiledRoute,
        transform: Transform<T>,
    },
    /// Result known up front; no remote call is made.
    Resolved(Resolver<T>),
}

impl<T> Clone for Body<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Remote { route, transform } => Self::Remote {
                route: route.clone(),
                transform: transform.clone(),
            },
            Self::Resolved(value) => Self::Resolved(value.clone()),
        }
    }
}

/// A deferred, reusable remote call producing `T`.
pub struct RestAction<T> {
    client: RestClient,
    body: Body<T>,
    check: Option<Check>,
}

impl<T> Clone for RestAction<T> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            body: self.body.clone(),
            check: self.check.clone(),
        }
    }
}

impl<T> std::fmt::Debug for RestAction<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("RestAction");
        match &self.body {
            Body::Remote { route, .. } => s.field("route", route),
            Body::Resolved(_) => s.field("route", &"<resolved>"),
        };
        s.field("has_check", &self.check.is_some()).finish()
    }
}

impl RestAction<()> {
    /// Action whose response body is ignored.
    pub fn discarding(client: RestClient, route: CompiledRoute) -> Self {
        Self::new(client, route, |_| Ok(()))
    }
}

impl<T: Send + 'static> RestAction<T> {
    /// Action that sends `route` and decodes the response with `transform`.
    pub fn new<F>(client: RestClient, route: CompiledRoute, transform: F) -> Self
    where
        F: Fn(RawResponse) -> RestResult<T> + Send + Sync + 'static,
    {
        Self {
            client,
            body: Body::Remote {
                route,
                transform: Arc::new(transform),
            },
            check: None,
        }
    }

    /// Action whose result is already known. Issuing it never touches the
    /// transport; `queue` delivers inline on the calling thread.
    pub fn resolved(client: RestClient, value: T) -> Self
    where
        T: Clone + Sync,
    {
        Self {
            client,
            body: Body::Resolved(Arc::new(move || value.clone())),
            check: None,
        }
    }

    /// Attaches an audit-log reason. Ignored by resolved actions.
    #[must_use]
    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        if let Body::Remote { route, .. } = &mut self.body {
            route.set_reason(reason);
        }
        self
    }

    /// Installs a predicate evaluated right before dispatch. When it returns
    /// `false` the invocation ends with [`RestError::Cancelled`] and no call
    /// is made. Ignored by resolved actions.
    #[must_use]
    pub fn set_check<F>(mut self, check: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        self.check = Some(Arc::new(check));
        self
    }

    /// Transforms the eventual result with `f`.
    #[must_use]
    pub fn map<U, F>(self, f: F) -> RestAction<U>
    where
        U: Send + 'static,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        let body = match self.body {
            Body::Remote { route, transform } => Body::Remote {
                route,
                transform: Arc::new(move |response| transform(response).map(&f)),
            },
            Body::Resolved(value) => Body::Resolved(Arc::new(move || f(value()))),
        };
        RestAction {
            client: self.client,
            body,
            check: self.check,
        }
    }

    pub fn client(&self) -> &RestClient {
        &self.client
    }

    /// The remote call this action sends, `None` for resolved actions.
    pub fn route(&self) -> Option<&CompiledRoute> {
        match &self.body {
            Body::Remote { route, .. } => Some(route),
            Body::Resolved(_) => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self.body, Body::Resolved(_))
    }

    /// One invocation: check, dispatch, transform.
    async fn execute(self) -> RestResult<T> {
        let (route, transform) = match self.body {
            Body::Resolved(value) => return Ok(value()),
            Body::Remote { route, transform } => (route, transform),
        };
        if let Some(check) = &self.check {
            if !check() {
                debug!("check refused {route}");
                return Err(RestError::Cancelled);
            }
        }

        debug!("dispatching {route}");
        let response = self
            .client
            .requester()
            .execute(&route)
            .await
            .map_err(|failure| {
                warn!(status = ?failure.status, "{route} failed: {}", failure.message);
                RestError::Remote(failure)
            })?;
        let status = response.status;
        // The call is already out; a panicking decoder is a remote failure.
        panic::catch_unwind(AssertUnwindSafe(|| transform(response))).unwrap_or_else(|payload| {
            let message = panic_message(payload.as_ref());
            warn!(status, "{route} response transform panicked: {message}");
            Err(RestError::Remote(RemoteFailure::new(
                Some(status),
                format!("response transform panicked: {message}"),
            )))
        })
    }

    // ── queue ────────────────────────────────────────────────────

    /// Issues the action, discarding success. Failures go to the client's
    /// failure sink.
    pub fn queue(&self) {
        self.queue_callbacks(None, None);
    }

    /// Issues the action and hands the result to `on_success`. Failures go to
    /// the client's failure sink.
    pub fn queue_success<S>(&self, on_success: S)
    where
        S: FnOnce(T) + Send + 'static,
    {
        self.queue_callbacks(Some(Box::new(on_success)), None);
    }

    /// Issues the action; exactly one of the callbacks runs, on a pool thread.
    pub fn queue_with<S, E>(&self, on_success: S, on_failure: E)
    where
        S: FnOnce(T) + Send + 'static,
        E: FnOnce(RestError) + Send + 'static,
    {
        self.queue_callbacks(Some(Box::new(on_success)), Some(Box::new(on_failure)));
    }

    /// Issues the action with optional callbacks.
    pub fn queue_callbacks(
        &self,
        on_success: Option<SuccessCallback<T>>,
        on_failure: Option<FailureCallback>,
    ) {
        if let Body::Resolved(value) = &self.body {
            deliver(Ok(value()), on_success, on_failure, self.client.failure_sink());
            return;
        }
        let action = self.clone();
        let sink = self.client.failure_sink().clone();
        self.client.pool().spawn(async move {
            let result = action.execute().await;
            deliver(result, on_success, on_failure, &sink);
        });
    }

    // ── complete ─────────────────────────────────────────────────

    /// Issues the action and blocks the calling thread until it finishes.
    ///
    /// Refuses to run inside an async runtime context (pool threads and
    /// callbacks included), since blocking there can starve the very worker
    /// the call needs; use [`submit`](Self::submit) and `.await` instead.
    /// Resolved actions never block and are allowed anywhere.
    /// If the waiting thread goes away, the dispatched call still completes.
    pub fn complete(&self) -> RestResult<T> {
        if let Body::Resolved(value) = &self.body {
            return Ok(value());
        }
        if Handle::try_current().is_ok() {
            return Err(RestError::PreconditionViolation(
                "complete() blocks and cannot be called from an async context; use submit().await"
                    .to_string(),
            ));
        }

        let (tx, rx) = oneshot::channel();
        let action = self.clone();
        self.client.pool().spawn(async move {
            // The receiver may be gone if the caller stopped waiting.
            let _ = tx.send(action.execute().await);
        });
        // The sender only disappears if the pool shuts down first.
        rx.blocking_recv().unwrap_or(Err(RestError::Cancelled))
    }

    // ── submit ───────────────────────────────────────────────────

    /// Issues the action and returns a future for its outcome. The call is
    /// dispatched whether or not the future is polled.
    pub fn submit(&self) -> ActionFuture<T> {
        if let Body::Resolved(value) = &self.body {
            return ActionFuture {
                state: FutureState::Ready(Some(Ok(value()))),
            };
        }
        let action = self.clone();
        ActionFuture {
            state: FutureState::Running(self.client.pool().spawn(action.execute())),
        }
    }

    // ── delayed ──────────────────────────────────────────────────

    /// Issues the action after `delay` and returns a cancelable future.
    pub fn submit_after(&self, delay: Duration) -> RestResult<ScheduledFuture<T>> {
        let scheduled = self.client.pool().schedule(delay, self.clone().execute())?;
        Ok(ScheduledFuture::new(scheduled))
    }

    /// Issues the action after `delay`. Failures go to the failure sink.
    pub fn queue_after(&self, delay: Duration) -> RestResult<ScheduledHandle> {
        self.queue_after_callbacks(delay, None, None)
    }

    /// Issues the action after `delay` and delivers to the callbacks.
    /// A cancelled action delivers nothing.
    pub fn queue_after_with<S, E>(
        &self,
        delay: Duration,
        on_success: S,
        on_failure: E,
    ) -> RestResult<ScheduledHandle>
    where
        S: FnOnce(T) + Send + 'static,
        E: FnOnce(RestError) + Send + 'static,
    {
        self.queue_after_callbacks(delay, Some(Box::new(on_success)), Some(Box::new(on_failure)))
    }

    pub fn queue_after_callbacks(
        &self,
        delay: Duration,
        on_success: Option<SuccessCallback<T>>,
        on_failure: Option<FailureCallback>,
    ) -> RestResult<ScheduledHandle> {
        let action = self.clone();
        let sink = self.client.failure_sink().clone();
        let scheduled = self.client.pool().schedule(delay, async move {
            let result = action.execute().await;
            deliver(result, on_success, on_failure, &sink);
        })?;
        let (handle, _join) = scheduled.into_parts();
        Ok(handle)
    }
}

fn deliver<T>(
    result: RestResult<T>,
    on_success: Option<SuccessCallback<T>>,
    on_failure: Option<FailureCallback>,
    sink: &Arc<dyn FailureSink>,
) {
    match result {
        Ok(value) => {
            if let Some(callback) = on_success {
                callback(value);
            }
        }
        Err(err) => match on_failure {
            Some(callback) => callback(err),
            None => sink.report(&err),
        },
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

fn join_outcome<T>(joined: Result<RestResult<T>, JoinError>) -> RestResult<T> {
    match joined {
        Ok(result) => result,
        Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
        Err(_) => Err(RestError::Cancelled),
    }
}

/// Future returned by [`RestAction::submit`].
pub struct ActionFuture<T> {
    state: FutureState<T>,
}

enum FutureState<T> {
    Ready(Option<RestResult<T>>),
    Running(JoinHandle<RestResult<T>>),
}

impl<T> Unpin for ActionFuture<T> {}

impl<T> Future for ActionFuture<T> {
    type Output = RestResult<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.get_mut().state {
            // A second poll after completion yields Cancelled rather than panicking.
            FutureState::Ready(slot) => Poll::Ready(slot.take().unwrap_or(Err(RestError::Cancelled))),
            FutureState::Running(join) => Pin::new(join).poll(cx).map(join_outcome),
        }
    }
}

/// Future returned by [`RestAction::submit_after`]. Resolves to
/// [`RestError::Cancelled`] if cancelled before dispatch.
pub struct ScheduledFuture<T> {
    handle: ScheduledHandle,
    join: JoinHandle<Option<RestResult<T>>>,
}

impl<T> ScheduledFuture<T> {
    fn new(scheduled: Scheduled<RestResult<T>>) -> Self {
        let (handle, join) = scheduled.into_parts();
        Self { handle, join }
    }

    /// Prevents dispatch. Returns `false` if the call already started.
    pub fn cancel(&self) -> bool {
        self.handle.cancel()
    }

    pub fn handle(&self) -> &ScheduledHandle {
        &self.handle
    }
}

impl<T> Future for ScheduledFuture<T> {
    type Output = RestResult<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.join).poll(cx).map(|joined| {
            join_outcome(joined.map(|outcome| outcome.unwrap_or(Err(RestError::Cancelled))))
        })
    }
}
