//! Execution pool for deferred actions.
//!
//! The pool runs action futures on a multi-threaded tokio runtime, either
//! right away or after a delay. Delayed work returns a [`ScheduledHandle`]
//! that can stop it before it starts.

use crate::error::{RestError, RestResult};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Configuration for an owned [`ExecutionPool`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Worker threads of the owned runtime.
    pub worker_threads: usize,
    /// Name prefix for worker threads.
    pub thread_name: String,
    /// Longest delay accepted by the scheduling drivers, in seconds.
    pub max_delay_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            worker_threads: 4,
            thread_name: "hearth-pool".to_string(),
            max_delay_secs: 7 * 24 * 60 * 60,
        }
    }
}

/// Shared pool that executes action futures. Cheap to clone.
#[derive(Clone)]
pub struct ExecutionPool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    handle: Handle,
    /// Present when the pool built its own runtime.
    runtime: Option<Runtime>,
    max_delay: Duration,
    spawned: AtomicU64,
}

impl Drop for PoolInner {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            debug!("shutting down execution pool runtime");
            runtime.shutdown_background();
        }
    }
}

impl ExecutionPool {
    /// Builds a pool with its own multi-threaded runtime.
    pub fn new(config: &PoolConfig) -> std::io::Result<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(config.worker_threads.max(1))
            .thread_name(config.thread_name.clone())
            .enable_all()
            .build()?;
        debug!(
            workers = config.worker_threads,
            name = %config.thread_name,
            "execution pool started"
        );
        Ok(Self {
            inner: Arc::new(PoolInner {
                handle: runtime.handle().clone(),
                runtime: Some(runtime),
                max_delay: Duration::from_secs(config.max_delay_secs),
                spawned: AtomicU64::new(0),
            }),
        })
    }

    /// Runs on an existing runtime instead of owning one. Only
    /// `max_delay_secs` of `config` applies; the runtime is the caller's.
    pub fn with_handle(handle: Handle, config: &PoolConfig) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                handle,
                runtime: None,
                max_delay: Duration::from_secs(config.max_delay_secs),
                spawned: AtomicU64::new(0),
            }),
        }
    }

    /// Pool on the runtime of the calling async context.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn current() -> Self {
        Self::with_handle(Handle::current(), &PoolConfig::default())
    }

    pub fn handle(&self) -> &Handle {
        &self.inner.handle
    }

    pub fn max_delay(&self) -> Duration {
        self.inner.max_delay
    }

    /// Number of tasks handed to the pool so far, delayed ones included.
    pub fn spawned_tasks(&self) -> u64 {
        self.inner.spawned.load(Ordering::SeqCst)
    }

    /// Runs `task` as soon as a worker is free.
    pub fn spawn<F>(&self, task: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.inner.spawned.fetch_add(1, Ordering::SeqCst);
        self.inner.handle.spawn(task)
    }

    /// Runs `task` no earlier than `delay` from now unless cancelled first.
    ///
    /// `task` is not polled until the delay elapses, so nothing it describes
    /// happens if the returned handle is cancelled in time.
    pub fn schedule<F>(&self, delay: Duration, task: F) -> RestResult<Scheduled<F::Output>>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        if delay > self.inner.max_delay {
            return Err(RestError::PreconditionViolation(format!(
                "delay of {delay:?} exceeds the pool maximum of {:?}",
                self.inner.max_delay
            )));
        }

        let handle = ScheduledHandle::new();
        let timer = handle.clone();
        let join = self.spawn(async move {
            tokio::select! {
                () = timer.state.token.cancelled() => {}
                () = tokio::time::sleep(delay) => {}
            }
            if timer.try_start() {
                Some(task.await)
            } else {
                debug!("scheduled task cancelled before dispatch");
                None
            }
        });
        debug!(?delay, "task scheduled");
        Ok(Scheduled { handle, join })
    }
}

/// A delayed task: its cancel handle plus the join handle of the timer task.
/// The join handle yields `None` when the task was cancelled before it ran.
pub struct Scheduled<T> {
    handle: ScheduledHandle,
    join: JoinHandle<Option<T>>,
}

impl<T> Scheduled<T> {
    pub fn handle(&self) -> &ScheduledHandle {
        &self.handle
    }

    pub fn into_parts(self) -> (ScheduledHandle, JoinHandle<Option<T>>) {
        (self.handle, self.join)
    }
}

const PENDING: u8 = 0;
const STARTED: u8 = 1;
const CANCELLED: u8 = 2;

struct ScheduleState {
    phase: AtomicU8,
    token: CancellationToken,
}

/// Cancel handle for delayed work.
///
/// The handle moves from pending to exactly one of started or cancelled.
/// Whichever of [`cancel`](Self::cancel) and the timer gets there first wins.
#[derive(Clone)]
pub struct ScheduledHandle {
    state: Arc<ScheduleState>,
}

impl ScheduledHandle {
    fn new() -> Self {
        Self {
            state: Arc::new(ScheduleState {
                phase: AtomicU8::new(PENDING),
                token: CancellationToken::new(),
            }),
        }
    }

    fn try_start(&self) -> bool {
        self.state
            .phase
            .compare_exchange(PENDING, STARTED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Prevents the task from running.
    ///
    /// Returns `false` if the task already started (or was already
    /// cancelled); a started task runs to completion and delivers its result.
    pub fn cancel(&self) -> bool {
        let cancelled = self
            .state
            .phase
            .compare_exchange(PENDING, CANCELLED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if cancelled {
            self.state.token.cancel();
            debug!("scheduled task cancelled");
        }
        cancelled
    }

    pub fn is_pending(&self) -> bool {
        self.state.phase.load(Ordering::Acquire) == PENDING
    }

    pub fn is_started(&self) -> bool {
        self.state.phase.load(Ordering::Acquire) == STARTED
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.phase.load(Ordering::Acquire) == CANCELLED
    }
}

impl std::fmt::Debug for ScheduledHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let phase = match self.state.phase.load(Ordering::Acquire) {
            PENDING => "pending",
            STARTED => "started",
            _ => "cancelled",
        };
        f.debug_struct("ScheduledHandle").field("phase", &phase).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    #[tokio::test(start_paused = true)]
    async fn scheduled_task_runs_after_delay() {
        let pool = ExecutionPool::current();
        let scheduled = pool
            .schedule(Duration::from_secs(5), async { 7 })
            .unwrap();
        let (handle, join) = scheduled.into_parts();
        assert!(handle.is_pending());
        assert_eq!(join.await.unwrap(), Some(7));
        assert!(handle.is_started());
        assert!(!handle.cancel());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_before_delay_skips_task() {
        let pool = ExecutionPool::current();
        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();
        let scheduled = pool
            .schedule(Duration::from_secs(60), async move {
                flag.store(true, Ordering::SeqCst);
            })
            .unwrap();
        let (handle, join) = scheduled.into_parts();
        assert!(handle.cancel());
        assert!(!handle.cancel());
        assert_eq!(join.await.unwrap(), None);
        assert!(!ran.load(Ordering::SeqCst));
        assert!(handle.is_cancelled());
    }

    #[tokio::test]
    async fn rejects_delay_beyond_maximum() {
        let pool = ExecutionPool::current();
        let too_long = pool.max_delay() + Duration::from_secs(1);
        let err = pool.schedule(too_long, async {}).err().unwrap();
        assert!(matches!(err, RestError::PreconditionViolation(_)));
        assert_eq!(pool.spawned_tasks(), 0);
    }

    #[tokio::test]
    async fn borrowed_pool_honours_configured_delay_cap() {
        let pool = ExecutionPool::with_handle(
            Handle::current(),
            &PoolConfig {
                max_delay_secs: 10,
                ..Default::default()
            },
        );
        assert_eq!(pool.max_delay(), Duration::from_secs(10));
        assert!(pool.schedule(Duration::from_secs(10), async {}).is_ok());
        let err = pool.schedule(Duration::from_secs(11), async {}).err().unwrap();
        assert!(matches!(err, RestError::PreconditionViolation(_)));
        assert_eq!(pool.spawned_tasks(), 1);
    }

    #[test]
    fn owned_pool_runs_tasks() {
        let pool = ExecutionPool::new(&PoolConfig {
            worker_threads: 2,
            ..Default::default()
        })
        .unwrap();
        let join = pool.spawn(async { 40 + 2 });
        assert_eq!(pool.handle().block_on(join).unwrap(), 42);
        assert_eq!(pool.spawned_tasks(), 1);
    }
}
