//! Lazily created manager facades.
//!
//! [`LazyManager`] holds at most one manager per entity. The first caller
//! builds it under a holder-scoped mutex; everyone after that reads the
//! published `Arc` without locking.

use hearth_rest::{routes, RestAction, RestClient, RestError, RestResult};
use hearth_types::ChannelId;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use tracing::debug;

/// Observable lifecycle of a [`LazyManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerState {
    Absent,
    Creating,
    Present,
}

/// Create-once holder with a lock-free fast path.
///
/// A failed construction leaves the holder `Absent`; the next call retries.
#[derive(Debug)]
pub struct LazyManager<M> {
    slot: OnceLock<Arc<M>>,
    init: Mutex<()>,
    creating: AtomicBool,
}

impl<M> Default for LazyManager<M> {
    fn default() -> Self {
        Self::new()
    }
}

/// Clears the `creating` flag however construction ends.
struct CreatingGuard<'a>(&'a AtomicBool);

impl Drop for CreatingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<M> LazyManager<M> {
    pub fn new() -> Self {
        Self {
            slot: OnceLock::new(),
            init: Mutex::new(()),
            creating: AtomicBool::new(false),
        }
    }

    /// The manager, if one has been published.
    pub fn get(&self) -> Option<Arc<M>> {
        self.slot.get().cloned()
    }

    pub fn state(&self) -> ManagerState {
        if self.slot.get().is_some() {
            ManagerState::Present
        } else if self.creating.load(Ordering::Acquire) {
            ManagerState::Creating
        } else {
            ManagerState::Absent
        }
    }

    /// Returns the published manager, building it with `create` if none
    /// exists yet. `create` runs at most once per successful publication.
    pub fn get_or_try_init<F>(&self, create: F) -> RestResult<Arc<M>>
    where
        F: FnOnce() -> RestResult<M>,
    {
        if let Some(manager) = self.slot.get() {
            return Ok(manager.clone());
        }

        let _lock = self.lock();
        if let Some(manager) = self.slot.get() {
            return Ok(manager.clone());
        }

        self.creating.store(true, Ordering::Release);
        let _creating = CreatingGuard(&self.creating);
        let manager = Arc::new(create()?);
        // Only this thread can publish while the lock is held.
        let _ = self.slot.set(manager.clone());
        Ok(manager)
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.init.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Field changes waiting to be sent. `None` means unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
struct ChannelUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    position: Option<i32>,
    /// `Some(None)` detaches the channel from its category.
    #[serde(rename = "parent_id", skip_serializing_if = "Option::is_none")]
    parent: Option<Option<ChannelId>>,
}

impl ChannelUpdate {
    fn is_empty(&self) -> bool {
        self.name.is_none() && self.position.is_none() && self.parent.is_none()
    }
}

const NAME_MAX_CHARS: usize = 100;

/// Collects changes to one channel and sends them as a single PATCH.
///
/// Obtained through [`GuildChannel::manager`](crate::GuildChannel::manager),
/// which checks `MANAGE_CHANNEL` once when the manager is first built.
#[derive(Debug)]
pub struct ChannelManager {
    channel_id: ChannelId,
    client: RestClient,
    pending: Arc<Mutex<ChannelUpdate>>,
}

impl ChannelManager {
    pub(crate) fn new(channel_id: ChannelId, client: RestClient) -> Self {
        debug!(channel = %channel_id, "channel manager created");
        Self {
            channel_id,
            client,
            pending: Arc::default(),
        }
    }

    pub fn channel_id(&self) -> ChannelId {
        self.channel_id
    }

    /// Stages a new name; must be 1 to 100 characters after trimming.
    pub fn set_name(&self, name: impl Into<String>) -> RestResult<&Self> {
        let name = name.into();
        let trimmed = name.trim();
        let chars = trimmed.chars().count();
        if chars == 0 || chars > NAME_MAX_CHARS {
            return Err(RestError::PreconditionViolation(format!(
                "channel name must be 1 to {NAME_MAX_CHARS} characters, got {chars}"
            )));
        }
        self.pending().name = Some(trimmed.to_string());
        Ok(self)
    }

    pub fn set_position(&self, position: i32) -> &Self {
        self.pending().position = Some(position);
        self
    }

    /// Stages a new category; `None` detaches the channel.
    pub fn set_parent(&self, parent: Option<ChannelId>) -> &Self {
        self.pending().parent = Some(parent);
        self
    }

    /// Drops every staged change.
    pub fn reset(&self) -> &Self {
        *self.pending() = ChannelUpdate::default();
        self
    }

    pub fn is_dirty(&self) -> bool {
        !self.pending().is_empty()
    }

    /// Action sending the staged changes. Without changes the action is
    /// already resolved and makes no call. After a successful PATCH the
    /// staged changes are cleared unless they were modified meanwhile.
    pub fn update(&self) -> RestResult<RestAction<()>> {
        let snapshot = self.pending().clone();
        if snapshot.is_empty() {
            return Ok(RestAction::resolved(self.client.clone(), ()));
        }

        let body = serde_json::to_value(&snapshot)
            .map_err(|e| RestError::PreconditionViolation(format!("unencodable update: {e}")))?;
        let route = routes::channels::MODIFY_CHANNEL
            .compile(&[&self.channel_id.to_string()])?
            .with_body(body);
        let pending = self.pending.clone();
        Ok(RestAction::new(self.client.clone(), route, move |_| {
            let mut current = pending.lock().unwrap_or_else(PoisonError::into_inner);
            if *current == snapshot {
                *current = ChannelUpdate::default();
            }
            Ok(())
        }))
    }

    fn pending(&self) -> MutexGuard<'_, ChannelUpdate> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearth_rest::mock::MockRequester;
    use hearth_rest::ExecutionPool;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn failed_init_stays_absent_and_retries() {
        let holder: LazyManager<u32> = LazyManager::new();
        let err = holder
            .get_or_try_init(|| Err(RestError::PreconditionViolation("no".into())))
            .unwrap_err();
        assert!(matches!(err, RestError::PreconditionViolation(_)));
        assert_eq!(holder.state(), ManagerState::Absent);

        let value = holder.get_or_try_init(|| Ok(5)).unwrap();
        assert_eq!(*value, 5);
        assert_eq!(holder.state(), ManagerState::Present);
    }

    #[test]
    fn init_runs_once_across_threads() {
        let holder = Arc::new(LazyManager::<usize>::new());
        let built = Arc::new(AtomicUsize::new(0));
        let threads: Vec<_> = (0..16)
            .map(|_| {
                let holder = holder.clone();
                let built = built.clone();
                std::thread::spawn(move || {
                    holder
                        .get_or_try_init(|| {
                            std::thread::sleep(std::time::Duration::from_millis(5));
                            Ok(built.fetch_add(1, Ordering::SeqCst))
                        })
                        .unwrap()
                })
            })
            .collect();
        let managers: Vec<_> = threads.into_iter().map(|t| t.join().unwrap()).collect();
        assert_eq!(built.load(Ordering::SeqCst), 1);
        assert!(managers.iter().all(|m| Arc::ptr_eq(m, &managers[0])));
    }

    #[tokio::test]
    async fn staged_fields_serialize_sparsely() {
        let client = RestClient::new(ExecutionPool::current(), Arc::new(MockRequester::new()));
        let manager = ChannelManager::new(ChannelId::new(42), client);

        manager.set_name(" general ").unwrap().set_parent(None);
        let action = manager.update().unwrap();
        let route = action.route().unwrap();
        assert_eq!(route.path(), "channels/42");
        assert_eq!(route.body(), Some(&json!({ "name": "general", "parent_id": null })));
    }

    #[tokio::test]
    async fn clean_manager_yields_resolved_update() {
        let client = RestClient::new(ExecutionPool::current(), Arc::new(MockRequester::new()));
        let manager = ChannelManager::new(ChannelId::new(42), client);
        assert!(!manager.is_dirty());
        assert!(manager.update().unwrap().is_resolved());

        manager.set_position(3);
        assert!(manager.is_dirty());
        manager.reset();
        assert!(!manager.is_dirty());
    }

    #[tokio::test]
    async fn name_length_is_validated() {
        let client = RestClient::new(ExecutionPool::current(), Arc::new(MockRequester::new()));
        let manager = ChannelManager::new(ChannelId::new(42), client);
        assert!(manager.set_name("   ").is_err());
        assert!(manager.set_name("x".repeat(101)).is_err());
        assert!(manager.set_name("x".repeat(100)).is_ok());
    }
}
