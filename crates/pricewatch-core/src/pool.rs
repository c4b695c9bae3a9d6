//! Fixed-size pool of exclusively-owned resources.
//!
//! Used for both extraction workers (one rendering context each) and storage
//! connections. A [`Slot`] is a scoped acquisition: dropping it returns the
//! resource, so every exit path of the holder (early return, error, panic)
//! gives the slot back.
//!
//! ```text
//! acquire() --[permit available]--> Slot (exclusive) --drop/release--> idle
//!     |                                   |
//!     +--[none free]--> wait ...          +--discard()--> pool shrinks
//!                                         close_all() --> waiters fail
//! ```
//!
//! Idle resources are handed out oldest first, so a returned resource goes to
//! the back of the queue.

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::AppError;

/// The two kinds of pooled resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Worker,
    StorageConnection,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Worker => "worker",
            ResourceKind::StorageConnection => "storage connection",
        }
    }

    /// Upper bound on the configured size of a pool of this kind.
    pub fn max_capacity(&self) -> usize {
        match self {
            ResourceKind::Worker => 32,
            ResourceKind::StorageConnection => 10,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

struct PoolShared<T> {
    kind: ResourceKind,
    size: usize,
    /// Slots not yet discarded.
    live: AtomicUsize,
    /// Idle resources. Invariant: `idle.len()` equals the number of available
    /// permits while the pool is open.
    idle: Mutex<VecDeque<T>>,
    permits: Arc<Semaphore>,
}

impl<T> PoolShared<T> {
    fn lock_idle(&self) -> MutexGuard<'_, VecDeque<T>> {
        self.idle.lock().unwrap_or_else(|poisoned| {
            tracing::warn!(kind = %self.kind, "Recovered from poisoned pool mutex");
            poisoned.into_inner()
        })
    }
}

/// Thread-safe pool handing out exclusive [`Slot`]s.
///
/// Cloning the pool clones a handle; all clones share the same resources.
pub struct ResourcePool<T> {
    shared: Arc<PoolShared<T>>,
}

impl<T> Clone for ResourcePool<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Send + 'static> ResourcePool<T> {
    /// Wrap already-constructed resources.
    pub fn from_items(kind: ResourceKind, items: Vec<T>) -> Result<Self, AppError> {
        if items.is_empty() {
            return Err(AppError::PoolExhausted(kind.to_string()));
        }

        let size = items.len();
        Ok(Self {
            shared: Arc::new(PoolShared {
                kind,
                size,
                live: AtomicUsize::new(size),
                idle: Mutex::new(items.into()),
                permits: Arc::new(Semaphore::new(size)),
            }),
        })
    }

    /// Construct up to `capacity` resources with `factory(index)`.
    ///
    /// A resource that fails to build is logged and left out, so the pool may
    /// end up smaller than requested. Only a pool with no slots at all is an
    /// error.
    pub async fn build<F, Fut>(
        kind: ResourceKind,
        capacity: usize,
        mut factory: F,
    ) -> Result<Self, AppError>
    where
        F: FnMut(usize) -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        if capacity == 0 || capacity > kind.max_capacity() {
            return Err(AppError::ConfigError(format!(
                "{kind} pool capacity must be between 1 and {}, got {capacity}",
                kind.max_capacity()
            )));
        }

        let mut items = Vec::with_capacity(capacity);
        for index in 0..capacity {
            match factory(index).await {
                Ok(item) => items.push(item),
                Err(e) => {
                    tracing::warn!(%kind, index, error = %e, "Failed to construct pool slot");
                }
            }
        }

        if !items.is_empty() && items.len() < capacity {
            tracing::warn!(
                %kind,
                requested = capacity,
                built = items.len(),
                "Pool running with reduced capacity"
            );
        }

        let pool = Self::from_items(kind, items)?;
        tracing::info!(%kind, size = pool.size(), "Pool ready");
        Ok(pool)
    }

    pub fn kind(&self) -> ResourceKind {
        self.shared.kind
    }

    /// Number of slots the pool was built with.
    pub fn size(&self) -> usize {
        self.shared.size
    }

    /// Slots still in service: the built size minus discarded slots.
    pub fn live(&self) -> usize {
        self.shared.live.load(Ordering::SeqCst)
    }

    /// Slots currently free to acquire.
    pub fn available(&self) -> usize {
        self.shared.permits.available_permits()
    }

    pub fn is_closed(&self) -> bool {
        self.shared.permits.is_closed()
    }

    /// Wait for a free slot.
    ///
    /// Fails with [`AppError::PoolClosed`] if the pool is closed before or
    /// while waiting.
    pub async fn acquire(&self) -> Result<Slot<T>, AppError> {
        let permit = Arc::clone(&self.shared.permits)
            .acquire_owned()
            .await
            .map_err(|_| AppError::PoolClosed(self.shared.kind.to_string()))?;

        // Empty only if close_all drained the idle list after we got a permit.
        let item = self
            .shared
            .lock_idle()
            .pop_front()
            .ok_or_else(|| AppError::PoolClosed(self.shared.kind.to_string()))?;

        Ok(Slot {
            item: Some(item),
            permit: Some(permit),
            shared: Arc::clone(&self.shared),
        })
    }

    /// Return a slot explicitly.
    ///
    /// Handing in a slot issued by a different pool is reported as
    /// [`AppError::ForeignSlot`]; that slot still goes back to its own pool.
    pub fn release(&self, slot: Slot<T>) -> Result<(), AppError> {
        if !Arc::ptr_eq(&slot.shared, &self.shared) {
            let owner = slot.shared.kind;
            drop(slot);
            tracing::warn!(kind = %self.shared.kind, %owner, "Rejected release of a foreign slot");
            return Err(AppError::ForeignSlot(self.shared.kind.to_string()));
        }
        drop(slot);
        Ok(())
    }

    /// Close the pool and take every idle resource out of it.
    ///
    /// Pending and future `acquire` calls fail. Slots still held at this point
    /// go back to the idle list when dropped and are picked up by a later call.
    pub fn close_all(&self) -> Vec<T> {
        self.shared.permits.close();
        let drained: Vec<T> = self.shared.lock_idle().drain(..).collect();
        tracing::debug!(kind = %self.shared.kind, drained = drained.len(), "Pool closed");
        drained
    }
}

/// Exclusive handle to one pooled resource.
pub struct Slot<T> {
    item: Option<T>,
    permit: Option<OwnedSemaphorePermit>,
    shared: Arc<PoolShared<T>>,
}

impl<T> Slot<T> {
    pub fn kind(&self) -> ResourceKind {
        self.shared.kind
    }

    /// Swap in a fresh resource, returning the one it replaces.
    ///
    /// The new resource goes back to the pool when the slot is dropped.
    pub fn replace(&mut self, item: T) -> Option<T> {
        self.item.replace(item)
    }

    /// Drop the resource instead of returning it, shrinking the pool by one.
    ///
    /// Discarding the last live slot closes the pool so waiters fail instead of
    /// hanging.
    pub fn discard(mut self) {
        self.item = None;
        if let Some(permit) = self.permit.take() {
            permit.forget();
        }
        let remaining = self.shared.live.fetch_sub(1, Ordering::SeqCst) - 1;
        tracing::warn!(kind = %self.shared.kind, remaining, "Discarded pool slot");
        if remaining == 0 {
            self.shared.permits.close();
        }
    }
}

impl<T> Deref for Slot<T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.item.as_ref().expect("slot item is present until drop")
    }
}

impl<T> DerefMut for Slot<T> {
    fn deref_mut(&mut self) -> &mut T {
        self.item.as_mut().expect("slot item is present until drop")
    }
}

impl<T> Drop for Slot<T> {
    fn drop(&mut self) {
        if let Some(item) = self.item.take() {
            self.shared.lock_idle().push_back(item);
        }
        // Push before releasing the permit so a woken waiter finds the item.
        drop(self.permit.take());
    }
}

impl<T> fmt::Debug for Slot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slot").field("kind", &self.shared.kind).finish()
    }
}
