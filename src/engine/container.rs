use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

type Subscriber<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Handle returned by [`Container::subscribe`], used to unsubscribe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// A thread-safe container for a piece of shared state.
///
/// All writes go through one lock, so concurrent callers are serialised.
/// Subscribers are called after every `set`/`update`, in registration
/// order, once the write lock has been released. A write and its
/// notification form one step: the next writer waits until every
/// subscriber has seen the previous state, so subscribers observe states
/// in write order. Subscribers may read the container but must not write
/// to it.
pub struct Container<T> {
    state: Arc<RwLock<T>>,
    subscribers: Arc<RwLock<Vec<(SubscriptionId, Subscriber<T>)>>>,
    next_id: Arc<AtomicU64>,
    writer: Arc<Mutex<()>>,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

fn lock(mutex: &Mutex<()>) -> MutexGuard<'_, ()> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<T: Clone> Container<T> {
    /// Create a new container with the given initial state.
    pub fn new(initial: T) -> Self {
        Self {
            state: Arc::new(RwLock::new(initial)),
            subscribers: Arc::new(RwLock::new(Vec::new())),
            next_id: Arc::new(AtomicU64::new(0)),
            writer: Arc::new(Mutex::new(())),
        }
    }

    /// Get a clone of the current state.
    pub fn get(&self) -> T {
        read(&self.state).clone()
    }

    /// Read state without cloning it.
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&T) -> R,
    {
        let state = read(&self.state);
        f(&*state)
    }

    /// Replace the whole state.
    pub fn set(&self, new_state: T) {
        let _writer = lock(&self.writer);
        *write(&self.state) = new_state;
        self.notify();
    }

    /// Mutate the state in place.
    ///
    /// The closure runs under the write lock, so a read-modify-write inside
    /// it cannot interleave with another writer.
    pub fn update<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut T) -> R,
    {
        let _writer = lock(&self.writer);
        let result = {
            let mut state = write(&self.state);
            f(&mut *state)
        };
        self.notify();
        result
    }

    /// Fallible [`update`](Self::update). Subscribers are only notified
    /// when the closure succeeds; on error the closure must leave the state
    /// as it found it.
    pub fn try_update<F, R, E>(&self, f: F) -> Result<R, E>
    where
        F: FnOnce(&mut T) -> Result<R, E>,
    {
        let _writer = lock(&self.writer);
        let result = {
            let mut state = write(&self.state);
            f(&mut *state)
        };
        if result.is_ok() {
            self.notify();
        }
        result
    }

    /// Subscribe to state changes.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        write(&self.subscribers).push((id, Arc::new(callback)));
        id
    }

    /// Remove a subscriber. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = write(&self.subscribers);
        let before = subscribers.len();
        subscribers.retain(|(sid, _)| *sid != id);
        subscribers.len() != before
    }

    /// Number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        read(&self.subscribers).len()
    }

    /// Callers hold the writer lock.
    fn notify(&self) {
        // Snapshot both lists so callbacks may read the container or
        // (un)subscribe without deadlocking.
        let subscribers: Vec<Subscriber<T>> = read(&self.subscribers)
            .iter()
            .map(|(_, s)| Arc::clone(s))
            .collect();
        if subscribers.is_empty() {
            return;
        }
        let state = self.get();
        for subscriber in subscribers {
            subscriber(&state);
        }
    }
}

impl<T> Clone for Container<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            subscribers: Arc::clone(&self.subscribers),
            next_id: Arc::clone(&self.next_id),
            writer: Arc::clone(&self.writer),
        }
    }
}

impl<T: Clone + Default> Default for Container<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}
