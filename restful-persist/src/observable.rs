//! Reactive cells.

use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;

/// A shared value whose changes notify subscribers.
///
/// Clones share the same cell. Every `set`/`update` wakes every
/// [`watch::Receiver`] obtained from [`Observable::subscribe`].
///
/// Do not call `set` or `update` from inside a `with` closure: the read
/// borrow is held for the closure's duration.
pub struct Observable<T> {
    sender: Arc<watch::Sender<T>>,
}

impl<T> Observable<T> {
    pub fn new(value: T) -> Self {
        let (sender, _) = watch::channel(value);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Returns a clone of the current value.
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.sender.borrow().clone()
    }

    /// Reads the current value without cloning it.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.sender.borrow())
    }

    /// Replaces the value, returning the previous one.
    pub fn set(&self, value: T) -> T {
        self.sender.send_replace(value)
    }

    /// Mutates the value in place.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        self.sender.send_modify(f);
    }

    /// Mutates the value in place, notifying only when `f` returns true.
    pub fn update_if(&self, f: impl FnOnce(&mut T) -> bool) -> bool {
        self.sender.send_if_modified(f)
    }

    /// Subscribes to later changes.
    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.sender.subscribe()
    }
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            sender: Arc::clone(&self.sender),
        }
    }
}

impl<T: Default> Default for Observable<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: fmt::Debug> fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Observable")
            .field(&*self.sender.borrow())
            .finish()
    }
}
