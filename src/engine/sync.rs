use std::collections::HashSet;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::{Mutex, MutexGuard};

use crate::error::{Result, RouterError};

/// One exclusive critical section per engine instance.
///
/// Every mutating call enters with a key naming the account/target pair it acts
/// on. Callers with different keys queue on the mutex; a second entry with a key
/// that is already in flight is rejected rather than queued, so the same
/// position can never be double-counted by a re-entrant call.
pub struct Serialized<T> {
    inner: Mutex<T>,
    in_flight: Arc<StdMutex<HashSet<String>>>,
}

impl<T> Serialized<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(value),
            in_flight: Arc::new(StdMutex::new(HashSet::new())),
        }
    }

    /// Claim `key`, then wait for the section.
    pub async fn enter(&self, key: impl Into<String>) -> Result<Section<'_, T>> {
        let claim = KeyClaim::acquire(self.in_flight.clone(), key.into())?;
        let guard = self.inner.lock().await;
        Ok(Section {
            guard,
            _claim: claim,
        })
    }

    /// Read-only access; waits for any in-flight mutation to finish.
    pub async fn read(&self) -> MutexGuard<'_, T> {
        self.inner.lock().await
    }

    pub fn into_inner(self) -> T {
        self.inner.into_inner()
    }
}

/// Held for the duration of one operation.
pub struct Section<'a, T> {
    guard: MutexGuard<'a, T>,
    _claim: KeyClaim,
}

impl<T> Deref for Section<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T> DerefMut for Section<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

/// Releases its key on drop, including when the waiting future is cancelled.
struct KeyClaim {
    set: Arc<StdMutex<HashSet<String>>>,
    key: String,
}

impl KeyClaim {
    fn acquire(set: Arc<StdMutex<HashSet<String>>>, key: String) -> Result<Self> {
        {
            let mut keys = set.lock().unwrap_or_else(|e| e.into_inner());
            if !keys.insert(key.clone()) {
                return Err(RouterError::Reentrant { key });
            }
        }
        Ok(Self { set, key })
    }
}

impl Drop for KeyClaim {
    fn drop(&mut self) {
        let mut keys = self.set.lock().unwrap_or_else(|e| e.into_inner());
        keys.remove(&self.key);
    }
}
