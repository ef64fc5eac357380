use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tracing::debug;

use crate::errors::Error;
use crate::request::RequestKey;

type Outcome<T> = Result<T, Error>;

struct Entry<T> {
    id: u64,
    outcome: watch::Receiver<Option<Outcome<T>>>,
}

/// Requests currently on the wire, keyed by [`RequestKey`].
///
/// A second caller with the same key awaits the first caller's outcome instead
/// of dispatching again.
pub struct InFlightRegistry<T> {
    entries: Mutex<HashMap<RequestKey, Entry<T>>>,
    next_id: AtomicU64,
}

impl<T: Clone> InFlightRegistry<T> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub async fn get_or_create<F, Fut>(&self, key: RequestKey, factory: F) -> Outcome<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Outcome<T>>,
    {
        let claim = {
            let mut entries = self.lock();
            match entries.get(&key) {
                Some(entry) => Err(entry.outcome.clone()),
                None => {
                    let (tx, rx) = watch::channel(None);
                    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                    entries.insert(key.clone(), Entry { id, outcome: rx });
                    Ok((id, tx))
                }
            }
        };
        let (id, tx) = match claim {
            Ok(owned) => owned,
            Err(rx) => {
                debug!(key = %key, "request.duplicate");
                return Self::await_outcome(rx).await;
            }
        };

        let _registration = Registration {
            registry: self,
            key: &key,
            id,
        };
        let outcome = factory().await;
        tx.send_replace(Some(outcome.clone()));
        outcome
    }

    /// Forgets every entry. Requests already on the wire still settle for
    /// their own callers.
    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    async fn await_outcome(mut rx: watch::Receiver<Option<Outcome<T>>>) -> Outcome<T> {
        match rx.wait_for(Option::is_some).await {
            Ok(settled) => settled.clone().unwrap_or(Err(Error::Abandoned)),
            Err(_) => Err(Error::Abandoned),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<RequestKey, Entry<T>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Clone> Default for InFlightRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Removes the entry when the owning request settles or is dropped, unless a
/// newer request has taken the key since.
struct Registration<'a, T: Clone> {
    registry: &'a InFlightRegistry<T>,
    key: &'a RequestKey,
    id: u64,
}

impl<T: Clone> Drop for Registration<'_, T> {
    fn drop(&mut self) {
        let mut entries = self.registry.lock();
        if entries.get(self.key).is_some_and(|entry| entry.id == self.id) {
            entries.remove(self.key);
        }
    }
}
