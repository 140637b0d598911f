//! # Request Coalescing
//!
//! [`BatchLoader`] turns many concurrent single-key lookups into few bulk
//! calls.
//!
//! ## Overview
//!
//! The first `load` that finds no open batch opens one and schedules its
//! dispatch after `window`. Every `load` arriving before dispatch joins that
//! batch. A batch holding `max_batch_size` distinct keys dispatches at once.
//!
//! At dispatch the distinct keys go to [`BatchFn::load`] in one call. Each
//! waiter then looks its own key up in the returned map, so wire order never
//! matters; a key missing from the map resolves to `None`. When the bulk call
//! fails, every waiter of that batch receives a clone of the same error.
//!
//! ## Usage
//!
//! ```ignore
//! let loader = BatchLoader::new(fetcher, Duration::from_millis(10), 50);
//! let values = loader.load_many(&[1, 2, 3]).await?;
//! ```

use crate::error::{ProviderError, Result};
use async_trait::async_trait;
use futures::future::try_join_all;
use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, trace};

/// Bulk lookup behind a [`BatchLoader`]
#[async_trait]
pub trait BatchFn<K, V>: Send + Sync {
    /// Load `keys` (distinct) in one call. Keys may be absent from the result.
    async fn load(&self, keys: &[K]) -> Result<HashMap<K, V>>;
}

type Waiter<V> = oneshot::Sender<Result<Option<V>>>;

struct PendingBatch<K, V> {
    id: u64,
    keys: Vec<K>,
    seen: HashSet<K>,
    waiters: Vec<(K, Waiter<V>)>,
}

struct BatchState<K, V> {
    next_id: u64,
    pending: Option<PendingBatch<K, V>>,
}

struct Inner<K, V> {
    batch_fn: Arc<dyn BatchFn<K, V>>,
    window: Duration,
    max_batch_size: usize,
    state: Mutex<BatchState<K, V>>,
}

pub struct BatchLoader<K, V> {
    inner: Arc<Inner<K, V>>,
}

impl<K, V> Clone for BatchLoader<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V> BatchLoader<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + std::fmt::Debug + 'static,
    V: Clone + Send + 'static,
{
    pub fn new(batch_fn: Arc<dyn BatchFn<K, V>>, window: Duration, max_batch_size: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                batch_fn,
                window,
                max_batch_size: max_batch_size.max(1),
                state: Mutex::new(BatchState {
                    next_id: 0,
                    pending: None,
                }),
            }),
        }
    }

    /// Resolve one key through the current batch
    pub async fn load(&self, key: K) -> Result<Option<V>> {
        let (tx, rx) = oneshot::channel();

        let full_batch = {
            let mut state = self.inner.lock_state();

            if state.pending.is_none() {
                let id = state.next_id;
                state.next_id += 1;
                state.pending = Some(PendingBatch {
                    id,
                    keys: Vec::new(),
                    seen: HashSet::new(),
                    waiters: Vec::new(),
                });
                self.schedule(id);
            }

            let full = match state.pending.as_mut() {
                Some(batch) => {
                    if batch.seen.insert(key.clone()) {
                        batch.keys.push(key.clone());
                    }
                    batch.waiters.push((key, tx));
                    batch.keys.len() >= self.inner.max_batch_size
                }
                None => false,
            };

            if full {
                state.pending.take()
            } else {
                None
            }
        };

        if let Some(batch) = full_batch {
            trace!(batch_id = batch.id, "Batch full, dispatching early");
            let inner = Arc::clone(&self.inner);
            tokio::spawn(async move { inner.dispatch(batch).await });
        }

        rx.await
            .map_err(|_| ProviderError::Internal("Batch dropped before resolving".to_string()))?
    }

    /// Resolve several keys; the result is position-aligned with `keys`
    pub async fn load_many(&self, keys: &[K]) -> Result<Vec<Option<V>>> {
        try_join_all(keys.iter().cloned().map(|key| self.load(key))).await
    }

    fn schedule(&self, batch_id: u64) {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            tokio::time::sleep(inner.window).await;

            let batch = {
                let mut state = inner.lock_state();
                let still_pending = state.pending.as_ref().map(|pending| pending.id) == Some(batch_id);
                if still_pending {
                    state.pending.take()
                } else {
                    None
                }
            };

            if let Some(batch) = batch {
                inner.dispatch(batch).await;
            }
        });
    }
}

impl<K, V> Inner<K, V>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
    V: Clone,
{
    fn lock_state(&self) -> MutexGuard<'_, BatchState<K, V>> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn dispatch(&self, batch: PendingBatch<K, V>) {
        debug!(
            batch_id = batch.id,
            keys = batch.keys.len(),
            waiters = batch.waiters.len(),
            "Dispatching batch"
        );

        match self.batch_fn.load(&batch.keys).await {
            Ok(values) => {
                for (key, waiter) in batch.waiters {
                    waiter.send(Ok(values.get(&key).cloned())).ok();
                }
            }
            Err(error) => {
                debug!(batch_id = batch.id, error = %error, "Batch failed");
                for (_, waiter) in batch.waiters {
                    waiter.send(Err(error.clone())).ok();
                }
            }
        }
    }
}
