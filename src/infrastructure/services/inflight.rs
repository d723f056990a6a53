//! Per-key in-flight request coalescing

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;

use futures::future::{BoxFuture, FutureExt, Shared};

use crate::domain::DomainError;

type SharedResult<T> = Shared<BoxFuture<'static, Result<T, DomainError>>>;

/// Whether a caller ran the computation or attached to someone else's
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Leader,
    Follower,
}

/// Registry of pending computations keyed by request identity.
///
/// The first caller for a key installs the computation, spawned on the
/// runtime so it finishes even if that caller goes away. Later callers with
/// the same key await the same result. The entry is removed once it resolves.
pub struct InFlight<T> {
    pending: Mutex<HashMap<String, SharedResult<T>>>,
}

impl<T> std::fmt::Debug for InFlight<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InFlight")
            .field("pending", &self.len())
            .finish()
    }
}

impl<T> Default for InFlight<T> {
    fn default() -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
        }
    }
}

impl<T> InFlight<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys with a computation still running
    pub fn len(&self) -> usize {
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> InFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Run `compute` for `key` unless a computation for it is already pending
    pub async fn run<F, Fut>(&self, key: String, compute: F) -> (Result<T, DomainError>, Role)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, DomainError>> + Send + 'static,
    {
        let (shared, role) = {
            let mut pending = self
                .pending
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());

            match pending.get(&key) {
                Some(existing) => (existing.clone(), Role::Follower),
                None => {
                    let handle = tokio::spawn(compute());
                    let shared = async move {
                        handle.await.unwrap_or_else(|e| {
                            Err(DomainError::internal(format!("Request task failed: {}", e)))
                        })
                    }
                    .boxed()
                    .shared();

                    pending.insert(key.clone(), shared.clone());
                    (shared, Role::Leader)
                }
            }
        };

        let result = shared.clone().await;

        let mut pending = self
            .pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if pending
            .get(&key)
            .is_some_and(|current| current.ptr_eq(&shared))
        {
            pending.remove(&key);
        }

        (result, role)
    }
}
