//! Per-session ordering.
//!
//! Persist-then-broadcast for one session runs under that session's async
//! mutex, so the order clients see matches the stored history. Different
//! sessions never wait on each other. A session's entry lives only while some
//! task holds or waits for it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

type LockMap = HashMap<Uuid, Arc<AsyncMutex<()>>>;

#[derive(Default)]
pub struct SessionLocks {
    locks: Mutex<LockMap>,
}

/// Exclusive use of one session. Dropping it may evict the session's entry.
pub struct SessionGuard<'a> {
    locks: &'a SessionLocks,
    session_id: Uuid,
    guard: Option<OwnedMutexGuard<()>>,
}

impl SessionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive use of `session_id`.
    pub async fn lock(&self, session_id: Uuid) -> SessionGuard<'_> {
        let lock = {
            let mut locks = self.map();
            Arc::clone(locks.entry(session_id).or_default())
        };
        SessionGuard {
            locks: self,
            session_id,
            guard: Some(lock.lock_owned().await),
        }
    }

    pub fn len(&self) -> usize {
        self.map().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn map(&self) -> MutexGuard<'_, LockMap> {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Drop the entry if only the map still references it.
    fn evict_idle(&self, session_id: Uuid) {
        let mut locks = self.map();
        if locks
            .get(&session_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&session_id);
        }
    }
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        // Release the mutex first so its Arc no longer counts as a holder.
        drop(self.guard.take());
        self.locks.evict_idle(self.session_id);
    }
}
