//! Per-challenge write serialization
//!
//! A read-modify-write against one stats file is only safe if no other writer
//! touches the same file in between. Within one process, writers for the same
//! challenge id queue on a shared mutex; writers for different ids never block
//! each other. An id's entry lives only while someone holds or waits on it.
//! Nothing here coordinates across processes.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use super::ChallengeId;

#[derive(Debug, Default)]
pub struct ChallengeLocks {
    locks: Mutex<HashMap<ChallengeId, Arc<Mutex<()>>>>,
}

impl ChallengeLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` while holding the lock for `challenge`
    pub fn with_lock<T>(&self, challenge: &ChallengeId, f: impl FnOnce() -> T) -> T {
        let lock = self.lock_for(challenge);
        let result = {
            // The guarded value is (), so a poisoned lock carries no broken state
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            f()
        };
        self.release(challenge, lock);
        result
    }

    /// Number of challenge ids currently held or waited on
    pub fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn lock_for(&self, challenge: &ChallengeId) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(challenge.clone()).or_default().clone()
    }

    /// Drop our handle and forget the id if nobody else holds one
    fn release(&self, challenge: &ChallengeId, lock: Arc<Mutex<()>>) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        drop(lock);
        // Handles are only cloned under the map lock, so this count is stable
        if locks
            .get(challenge)
            .is_some_and(|held| Arc::strong_count(held) == 1)
        {
            locks.remove(challenge);
        }
    }
}
