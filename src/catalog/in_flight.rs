//! Per-key async locks, so at most one parse per external id runs at a time.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::OwnedMutexGuard;

#[derive(Default)]
pub struct InFlightLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

pub struct InFlightGuard<'a> {
    owner: &'a InFlightLocks,
    key: String,
    _guard: OwnedMutexGuard<()>,
}

impl InFlightLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until no other holder of `key` remains.
    pub async fn acquire(&self, key: &str) -> InFlightGuard<'_> {
        let lock = {
            let mut locks = self.locks.lock().unwrap();
            locks
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                .clone()
        };

        InFlightGuard {
            owner: self,
            key: key.to_string(),
            _guard: lock.lock_owned().await,
        }
    }

    pub fn len(&self) -> usize {
        self.locks.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let mut locks = self.owner.locks.lock().unwrap();
        // One reference in the map, one in our guard. Anything beyond that
        // is a waiter that still needs the entry.
        if let Some(lock) = locks.get(&self.key) {
            if Arc::strong_count(lock) <= 2 {
                locks.remove(&self.key);
            }
        }
    }
}
