use std::collections::HashSet;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

/// Per-key mutual exclusion.
///
/// Holders of the same key are serialized; different keys never wait on each
/// other beyond the brief critical section that updates the held set. Keys
/// are forgotten as soon as their guard drops, so the table only ever holds
/// the keys currently in use.
#[derive(Debug, Default)]
pub struct LockTable {
    held: Mutex<HashSet<String>>,
    released: Condvar,
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until `key` is free, then hold it until the guard drops.
    pub fn lock(&self, key: &str) -> KeyGuard<'_> {
        let mut held = self.held_set();
        while held.contains(key) {
            held = self
                .released
                .wait(held)
                .unwrap_or_else(PoisonError::into_inner);
        }
        held.insert(key.to_string());
        KeyGuard {
            table: self,
            key: key.to_string(),
        }
    }

    /// Hold `key` if it is free right now.
    pub fn try_lock(&self, key: &str) -> Option<KeyGuard<'_>> {
        let mut held = self.held_set();
        if !held.insert(key.to_string()) {
            return None;
        }
        Some(KeyGuard {
            table: self,
            key: key.to_string(),
        })
    }

    /// Number of keys currently held.
    pub fn held_count(&self) -> usize {
        self.held_set().len()
    }

    // The set is only mutated in single insert/remove steps, so a panic while
    // it was locked cannot leave it half-updated.
    fn held_set(&self) -> MutexGuard<'_, HashSet<String>> {
        self.held.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Exclusive hold on one key of a [`LockTable`].
#[must_use = "the key is released as soon as the guard is dropped"]
#[derive(Debug)]
pub struct KeyGuard<'a> {
    table: &'a LockTable,
    key: String,
}

impl KeyGuard<'_> {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for KeyGuard<'_> {
    fn drop(&mut self) {
        self.table.held_set().remove(&self.key);
        self.table.released.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn same_key_is_exclusive() {
        let table = LockTable::new();
        let guard = table.lock("a");
        assert!(table.try_lock("a").is_none());
        drop(guard);
        assert!(table.try_lock("a").is_some());
    }

    #[test]
    fn different_keys_do_not_block() {
        let table = LockTable::new();
        let _a = table.lock("a");
        let b = table.try_lock("b");
        assert!(b.is_some());
        assert_eq!(table.held_count(), 2);
    }

    #[test]
    fn released_keys_are_forgotten() {
        let table = LockTable::new();
        {
            let _a = table.lock("a");
            let _b = table.lock("b");
        }
        assert_eq!(table.held_count(), 0);
    }

    #[test]
    fn waiters_are_serialized() {
        let table = LockTable::new();
        let inside = AtomicUsize::new(0);
        let max_inside = AtomicUsize::new(0);
        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    for _ in 0..20 {
                        let _guard = table.lock("shared");
                        let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                        max_inside.fetch_max(now, Ordering::SeqCst);
                        std::thread::sleep(Duration::from_micros(50));
                        inside.fetch_sub(1, Ordering::SeqCst);
                    }
                });
            }
        });
        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
        assert_eq!(table.held_count(), 0);
    }
}
