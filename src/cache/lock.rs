//! Lock guards that survive poisoning.
//!
//! Every collection slot is written storage-first, so after a panic in
//! another thread the worst a guard can expose is a stale view that the
//! next write, invalidation, or admin reload replaces. Serving stale
//! reads beats refusing every request for the rest of the process.

use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use metrics::counter;
use tracing::warn;

pub(crate) fn rw_read<'a, T>(
    lock: &'a RwLock<T>,
    source: &'static str,
    op: &'static str,
) -> RwLockReadGuard<'a, T> {
    lock.read().unwrap_or_else(|poisoned| {
        note_poison(source, op, "rwlock.read");
        poisoned.into_inner()
    })
}

pub(crate) fn rw_write<'a, T>(
    lock: &'a RwLock<T>,
    source: &'static str,
    op: &'static str,
) -> RwLockWriteGuard<'a, T> {
    lock.write().unwrap_or_else(|poisoned| {
        note_poison(source, op, "rwlock.write");
        poisoned.into_inner()
    })
}

pub(crate) fn mutex_lock<'a, T>(
    lock: &'a Mutex<T>,
    source: &'static str,
    op: &'static str,
) -> MutexGuard<'a, T> {
    lock.lock().unwrap_or_else(|poisoned| {
        note_poison(source, op, "mutex");
        poisoned.into_inner()
    })
}

fn note_poison(source: &'static str, op: &'static str, kind: &'static str) {
    counter!("songstudio_cache_lock_poison_total", "source" => source).increment(1);
    warn!(
        source,
        op, kind, "cache lock poisoned by a panicked thread; continuing with its state"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poisoned_rwlock_still_serves_its_state() {
        let lock = std::sync::Arc::new(RwLock::new(7u32));

        let poisoner = std::sync::Arc::clone(&lock);
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.write().unwrap();
            panic!("poison");
        })
        .join();
        assert!(lock.is_poisoned());

        assert_eq!(*rw_read(&lock, "test", "read"), 7);
        *rw_write(&lock, "test", "write") = 8;
        assert_eq!(*rw_read(&lock, "test", "read"), 8);
    }

    #[test]
    fn poisoned_mutex_still_serves_its_state() {
        let lock = std::sync::Arc::new(Mutex::new(vec![1]));

        let poisoner = std::sync::Arc::clone(&lock);
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.lock().unwrap();
            panic!("poison");
        })
        .join();

        mutex_lock(&lock, "test", "push").push(2);
        assert_eq!(*mutex_lock(&lock, "test", "read"), vec![1, 2]);
    }
}
