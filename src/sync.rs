// Copyright (c) 2025 Vocalis Contributors
// SPDX-License-Identifier: MIT

//! Lock helpers that recover from poisoning instead of panicking.
//!
//! Progress updates arrive from worker threads that run blocking download
//! code. If one of those threads panics while holding a lock, the lock is
//! poisoned; a progress tracker that panics in response would take the whole
//! server down with it. Stale progress data is preferable to that, so these
//! helpers log the event and hand back the guard anyway.

use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Acquire a read lock, recovering from poisoning if necessary.
#[inline]
pub fn resilient_read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    match lock.read() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::error!(
                target: "vocalis::sync",
                "RwLock poisoned during read acquisition; recovering. \
                 A thread panicked while holding this lock."
            );
            poisoned.into_inner()
        }
    }
}

/// Acquire a write lock, recovering from poisoning if necessary.
#[inline]
pub fn resilient_write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    match lock.write() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::error!(
                target: "vocalis::sync",
                "RwLock poisoned during write acquisition; recovering. \
                 A thread panicked while holding this lock."
            );
            poisoned.into_inner()
        }
    }
}

/// Acquire a mutex, recovering from poisoning if necessary.
#[inline]
pub fn resilient_lock<T>(lock: &Mutex<T>) -> MutexGuard<'_, T> {
    match lock.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::error!(
                target: "vocalis::sync",
                "Mutex poisoned during acquisition; recovering. \
                 A thread panicked while holding this lock."
            );
            poisoned.into_inner()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_resilient_read_normal() {
        let lock = RwLock::new(42);
        let guard = resilient_read(&lock);
        assert_eq!(*guard, 42);
    }

    #[test]
    fn test_resilient_write_normal() {
        let lock = RwLock::new(42);
        {
            let mut guard = resilient_write(&lock);
            *guard = 100;
        }
        let guard = resilient_read(&lock);
        assert_eq!(*guard, 100);
    }

    #[test]
    fn test_resilient_lock_poisoned() {
        let lock = Arc::new(Mutex::new(42));
        let lock_clone = Arc::clone(&lock);

        // Poison the lock by panicking while holding it
        let handle = thread::spawn(move || {
            let _guard = lock_clone.lock().unwrap();
            panic!("intentional panic to poison lock");
        });
        let _ = handle.join();

        // Should recover instead of panicking
        let guard = resilient_lock(&lock);
        assert_eq!(*guard, 42);
    }

    #[test]
    fn test_resilient_write_poisoned() {
        let lock = Arc::new(RwLock::new(42));
        let lock_clone = Arc::clone(&lock);

        let handle = thread::spawn(move || {
            let _guard = lock_clone.write().unwrap();
            panic!("intentional panic to poison lock");
        });
        let _ = handle.join();

        let mut guard = resilient_write(&lock);
        *guard = 100;
        drop(guard);

        let guard = resilient_read(&lock);
        assert_eq!(*guard, 100);
    }
}
