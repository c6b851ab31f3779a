// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::{PoisonError, TryLockError};

/// A mutual-exclusion lock that survives panicking holders.
///
/// This is the standard library mutex with lock poisoning recovered
/// transparently: a thread that panics while holding the lock leaves the
/// protected data in whatever state it reached, but it never wedges every
/// later locker behind a poison error. Runtime threads must keep serving
/// after a worker dies, so that trade is made once, here, instead of at
/// every call site.
///
/// Unlocking is the guard going out of scope; there is no explicit unlock
/// call to forget or double-issue.
pub struct Mutex<T> {
    inner: std::sync::Mutex<T>,
}

/// Scoped access to the data behind a [`Mutex`]. Dropping the guard
/// releases the lock.
pub struct MutexGuard<'a, T> {
    inner: std::sync::MutexGuard<'a, T>,
}

impl<T> Mutex<T> {
    /// Creates a mutex protecting `value`.
    pub fn new(value: T) -> Self {
        Self {
            inner: std::sync::Mutex::new(value),
        }
    }

    /// Acquires the lock, blocking until it is available.
    pub fn lock(&self) -> MutexGuard<'_, T> {
        MutexGuard {
            inner: self.inner.lock().unwrap_or_else(PoisonError::into_inner),
        }
    }

    /// Acquires the lock only if it is free right now.
    ///
    /// Returns `None` when another thread holds the lock; never blocks.
    pub fn try_lock(&self) -> Option<MutexGuard<'_, T>> {
        match self.inner.try_lock() {
            Ok(guard) => Some(MutexGuard { inner: guard }),
            Err(TryLockError::Poisoned(poisoned)) => Some(MutexGuard {
                inner: poisoned.into_inner(),
            }),
            Err(TryLockError::WouldBlock) => None,
        }
    }

    /// Consumes the mutex and returns the protected value.
    pub fn into_inner(self) -> T {
        self.inner
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Default> Default for Mutex<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: fmt::Debug> fmt::Debug for Mutex<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.try_lock() {
            Some(guard) => f.debug_struct("Mutex").field("data", &*guard).finish(),
            None => f.debug_struct("Mutex").field("data", &"<locked>").finish(),
        }
    }
}

impl<T> Deref for MutexGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner
    }
}

impl<T> DerefMut for MutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn lock_serializes_cross_thread_updates() {
        let shared = Arc::new(Mutex::new(0u32));
        let mut handles = Vec::new();

        for _ in 0..4 {
            let shared = Arc::clone(&shared);
            handles.push(thread::spawn(move || {
                for _ in 0..250 {
                    *shared.lock() += 1;
                }
            }));
        }
        for handle in handles {
            handle.join().expect("worker should not panic");
        }
        assert_eq!(*shared.lock(), 1000);
    }

    #[test]
    fn try_lock_fails_while_held_elsewhere() {
        let shared = Arc::new(Mutex::new(()));
        let held = Arc::clone(&shared);

        let holder = thread::spawn(move || {
            let _guard = held.lock();
            thread::sleep(Duration::from_millis(200));
        });

        thread::sleep(Duration::from_millis(50));
        assert!(shared.try_lock().is_none(), "lock is held by the other thread");

        holder.join().expect("holder should not panic");
        assert!(shared.try_lock().is_some(), "lock is free again after the guard drops");
    }

    #[test]
    fn panicking_holder_does_not_wedge_the_lock() {
        let shared = Arc::new(Mutex::new(41));
        let poisoner = Arc::clone(&shared);

        let result = thread::spawn(move || {
            let mut guard = poisoner.lock();
            *guard += 1;
            panic!("die while holding the lock");
        })
        .join();
        assert!(result.is_err());

        // The data survived the panic and the lock still works.
        assert_eq!(*shared.lock(), 42);
    }

    #[test]
    fn into_inner_returns_the_value() {
        let mutex = Mutex::new(String::from("payload"));
        assert_eq!(mutex.into_inner(), "payload");
    }
}
