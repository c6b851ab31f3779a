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

use std::sync::atomic::{AtomicI64, Ordering};

/// A thread-safe integer counter.
///
/// `increment` and `decrement` are single atomic read-modify-write operations
/// and return the value *after* the update, so the caller always sees the
/// effect of exactly its own call. This is the property reference-counting
/// protocols rely on: the thread that observes a decrement to zero is the one
/// responsible for the final cleanup.
#[derive(Debug)]
pub struct AtomicCounter {
    value: AtomicI64,
}

impl AtomicCounter {
    /// Creates a counter holding `initial`.
    pub fn new(initial: i64) -> Self {
        Self {
            value: AtomicI64::new(initial),
        }
    }

    /// Returns the current value.
    ///
    /// The value can be stale by the time the caller inspects it; use the
    /// return values of [`increment`](Self::increment) and
    /// [`decrement`](Self::decrement) when the post-update value matters.
    pub fn get(&self) -> i64 {
        self.value.load(Ordering::SeqCst)
    }

    /// Atomically adds one and returns the updated value.
    pub fn increment(&self) -> i64 {
        self.value.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Atomically subtracts one and returns the updated value.
    pub fn decrement(&self) -> i64 {
        self.value.fetch_sub(1, Ordering::SeqCst) - 1
    }
}

impl Default for AtomicCounter {
    fn default() -> Self {
        Self::new(0)
    }
}
