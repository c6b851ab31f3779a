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

//! Deadline arithmetic and the shared network-activity clock.

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// An absolute point in time a wait must not outlive.
///
/// All timeout-taking operations convert their relative timeout into a
/// `Deadline` exactly once, at entry. Retries, spurious wakeups, and
/// composed waits then measure against the same fixed instant, so a wait
/// can time out late by scheduling jitter but never drift past its budget
/// by repeated re-arming.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Option<Instant>,
}

impl Deadline {
    /// Builds a deadline `timeout` from now; `None` means wait forever.
    pub fn after(timeout: Option<Duration>) -> Self {
        let at = timeout.and_then(|t| Instant::now().checked_add(t));
        Self { at }
    }

    /// A deadline that never expires.
    pub fn forever() -> Self {
        Self { at: None }
    }

    /// Time left until the deadline.
    ///
    /// Returns `None` for an unbounded deadline and `Some(Duration::ZERO)`
    /// once the deadline has passed.
    pub fn remaining(&self) -> Option<Duration> {
        self.at
            .map(|at| at.saturating_duration_since(Instant::now()))
    }

    /// True once the deadline has passed. An unbounded deadline never expires.
    pub fn expired(&self) -> bool {
        matches!(self.remaining(), Some(rem) if rem.is_zero())
    }
}

/// Records the most recent moment inbound network traffic was seen.
///
/// The socket layer calls [`touch`](Self::touch) on every receive that
/// delivers bytes and on every accepted connection; the watchdog reads
/// [`idle_for`](Self::idle_for) to decide whether the process has been
/// abandoned by its clients. The clock starts at construction time, so a
/// process that never receives anything still reports a meaningful idle
/// span.
#[derive(Debug)]
pub struct ActivityClock {
    last: Mutex<Instant>,
}

impl ActivityClock {
    /// Creates a clock whose last-activity mark is "now".
    pub fn new() -> Self {
        Self {
            last: Mutex::new(Instant::now()),
        }
    }

    /// Marks inbound activity at the current instant.
    pub fn touch(&self) {
        *self.last.lock().unwrap_or_else(PoisonError::into_inner) = Instant::now();
    }

    /// How long it has been since the last recorded activity.
    pub fn idle_for(&self) -> Duration {
        let last = *self.last.lock().unwrap_or_else(PoisonError::into_inner);
        last.elapsed()
    }
}

impl Default for ActivityClock {
    fn default() -> Self {
        Self::new()
    }
}
