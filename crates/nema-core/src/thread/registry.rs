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

use std::sync::{Arc, Weak};
use std::time::Duration;

use crate::sync::{Mutex, WaitStatus};
use crate::thread::ThreadInner;
use crate::time::Deadline;

/// The master list of every thread launched through a runtime context.
///
/// Entries are weak: the registry never keeps a finished thread's control
/// block alive, and dead entries are pruned opportunistically as new
/// threads register. The registry's one serious job is orderly shutdown:
/// [`wait_all`](Self::wait_all) gives every outstanding thread a shared
/// deadline to finish before the process tears down resources under them.
#[derive(Debug, Default)]
pub struct ThreadRegistry {
    entries: Mutex<Vec<Weak<ThreadInner>>>,
}

impl ThreadRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn add(&self, inner: &Arc<ThreadInner>) {
        let mut entries = self.entries.lock();
        entries.retain(|weak| weak.strong_count() > 0);
        entries.push(Arc::downgrade(inner));
    }

    /// Drops entries whose threads have fully gone away.
    pub fn prune(&self) {
        self.entries
            .lock()
            .retain(|weak| weak.strong_count() > 0);
    }

    /// Number of registered threads that have not finished yet.
    pub fn live_count(&self) -> usize {
        self.entries
            .lock()
            .iter()
            .filter_map(Weak::upgrade)
            .filter(|inner| !inner.is_finished())
            .count()
    }

    /// Names of registered threads that have not finished yet, for
    /// shutdown diagnostics.
    pub fn live_names(&self) -> Vec<String> {
        self.entries
            .lock()
            .iter()
            .filter_map(Weak::upgrade)
            .filter(|inner| !inner.is_finished())
            .map(|inner| inner.name().to_string())
            .collect()
    }

    /// Waits for every registered thread to finish.
    ///
    /// The timeout is one shared budget, not per thread: a deadline is
    /// computed once and each thread's done event is waited against it.
    /// Returns true when all threads finished in time. `None` waits
    /// indefinitely.
    pub fn wait_all(&self, timeout: Option<Duration>) -> bool {
        let deadline = Deadline::after(timeout);
        let snapshot: Vec<Arc<ThreadInner>> = self
            .entries
            .lock()
            .iter()
            .filter_map(Weak::upgrade)
            .collect();

        let mut all_done = true;
        for inner in snapshot {
            // Past the deadline this degrades to a probe, so threads that
            // already finished are still accounted for accurately.
            if inner.done_event().wait_until(deadline) == WaitStatus::TimedOut {
                log::warn!("Thread \"{}\" still running at deadline", inner.name());
                all_done = false;
            }
        }
        all_done
    }
}
