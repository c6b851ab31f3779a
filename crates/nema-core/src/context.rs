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

//! Explicit runtime-wide state shared by threads, sockets, and the watchdog.

use std::sync::Arc;

use crate::sync::{AtomicCounter, Event};
use crate::thread::ThreadRegistry;
use crate::time::ActivityClock;

/// Process-wide runtime state, passed explicitly instead of living in
/// file-scope globals.
///
/// Cloning the context clones cheap shared handles, so every subsystem can
/// keep its own copy. Independent contexts are fully isolated from each
/// other, which is what lets tests run several runtimes side by side in one
/// process.
#[derive(Debug, Clone)]
pub struct RuntimeContext {
    threads: Arc<ThreadRegistry>,
    /// Manual reset: once shutdown is requested, every current and future
    /// observer sees it.
    quit: Arc<Event>,
    activity: Arc<ActivityClock>,
    open_sockets: Arc<AtomicCounter>,
}

impl RuntimeContext {
    /// Creates a fresh context with no threads, no sockets, and shutdown
    /// not requested.
    pub fn new() -> Self {
        Self {
            threads: Arc::new(ThreadRegistry::new()),
            quit: Arc::new(Event::manual_reset()),
            activity: Arc::new(ActivityClock::new()),
            open_sockets: Arc::new(AtomicCounter::new(0)),
        }
    }

    /// The master registry of threads launched through this context.
    pub fn threads(&self) -> &ThreadRegistry {
        &self.threads
    }

    /// The shared shutdown-request event.
    ///
    /// Long-running thread bodies should include this in their waits and
    /// exit promptly once it fires.
    pub fn quit(&self) -> &Arc<Event> {
        &self.quit
    }

    /// The last-inbound-network-activity clock.
    pub fn activity(&self) -> &Arc<ActivityClock> {
        &self.activity
    }

    /// Count of sockets currently open under this context.
    pub fn open_sockets(&self) -> &AtomicCounter {
        &self.open_sockets
    }

    /// Signals the shared quit event. Idempotent.
    pub fn request_shutdown(&self) {
        log::info!("Runtime shutdown requested");
        self.quit.signal();
    }

    /// True once shutdown has been requested.
    pub fn shutdown_requested(&self) -> bool {
        self.quit.test()
    }
}

impl Default for RuntimeContext {
    fn default() -> Self {
        Self::new()
    }
}
