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

//! Runtime lifecycle for embedding hosts.
//!
//! [`Runtime::init`] assembles a fresh [`RuntimeContext`] and, when the
//! configuration asks for one, launches the CPU/idle watchdog against the
//! current process. [`Runtime::shutdown`] runs the orderly teardown:
//! broadcast the quit event, give observers a moment to wake, then wait a
//! bounded time for every registered thread to drain before reporting
//! whatever refused to die.

use std::time::Duration;

use anyhow::{Context, Result};

use nema_core::RuntimeContext;
use nema_watch::{ProcessCpuSource, Watchdog, WatchdogPolicy};

/// Tuning knobs for [`Runtime::init`] and [`Runtime::shutdown`].
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Watchdog trip policy. `None` (the default) runs without a watchdog;
    /// hosts that load untrusted programs should supply
    /// [`WatchdogPolicy::default`] or stricter.
    pub watchdog: Option<WatchdogPolicy>,
    /// Pause between broadcasting quit and starting to wait on threads, so
    /// blocked waiters get a chance to wake and begin their own teardown.
    pub shutdown_grace: Duration,
    /// Total budget for waiting on registered threads during shutdown.
    /// Threads still alive afterwards are logged and abandoned, never
    /// killed.
    pub shutdown_wait: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            watchdog: None,
            shutdown_grace: Duration::from_millis(10),
            shutdown_wait: Duration::from_millis(500),
        }
    }
}

/// Handle to an initialized runtime.
///
/// Owns the shared [`RuntimeContext`] and the optional watchdog. Dropping
/// the handle without calling [`Runtime::shutdown`] leaks nothing but skips
/// the orderly quit broadcast, so background threads keep running until the
/// process exits.
pub struct Runtime {
    ctx: RuntimeContext,
    watchdog: Option<Watchdog>,
    config: RuntimeConfig,
}

impl Runtime {
    /// Initializes the runtime services described by `config`.
    ///
    /// A watchdog whose thread fails to launch is logged and skipped rather
    /// than treated as fatal; failing to identify the current process for
    /// CPU sampling is an error, since a requested watchdog could never
    /// function.
    pub fn init(config: RuntimeConfig) -> Result<Self> {
        let ctx = RuntimeContext::new();
        log::info!("Runtime initialized");

        let watchdog = match config.watchdog {
            Some(policy) => {
                let source = ProcessCpuSource::new()
                    .context("identifying the current process for watchdog CPU sampling")?;
                match Watchdog::launch(&ctx, policy, source) {
                    Ok(watchdog) => Some(watchdog),
                    Err(e) => {
                        log::warn!("Watchdog thread failed to launch: {e}; continuing without it");
                        None
                    }
                }
            }
            None => None,
        };

        Ok(Self {
            ctx,
            watchdog,
            config,
        })
    }

    /// The shared context to hand to threads, sockets, and queues.
    pub fn ctx(&self) -> &RuntimeContext {
        &self.ctx
    }

    /// True while a configured watchdog thread is alive.
    pub fn watchdog_running(&self) -> bool {
        self.watchdog
            .as_ref()
            .is_some_and(|watchdog| !watchdog.is_finished())
    }

    /// Shuts the runtime down: broadcast quit, wait for registered threads,
    /// and report anything that did not finish in time.
    ///
    /// Threads are never killed. A thread that ignores the quit event simply
    /// outlives the runtime and is listed in the shutdown warning.
    pub fn shutdown(self) {
        log::info!("Runtime shutting down");
        self.ctx.request_shutdown();
        std::thread::sleep(self.config.shutdown_grace);

        if !self.ctx.threads().wait_all(Some(self.config.shutdown_wait)) {
            log::warn!(
                "{} thread(s) still running after {:?}: {:?}",
                self.ctx.threads().live_count(),
                self.config.shutdown_wait,
                self.ctx.threads().live_names()
            );
        }

        let open = self.ctx.open_sockets().get();
        if open > 0 {
            log::warn!("{open} socket(s) still open at shutdown");
        }
        log::info!("Runtime shutdown complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nema_core::Thread;
    use std::sync::Arc;
    use std::time::Instant;

    #[test]
    fn init_and_shutdown_without_watchdog() {
        let runtime = Runtime::init(RuntimeConfig::default()).unwrap();
        assert!(!runtime.watchdog_running());
        assert_eq!(runtime.ctx().threads().live_count(), 0);
        runtime.shutdown();
    }

    #[test]
    fn shutdown_releases_a_quit_watching_thread() {
        let runtime = Runtime::init(RuntimeConfig::default()).unwrap();
        let ctx = runtime.ctx().clone();

        let quit = Arc::clone(ctx.quit());
        let worker = Thread::launch(&ctx, "quit-watcher", move || {
            quit.wait(None);
        })
        .unwrap();

        let started = Instant::now();
        runtime.shutdown();

        assert!(worker.is_finished());
        assert_eq!(ctx.threads().live_count(), 0);
        // Well inside the grace + wait budget; the worker woke on quit
        // rather than riding out the full timeout.
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn watchdog_launches_and_drains_on_shutdown() {
        let policy = WatchdogPolicy {
            interval: Duration::from_millis(5),
            // Thresholds no real test run can trip.
            cpu_threshold: 1e9,
            idle_limit: Duration::from_secs(3600),
            ..WatchdogPolicy::default()
        };
        let runtime = Runtime::init(RuntimeConfig {
            watchdog: Some(policy),
            ..RuntimeConfig::default()
        })
        .unwrap();

        assert!(runtime.watchdog_running());
        assert_eq!(runtime.ctx().threads().live_count(), 1);

        let started = Instant::now();
        runtime.shutdown();
        // The watchdog observes quit within one 5ms interval.
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
