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

//! Reference-counted threads observed through done events.
//!
//! A [`Thread`] is a shared handle on a native thread's control block. The
//! native thread holds one reference of its own for as long as it runs, so
//! the control block outlives every caller-side handle drop; completion is
//! published through a manual-reset done event rather than a join, which
//! lets thread completion participate in [`multi_wait`](crate::sync::multi_wait)
//! alongside sockets and plain events.
//!
//! There is no forced-termination call. Threads that must stop early watch a
//! quit event (usually the one on
//! [`RuntimeContext`](crate::context::RuntimeContext)) and exit on their own.

mod registry;

pub use self::registry::ThreadRegistry;

use std::sync::Arc;

use crate::context::RuntimeContext;
use crate::error::SpawnError;
use crate::sync::{Event, Waitable};

/// Shared control block for one native thread.
#[derive(Debug)]
pub(crate) struct ThreadInner {
    name: String,
    /// Manual reset: once the thread finishes, every past and future waiter
    /// sees it finished.
    done: Arc<Event>,
}

impl ThreadInner {
    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn done_event(&self) -> &Event {
        &self.done
    }

    /// Non-consuming: the done event is manual-reset.
    pub(crate) fn is_finished(&self) -> bool {
        self.done.test()
    }
}

/// Signals the done event when the thread body ends, on every exit path,
/// including an unwind out of the body.
///
/// Drop order matters: the thread-owned control-block reference is released
/// *before* done is signaled, so a waiter that drops its last handle the
/// moment it observes completion can never race with cleanup still running
/// on the exiting thread.
struct CompletionGuard {
    inner: Option<Arc<ThreadInner>>,
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.take() {
            let done = Arc::clone(&inner.done);
            if std::thread::panicking() {
                log::warn!("Thread \"{}\" terminated by panic", inner.name());
            } else {
                log::debug!("Thread \"{}\" finished", inner.name());
            }
            drop(inner);
            done.signal();
        }
    }
}

/// A handle on a reference-counted native thread.
///
/// Cloning the handle clones the reference; dropping the last handle after
/// the thread has exited frees the control block. Dropping every handle
/// while the thread still runs is fine: the thread keeps itself alive and
/// stays visible to the [`ThreadRegistry`] until it finishes.
#[derive(Debug, Clone)]
pub struct Thread {
    inner: Arc<ThreadInner>,
}

impl Thread {
    /// Starts a native thread running `body`.
    ///
    /// The thread is registered with the context's master registry and
    /// detached; observe completion through [`Waitable::wait`] on the handle
    /// or through [`ThreadRegistry::wait_all`]. On a spawn failure the done
    /// event is signaled before the error is returned, so a waiter holding
    /// the would-be handle can never block forever.
    pub fn launch<F>(ctx: &RuntimeContext, name: &str, body: F) -> Result<Thread, SpawnError>
    where
        F: FnOnce() + Send + 'static,
    {
        let inner = Arc::new(ThreadInner {
            name: name.to_string(),
            done: Arc::new(Event::manual_reset()),
        });
        ctx.threads().add(&inner);

        // The reference the native thread holds on its own behalf. If the
        // spawn fails the closure is dropped unrun and the reference goes
        // with it.
        let own_ref = Arc::clone(&inner);
        let spawn = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let _completion = CompletionGuard {
                    inner: Some(own_ref),
                };
                body();
            });

        match spawn {
            Ok(handle) => {
                log::debug!("Thread \"{name}\" launched");
                // Detached on purpose: completion is the done event.
                drop(handle);
                Ok(Thread { inner })
            }
            Err(e) => Err(Self::fail_launch(&inner, e)),
        }
    }

    /// Common tail of the failed-launch path: wake any waiter immediately,
    /// then report the OS error.
    fn fail_launch(inner: &Arc<ThreadInner>, e: std::io::Error) -> SpawnError {
        log::warn!("Thread \"{}\" failed to launch: {e}", inner.name());
        inner.done.signal();
        SpawnError::Os(e)
    }

    /// The name the thread was launched with.
    pub fn name(&self) -> &str {
        self.inner.name()
    }

    /// True once the thread body has finished (or the launch failed).
    pub fn is_finished(&self) -> bool {
        self.inner.is_finished()
    }
}

impl Waitable for Thread {
    fn event(&self) -> &Event {
        self.inner.done_event()
    }
}
