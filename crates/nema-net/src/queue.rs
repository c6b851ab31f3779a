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

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use nema_core::sync::{multi_wait, Event, MultiWaitStatus, Mutex, Waitable};
use nema_core::time::Deadline;

use crate::error::NetError;

/// What a queue wait resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent<T> {
    /// A message arrived.
    Message(T),
    /// The timeout elapsed with nothing to report. Not an error.
    Timeout,
    /// The debug-break event fired; the host should enter its debugger
    /// and come back for the next event afterwards.
    DebugBreak,
}

/// A thread-safe message queue whose non-empty state is waitable.
///
/// This queue is generic over the message type `T`, which keeps the
/// networking layer decoupled from whatever request representation the
/// host builds on top of it.
///
/// [`wait`](Self::wait) is the host's single retrieval point: it blocks on
/// the queue, queue termination, and the optional debug-break event in one
/// multi-object wait, so a message, a shutdown, and a debugger stop all
/// interrupt the same call. Termination is the only outcome reported as an
/// error; everything else, including a timeout, is an ordinary
/// [`SessionEvent`].
pub struct MessageQueue<T> {
    messages: Mutex<VecDeque<T>>,
    /// Manual reset, signaled while the queue is non-empty. Updated only
    /// while `messages` is locked, so emptiness can never race a wakeup.
    available: Event,
    /// Manual reset, signaled once for the queue's lifetime.
    terminated: Event,
    debug_break: Option<Arc<Event>>,
}

impl<T> MessageQueue<T> {
    /// Creates an empty queue with no debug-break source.
    pub fn new() -> Self {
        Self {
            messages: Mutex::new(VecDeque::new()),
            available: Event::manual_reset(),
            terminated: Event::manual_reset(),
            debug_break: None,
        }
    }

    /// Creates an empty queue whose waits also watch `debug_break`.
    pub fn with_debug_break(debug_break: Arc<Event>) -> Self {
        Self {
            debug_break: Some(debug_break),
            ..Self::new()
        }
    }

    /// Appends a message and wakes waiters.
    ///
    /// Messages posted after [`shutdown`](Self::shutdown) are dropped:
    /// the queue's consumers are already being told to go away.
    pub fn post(&self, message: T) {
        let mut messages = self.messages.lock();
        if self.terminated.test() {
            log::debug!("Message posted to a terminated queue; dropping it");
            return;
        }
        messages.push_back(message);
        self.available.signal();
        log::trace!("Message posted ({} queued)", messages.len());
    }

    /// Removes the oldest message without blocking.
    pub fn try_pop(&self) -> Option<T> {
        let mut messages = self.messages.lock();
        let message = messages.pop_front();
        if messages.is_empty() {
            self.available.reset();
        }
        message
    }

    /// Number of queued messages.
    pub fn len(&self) -> usize {
        self.messages.lock().len()
    }

    /// True when nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.messages.lock().is_empty()
    }

    /// Discards every queued message.
    pub fn flush(&self) {
        let mut messages = self.messages.lock();
        let dropped = messages.len();
        messages.clear();
        self.available.reset();
        if dropped > 0 {
            log::debug!("Flushed {dropped} queued messages");
        }
    }

    /// Marks the queue terminated, waking every waiter with
    /// [`NetError::QueueTerminated`]. Idempotent; queued messages are left
    /// in place for [`flush`](Self::flush) or draining.
    pub fn shutdown(&self) {
        log::info!("Message queue shutting down");
        self.terminated.signal();
    }

    /// True once [`shutdown`](Self::shutdown) has been called.
    pub fn is_shut_down(&self) -> bool {
        self.terminated.test()
    }

    /// Blocks until a message, a timeout, a debug break, or queue
    /// termination.
    ///
    /// The timeout is one absolute deadline across internal retries, so a
    /// message stolen by a concurrent consumer between wakeup and pop
    /// never extends the total wait. `None` waits indefinitely.
    pub fn wait(&self, timeout: Option<Duration>) -> Result<SessionEvent<T>, NetError> {
        let deadline = Deadline::after(timeout);
        loop {
            let mut objs: Vec<&dyn Waitable> = vec![&self.available, &self.terminated];
            if let Some(debug_break) = &self.debug_break {
                objs.push(debug_break.as_ref());
            }

            match multi_wait(&objs, deadline.remaining()) {
                MultiWaitStatus::Ready(0) => {
                    // Non-empty can be stale by the time we get here; only
                    // an actual message ends the wait.
                    if let Some(message) = self.try_pop() {
                        return Ok(SessionEvent::Message(message));
                    }
                }
                MultiWaitStatus::Ready(1) => return Err(NetError::QueueTerminated),
                MultiWaitStatus::Ready(_) => return Ok(SessionEvent::DebugBreak),
                MultiWaitStatus::TimedOut => return Ok(SessionEvent::Timeout),
            }
        }
    }
}

impl<T> Default for MessageQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
