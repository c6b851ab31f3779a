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

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::time::Deadline;

/// Outcome of a blocking wait on a single waitable object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStatus {
    /// The object was signaled before the deadline.
    Signaled,
    /// The deadline passed without a signal.
    TimedOut,
}

#[derive(Debug)]
struct EventState {
    /// Pending signal units. Manual-reset events treat any non-zero value as
    /// "signaled until reset"; auto-reset events consume one unit per
    /// released waiter.
    count: u64,
    /// Group events currently multi-waiting on this event, in subscription
    /// order. Appending at the tail gives round-robin fairness when several
    /// multi-waiters keep re-subscribing to the same object.
    subscribers: Vec<Arc<Event>>,
}

/// A waitable signal with either manual or automatic reset.
///
/// Internally this is a signal counter guarded by a mutex and published
/// through a condition variable; it is never a bare flag, so a signal can
/// never be lost between a waiter's check and its block.
///
/// * **Manual reset**: once signaled the event stays signaled, releasing
///   every current and future waiter, until [`reset`](Self::reset) is called.
/// * **Auto reset**: each signal releases exactly one waiter (or one
///   successful [`test`](Self::test)), consuming the signal in the same
///   atomic step.
#[derive(Debug)]
pub struct Event {
    manual_reset: bool,
    state: Mutex<EventState>,
    cond: Condvar,
}

impl Event {
    /// Creates a manual-reset event, initially unsignaled.
    pub fn manual_reset() -> Self {
        Self::new(true)
    }

    /// Creates an auto-reset event, initially unsignaled.
    pub fn auto_reset() -> Self {
        Self::new(false)
    }

    fn new(manual_reset: bool) -> Self {
        Self {
            manual_reset,
            state: Mutex::new(EventState {
                count: 0,
                subscribers: Vec::new(),
            }),
            cond: Condvar::new(),
        }
    }

    /// Returns true if this event keeps its signaled state until reset.
    pub fn is_manual_reset(&self) -> bool {
        self.manual_reset
    }

    fn lock_state(&self) -> MutexGuard<'_, EventState> {
        // A waiter panicking while blocked cannot corrupt the counter, so a
        // poisoned lock still holds consistent state; recover and continue.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Signals the event.
    ///
    /// All threads currently blocked in [`wait`](Self::wait) are woken; with
    /// manual reset every one of them completes, with auto reset exactly one
    /// consumes the signal and the rest go back to sleep. Any group events
    /// subscribed through a multi-object wait are signaled as well, while
    /// this event's lock is held.
    pub fn signal(&self) {
        let mut state = self.lock_state();
        state.count += 1;
        self.cond.notify_all();
        // Group events never have subscribers of their own, so this nested
        // signal cannot re-enter another operand's lock.
        for group in state.subscribers.iter() {
            group.signal();
        }
    }

    /// Clears the signaled state of a manual-reset event.
    ///
    /// Auto-reset events consume their signals as waiters complete, so reset
    /// is a no-op for them.
    pub fn reset(&self) {
        if self.manual_reset {
            self.lock_state().count = 0;
        }
    }

    /// Consumes a pending signal without blocking.
    ///
    /// Returns true if the event was signaled. For an auto-reset event a
    /// successful probe takes one signal unit, exactly as a completed wait
    /// would; for a manual-reset event the state is left untouched.
    pub fn test(&self) -> bool {
        let mut state = self.lock_state();
        if state.count > 0 {
            if !self.manual_reset {
                state.count -= 1;
            }
            true
        } else {
            false
        }
    }

    /// Blocks until the event is signaled or the timeout elapses.
    ///
    /// `None` waits indefinitely. The timeout is converted to an absolute
    /// deadline once, on entry, so spurious condvar wakeups never stretch
    /// the total wait.
    pub fn wait(&self, timeout: Option<Duration>) -> WaitStatus {
        self.wait_until(Deadline::after(timeout))
    }

    /// Blocks until the event is signaled or `deadline` passes.
    ///
    /// This is the form used when one deadline spans several composed waits,
    /// such as a multi-object wait re-checking its operands in a loop.
    pub fn wait_until(&self, deadline: Deadline) -> WaitStatus {
        let mut state = self.lock_state();
        loop {
            if state.count > 0 {
                if !self.manual_reset {
                    state.count -= 1;
                }
                return WaitStatus::Signaled;
            }
            match deadline.remaining() {
                None => {
                    state = self
                        .cond
                        .wait(state)
                        .unwrap_or_else(PoisonError::into_inner);
                }
                Some(rem) if rem.is_zero() => return WaitStatus::TimedOut,
                Some(rem) => {
                    state = self
                        .cond
                        .wait_timeout(state, rem)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0;
                }
            }
        }
    }

    /// Registers a group event to be signaled whenever this event is.
    ///
    /// The subscription is appended at the tail of the list; callers must
    /// balance it with [`unsubscribe`](Self::unsubscribe).
    pub(crate) fn subscribe(&self, group: &Arc<Event>) {
        self.lock_state().subscribers.push(Arc::clone(group));
    }

    /// Removes one subscription of `group`, if present.
    pub(crate) fn unsubscribe(&self, group: &Arc<Event>) {
        let mut state = self.lock_state();
        if let Some(pos) = state
            .subscribers
            .iter()
            .position(|s| Arc::ptr_eq(s, group))
        {
            state.subscribers.remove(pos);
        }
    }

    #[cfg(test)]
    pub(crate) fn subscriber_count(&self) -> usize {
        self.lock_state().subscribers.len()
    }
}
