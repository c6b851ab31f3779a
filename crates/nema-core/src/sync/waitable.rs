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

use std::sync::Arc;
use std::time::Duration;

use crate::sync::event::{Event, WaitStatus};
use crate::time::Deadline;

/// An object a thread can block on: an event, a thread's completion, a
/// socket's readiness.
///
/// Every waitable is backed by exactly one [`Event`]; exposing it through
/// [`event`](Self::event) is what lets [`multi_wait`] compose arbitrary
/// mixes of waitables without knowing their concrete types.
pub trait Waitable {
    /// The event that carries this object's signaled state.
    fn event(&self) -> &Event;

    /// Blocks until this object is signaled or the timeout elapses.
    /// `None` waits indefinitely.
    fn wait(&self, timeout: Option<Duration>) -> WaitStatus {
        self.event().wait(timeout)
    }

    /// Non-blocking readiness probe. On auto-reset objects a `true` result
    /// consumes the signal, exactly as a completed wait would.
    fn test(&self) -> bool {
        self.event().test()
    }
}

impl Waitable for Event {
    fn event(&self) -> &Event {
        self
    }
}

/// Outcome of a wait over several waitable objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MultiWaitStatus {
    /// The object at this index in the caller's slice was signaled. When
    /// several objects are ready at once, the lowest index wins.
    Ready(usize),
    /// The deadline passed with no object signaled.
    TimedOut,
}

/// Unsubscribes the group event from every operand when the wait ends,
/// on every exit path.
struct SubscriptionGuard<'a> {
    objs: &'a [&'a dyn Waitable],
    group: &'a Arc<Event>,
}

impl<'a> SubscriptionGuard<'a> {
    fn subscribe_all(objs: &'a [&'a dyn Waitable], group: &'a Arc<Event>) -> Self {
        for obj in objs {
            obj.event().subscribe(group);
        }
        Self { objs, group }
    }
}

impl Drop for SubscriptionGuard<'_> {
    fn drop(&mut self) {
        for obj in self.objs {
            obj.event().unsubscribe(self.group);
        }
    }
}

/// Blocks until one of `objs` is signaled or the timeout elapses.
///
/// Returns [`MultiWaitStatus::Ready`] with the index of the signaled object,
/// breaking ties toward the lowest index, or [`MultiWaitStatus::TimedOut`].
/// A timeout of `None` waits indefinitely. An auto-reset winner has its
/// signal consumed by the wait; the other operands are left untouched.
///
/// The mechanism is subscription, not polling: an ephemeral auto-reset
/// group event is subscribed to every operand, the operands are scanned
/// once, and if none is ready the caller blocks on the group event until
/// some operand's signal forwards to it. A signal landing between the scan
/// and the block is therefore never lost, and an idle wait consumes no CPU.
///
/// Waiting on an empty slice simply runs out the timeout.
pub fn multi_wait(objs: &[&dyn Waitable], timeout: Option<Duration>) -> MultiWaitStatus {
    let deadline = Deadline::after(timeout);
    let group = Arc::new(Event::auto_reset());
    let _subscriptions = SubscriptionGuard::subscribe_all(objs, &group);

    loop {
        for (index, obj) in objs.iter().enumerate() {
            if obj.test() {
                return MultiWaitStatus::Ready(index);
            }
        }
        if group.wait_until(deadline) == WaitStatus::TimedOut {
            return MultiWaitStatus::TimedOut;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn returns_index_of_already_signaled_object() {
        let a = Event::manual_reset();
        let b = Event::manual_reset();
        b.signal();

        let objs: [&dyn Waitable; 2] = [&a, &b];
        assert_eq!(multi_wait(&objs, Some(Duration::from_millis(100))), MultiWaitStatus::Ready(1));
    }

    #[test]
    fn lowest_index_wins_when_several_are_ready() {
        let a = Event::manual_reset();
        let b = Event::manual_reset();
        let c = Event::manual_reset();
        c.signal();
        b.signal();
        a.signal();

        let objs: [&dyn Waitable; 3] = [&a, &b, &c];
        assert_eq!(multi_wait(&objs, None), MultiWaitStatus::Ready(0));
    }

    #[test]
    fn wakes_when_an_object_is_signaled_from_another_thread() {
        let a = Arc::new(Event::manual_reset());
        let b = Arc::new(Event::manual_reset());

        let signaler = {
            let b = Arc::clone(&b);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(100));
                b.signal();
            })
        };

        let objs: [&dyn Waitable; 2] = [a.as_ref(), b.as_ref()];
        let start = Instant::now();
        let status = multi_wait(&objs, Some(Duration::from_secs(5)));

        assert_eq!(status, MultiWaitStatus::Ready(1));
        assert!(
            start.elapsed() < Duration::from_secs(5),
            "wait should return on the signal, not the timeout"
        );
        signaler.join().expect("signaler should not panic");
    }

    #[test]
    fn auto_reset_winner_is_consumed_and_losers_untouched() {
        let winner = Event::auto_reset();
        let loser = Event::auto_reset();
        winner.signal();
        loser.signal();

        let objs: [&dyn Waitable; 2] = [&winner, &loser];
        assert_eq!(multi_wait(&objs, None), MultiWaitStatus::Ready(0));

        assert!(!winner.test(), "the wait consumed the winner's signal");
        assert!(loser.test(), "the losing operand keeps its signal");
    }

    #[test]
    fn times_out_and_never_early() {
        let a = Event::manual_reset();
        let b = Event::auto_reset();
        let objs: [&dyn Waitable; 2] = [&a, &b];

        let start = Instant::now();
        let status = multi_wait(&objs, Some(Duration::from_millis(100)));
        let elapsed = start.elapsed();

        assert_eq!(status, MultiWaitStatus::TimedOut);
        assert!(
            elapsed >= Duration::from_millis(100),
            "multi_wait returned after {elapsed:?}, before the requested timeout"
        );
        assert!(elapsed < Duration::from_millis(500), "overshot badly: {elapsed:?}");
    }

    #[test]
    fn subscriptions_are_removed_on_every_exit_path() {
        let a = Event::manual_reset();
        let b = Event::manual_reset();
        let objs: [&dyn Waitable; 2] = [&a, &b];

        // Timeout path.
        let _ = multi_wait(&objs, Some(Duration::from_millis(20)));
        assert_eq!(a.subscriber_count(), 0);
        assert_eq!(b.subscriber_count(), 0);

        // Ready path.
        a.signal();
        let _ = multi_wait(&objs, Some(Duration::from_millis(20)));
        assert_eq!(a.subscriber_count(), 0);
        assert_eq!(b.subscriber_count(), 0);
    }

    #[test]
    fn empty_list_runs_out_the_timeout() {
        let start = Instant::now();
        assert_eq!(multi_wait(&[], Some(Duration::from_millis(50))), MultiWaitStatus::TimedOut);
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn concurrent_signals_never_hang_the_waiter() {
        for _ in 0..25 {
            let a = Arc::new(Event::auto_reset());
            let b = Arc::new(Event::auto_reset());

            let mut signalers = Vec::new();
            for ev in [Arc::clone(&a), Arc::clone(&b)] {
                signalers.push(thread::spawn(move || {
                    ev.signal();
                }));
            }

            let objs: [&dyn Waitable; 2] = [a.as_ref(), b.as_ref()];
            match multi_wait(&objs, Some(Duration::from_secs(5))) {
                MultiWaitStatus::Ready(index) => assert!(index < 2),
                MultiWaitStatus::TimedOut => panic!("signals were sent but the wait timed out"),
            }
            for signaler in signalers {
                signaler.join().expect("signaler should not panic");
            }
        }
    }

    #[test]
    fn same_object_listed_twice_resolves_to_first_slot() {
        let a = Event::manual_reset();
        a.signal();

        let objs: [&dyn Waitable; 2] = [&a, &a];
        assert_eq!(multi_wait(&objs, None), MultiWaitStatus::Ready(0));
        assert_eq!(a.subscriber_count(), 0);
    }
}
