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

use std::time::Instant;

use nema_core::sync::{Event, WaitStatus, Waitable};
use nema_core::thread::Thread;
use nema_core::time::ActivityClock;
use nema_core::{RuntimeContext, SpawnError};
use std::sync::Arc;

use crate::sampler::CpuTimeSource;
use crate::stats::{evaluate, CpuSample, SampleRing, Verdict, WatchdogPolicy};

/// The self-termination watchdog.
///
/// Hosting environments run loaded programs on shared machines; a program
/// stuck in a hot loop, or abandoned by every client, should take itself
/// out rather than squat on the box. The watchdog thread samples the
/// process's CPU time on a fixed interval, feeds the ring, and applies the
/// pure trip policy from [`stats`](crate::stats). On a verdict it runs its
/// action, which by default terminates the process.
///
/// Termination bypasses the error-reporting channel: the point is to stop
/// a program that is no longer listening to anything.
pub struct Watchdog {
    thread: Thread,
}

impl Watchdog {
    /// Launches the watchdog with the default action: log the verdict at
    /// error level and exit the process.
    pub fn launch<S>(
        ctx: &RuntimeContext,
        policy: WatchdogPolicy,
        source: S,
    ) -> Result<Self, SpawnError>
    where
        S: CpuTimeSource + 'static,
    {
        Self::launch_with_action(ctx, policy, source, |_| std::process::exit(1))
    }

    /// Launches the watchdog with a custom trip action, for embedders that
    /// terminate differently and for tests.
    pub fn launch_with_action<S, A>(
        ctx: &RuntimeContext,
        policy: WatchdogPolicy,
        source: S,
        action: A,
    ) -> Result<Self, SpawnError>
    where
        S: CpuTimeSource + 'static,
        A: FnMut(Verdict) + Send + 'static,
    {
        let quit = Arc::clone(ctx.quit());
        let activity = Arc::clone(ctx.activity());
        let thread = Thread::launch(ctx, "watchdog", move || {
            run(quit, activity, policy, source, action);
        })?;
        Ok(Self { thread })
    }

    /// True once the watchdog thread has exited.
    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }
}

impl Waitable for Watchdog {
    fn event(&self) -> &Event {
        self.thread.event()
    }
}

fn run<S, A>(
    quit: Arc<Event>,
    activity: Arc<ActivityClock>,
    policy: WatchdogPolicy,
    mut source: S,
    mut action: A,
) where
    S: CpuTimeSource,
    A: FnMut(Verdict),
{
    log::info!(
        "Watchdog started: {:?} interval, {:.0}% CPU over {} intervals, {}s idle limit",
        policy.interval,
        policy.cpu_threshold * 100.0,
        policy.window,
        policy.idle_limit.as_secs()
    );
    let mut ring = SampleRing::new(policy.ring_capacity());

    loop {
        match quit.wait(Some(policy.interval)) {
            WaitStatus::Signaled => {
                log::debug!("Watchdog observed the shutdown request, exiting");
                return;
            }
            WaitStatus::TimedOut => {
                let sample = CpuSample {
                    cpu: source.cpu_time(),
                    wall: Instant::now(),
                };
                ring.push(sample);
                log::trace!(
                    "Watchdog sample: {:?} CPU, idle {:?}",
                    sample.cpu,
                    activity.idle_for()
                );

                if let Some(verdict) = evaluate(&ring, &policy, activity.idle_for()) {
                    log::error!("Watchdog tripped: {verdict}; terminating the process");
                    action(verdict);
                    return;
                }
            }
        }
    }
}
