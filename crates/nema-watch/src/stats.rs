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

//! Watchdog sampling state and the pure trip policy.
//!
//! Everything here is plain data and arithmetic: the ring buffer of
//! `(cpu, wall)` samples, the configurable thresholds, and
//! [`evaluate`], which turns them into a verdict without touching the
//! process. The watchdog thread owns the side effects; these functions can
//! be driven exhaustively from tests with synthetic clocks.

use std::fmt;
use std::time::{Duration, Instant};

/// One watchdog observation: total process CPU time consumed so far, and
/// when it was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuSample {
    /// Accumulated CPU time of the whole process.
    pub cpu: Duration,
    /// Wall-clock moment the sample was taken.
    pub wall: Instant,
}

/// Fixed-capacity ring of the most recent samples; pushing past capacity
/// overwrites the oldest entry.
#[derive(Debug)]
pub struct SampleRing {
    samples: Vec<CpuSample>,
    capacity: usize,
    /// Next write position once the ring is full.
    index: usize,
}

impl SampleRing {
    /// Creates a ring holding at most `capacity` samples.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "a sample ring needs room for at least one sample");
        Self {
            samples: Vec::with_capacity(capacity),
            capacity,
            index: 0,
        }
    }

    /// Maximum number of retained samples.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of samples currently held.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// True while no sample has been pushed.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Appends a sample, overwriting the oldest once full.
    pub fn push(&mut self, sample: CpuSample) {
        if self.samples.len() < self.capacity {
            self.samples.push(sample);
        } else {
            self.samples[self.index] = sample;
            self.index = (self.index + 1) % self.capacity;
        }
    }

    /// The most recently pushed sample.
    pub fn latest(&self) -> Option<&CpuSample> {
        self.back(0)
    }

    /// The sample `age` pushes before the latest: `back(0)` is the latest,
    /// `back(len - 1)` the oldest retained.
    pub fn back(&self, age: usize) -> Option<&CpuSample> {
        if age >= self.samples.len() {
            return None;
        }
        // Before the first wrap `index` is zero and the newest element is
        // the last one; afterwards the newest is just before `index`.
        let newest = if self.samples.len() < self.capacity {
            self.samples.len() - 1
        } else {
            (self.index + self.capacity - 1) % self.capacity
        };
        let pos = (newest + self.samples.len() - age) % self.samples.len();
        self.samples.get(pos)
    }
}

/// Thresholds for the watchdog trip decision.
///
/// The defaults match the historical tuning: sample every 10 seconds,
/// judge CPU use over a trailing 60-second window (six intervals), trip at
/// 40% sustained CPU, and trip after 6 minutes without inbound network
/// activity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WatchdogPolicy {
    /// Time between samples.
    pub interval: Duration,
    /// Number of intervals in the trailing CPU window. The CPU check needs
    /// `window + 1` samples before it has an opinion.
    pub window: usize,
    /// CPU-time fraction (1.0 = one full core) at or above which the
    /// process is judged runaway.
    pub cpu_threshold: f64,
    /// Inbound-network idle span beyond which the process is judged
    /// abandoned.
    pub idle_limit: Duration,
}

impl WatchdogPolicy {
    /// Ring capacity needed to evaluate the CPU window.
    pub fn ring_capacity(&self) -> usize {
        self.window + 1
    }
}

impl Default for WatchdogPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            window: 6,
            cpu_threshold: 0.40,
            idle_limit: Duration::from_secs(360),
        }
    }
}

/// Why the watchdog decided the process must die.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Verdict {
    /// Sustained CPU use at or above the policy threshold.
    CpuRunaway {
        /// Observed CPU fraction over the trailing window.
        fraction: f64,
    },
    /// No inbound network activity for longer than the policy allows.
    NetworkIdle {
        /// Observed idle span.
        idle: Duration,
    },
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::CpuRunaway { fraction } => {
                write!(f, "sustained CPU use at {:.0}% of one core", fraction * 100.0)
            }
            Verdict::NetworkIdle { idle } => {
                write!(f, "no inbound network activity for {}s", idle.as_secs())
            }
        }
    }
}

/// Judges the current samples against the policy. Pure: no clocks are
/// read and nothing is terminated here.
///
/// The CPU check compares the newest sample with the one `window` pushes
/// earlier and trips at `cpu_threshold` or above; it stays silent until
/// enough samples exist. The idle check is independent of the ring and
/// trips once `idle` strictly exceeds the limit. CPU runaway is checked
/// first.
pub fn evaluate(ring: &SampleRing, policy: &WatchdogPolicy, idle: Duration) -> Option<Verdict> {
    if let Some(verdict) = cpu_runaway(ring, policy) {
        return Some(verdict);
    }
    if idle > policy.idle_limit {
        return Some(Verdict::NetworkIdle { idle });
    }
    None
}

fn cpu_runaway(ring: &SampleRing, policy: &WatchdogPolicy) -> Option<Verdict> {
    let newest = ring.latest()?;
    let oldest = ring.back(policy.window)?;

    let wall = newest.wall.saturating_duration_since(oldest.wall);
    if wall.is_zero() {
        return None;
    }
    let cpu = newest.cpu.saturating_sub(oldest.cpu);
    let fraction = cpu.as_secs_f64() / wall.as_secs_f64();
    if fraction >= policy.cpu_threshold {
        Some(Verdict::CpuRunaway { fraction })
    } else {
        None
    }
}
