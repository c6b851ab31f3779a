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

//! # Nema Watch
//!
//! The self-termination watchdog for hosted runtimes: a sampling thread,
//! a ring of `(cpu, wall)` observations, and a pure trip policy that
//! decides when a process has gone runaway (sustained CPU) or been
//! abandoned (no inbound network activity).
//!
//! The decision arithmetic lives in [`stats`] and has no side effects.
//! OS sampling sits behind the [`sampler::CpuTimeSource`] trait and the
//! kill action is injected into [`watchdog::Watchdog`], so every piece
//! can be tested without terminating the test process.

#![warn(missing_docs)]

pub mod sampler;
pub mod stats;
pub mod watchdog;

pub use sampler::{CpuTimeSource, ProcessCpuSource};
pub use stats::{evaluate, CpuSample, SampleRing, Verdict, WatchdogPolicy};
pub use watchdog::Watchdog;
