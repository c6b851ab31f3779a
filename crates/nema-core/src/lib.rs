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

//! # Nema Core
//!
//! Foundational crate providing the portable concurrency primitives the rest
//! of the runtime is built on: waitable events with manual and automatic
//! reset, atomic counters, a poison-tolerant mutex, reference-counted threads
//! observed through done events rather than joins, and the explicit
//! [`RuntimeContext`](context::RuntimeContext) that replaces process globals.
//!
//! Everything here is synchronous and thread-based; there is no async
//! executor anywhere in the stack. Blocking waits go through
//! [`sync::Waitable`], which composes single objects and multi-object waits
//! over one condvar-backed [`sync::Event`] mechanism.

#![warn(missing_docs)]

pub mod context;
pub mod error;
pub mod sync;
pub mod thread;
pub mod time;

pub use context::RuntimeContext;
pub use error::SpawnError;
pub use sync::{multi_wait, AtomicCounter, Event, Mutex, MultiWaitStatus, WaitStatus, Waitable};
pub use thread::{Thread, ThreadRegistry};
pub use time::{ActivityClock, Deadline};
