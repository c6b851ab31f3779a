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

//! Synchronization primitives: events, waitables, counters, and mutexes.
//!
//! The central abstraction is the [`Event`], a condvar-backed signal counter
//! with either manual or automatic reset. [`Waitable`] generalizes "things a
//! thread can block on" (events, threads, sockets) so that [`multi_wait`] can
//! block on any mix of them and report which one fired first.

mod counter;
mod event;
mod mutex;
mod waitable;

pub use self::counter::AtomicCounter;
pub use self::event::{Event, WaitStatus};
pub use self::mutex::{Mutex, MutexGuard};
pub use self::waitable::{multi_wait, MultiWaitStatus, Waitable};
