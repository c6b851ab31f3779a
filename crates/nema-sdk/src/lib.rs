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

//! # Nema SDK
//!
//! The stable, public-facing API for embedding hosts.
//!
//! This crate is the single entry point an embedding application needs: it
//! owns runtime startup and teardown through [`Runtime`], and re-exports the
//! types hosts interact with day to day so they rarely have to depend on the
//! lower-level crates directly.
//!
//! A minimal host looks like this:
//!
//! ```no_run
//! use nema_sdk::{Runtime, RuntimeConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     let runtime = Runtime::init(RuntimeConfig::default())?;
//!     // ... launch threads, open sockets, pump the message queue ...
//!     runtime.shutdown();
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

pub mod runtime;

pub use runtime::{Runtime, RuntimeConfig};

/// Convenience re-exports of the types most hosts need.
///
/// `use nema_sdk::prelude::*;` pulls in the runtime handle, the waitable
/// primitives, the socket layer, and the watchdog policy types in one line.
pub mod prelude {
    pub use crate::runtime::{Runtime, RuntimeConfig};
    pub use nema_core::sync::{
        multi_wait, AtomicCounter, Event, Mutex, MultiWaitStatus, WaitStatus, Waitable,
    };
    pub use nema_core::time::Deadline;
    pub use nema_core::{RuntimeContext, Thread, ThreadRegistry};
    pub use nema_net::{
        DataSocket, Listener, MessageQueue, NetAccess, NetError, NetPolicy, SessionEvent,
    };
    pub use nema_watch::{Verdict, Watchdog, WatchdogPolicy};
}
