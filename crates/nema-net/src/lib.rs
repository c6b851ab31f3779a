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

//! # Nema Net
//!
//! Non-blocking TCP sockets whose readiness is waitable through the same
//! [`Waitable`](nema_core::sync::Waitable) mechanism as events and threads,
//! the message queue hosts retrieve network events from, and the access
//! policy that gates what a loaded program may learn about its machine.
//!
//! Each socket placed in non-blocking mode gets a dedicated readiness
//! monitor thread: when an operation reports would-block, the socket parks
//! itself and the monitor polls the descriptor (plus a shutdown waker)
//! until the OS reports progress, then flips the socket back to ready.
//! This deliberately trades a thread per socket for fully synchronous,
//! wait-anywhere semantics; a session's handful of sockets keeps that
//! trade cheap.

#![warn(missing_docs)]

pub mod error;
pub mod listener;
mod monitor;
pub mod policy;
pub mod queue;
pub mod socket;

pub use error::{ErrorClass, NetError};
pub use listener::Listener;
pub use policy::{NetAccess, NetPolicy};
pub use queue::{MessageQueue, SessionEvent};
pub use socket::DataSocket;
