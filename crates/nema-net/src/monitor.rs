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

//! The per-socket readiness monitor thread.
//!
//! The monitor bridges OS readiness (a `poll` on the descriptor) back to
//! the socket's waitable event pair. It spends its life in two parks:
//! waiting on the blocked event while the socket is flowing, and waiting in
//! the OS poll while the socket is stuck. Neither park consumes CPU, and
//! close wakes whichever one is active: the waker interrupts the poll, and
//! signaling the blocked event interrupts the event wait.

use std::io;
use std::os::fd::RawFd;
use std::sync::Arc;

use mio::unix::SourceFd;
use mio::{Events, Interest, Poll, Token};

use crate::socket::SocketShared;

/// Token for the monitored socket descriptor.
pub(crate) const SOCKET_TOKEN: Token = Token(0);
/// Token for the shutdown waker.
pub(crate) const WAKER_TOKEN: Token = Token(1);

/// Releases anything parked on the socket once the monitor is gone, on
/// every exit path.
struct ReleaseOnExit<'a> {
    shared: &'a SocketShared,
}

impl Drop for ReleaseOnExit<'_> {
    fn drop(&mut self) {
        self.shared.release_all_waiters();
        log::debug!("{}: readiness monitor exiting", self.shared.label());
    }
}

/// Monitor thread body. `fd` stays valid for the whole run: close waits
/// for this thread's done event before releasing the descriptor.
pub(crate) fn run(mut poll: Poll, fd: RawFd, shared: Arc<SocketShared>) {
    let _release = ReleaseOnExit { shared: &shared };
    let mut events = Events::with_capacity(8);

    log::trace!("{}: readiness monitor running", shared.label());
    loop {
        // Idle until the socket actually hits a would-block (or close
        // wants us gone).
        shared.wait_blocked();
        if shared.is_stopping() {
            return;
        }

        let interest = if shared.blocked_direction_is_send() {
            Interest::WRITABLE
        } else {
            Interest::READABLE
        };
        if let Err(e) = poll
            .registry()
            .reregister(&mut SourceFd(&fd), SOCKET_TOKEN, interest)
        {
            log::error!("{}: failed to arm readiness poll: {e}", shared.label());
            return;
        }

        match poll.poll(&mut events, None) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                log::error!("{}: readiness poll failed: {e}", shared.label());
                return;
            }
        }

        let mut shutdown = false;
        let mut socket_ready = false;
        for event in events.iter() {
            match event.token() {
                WAKER_TOKEN => shutdown = true,
                SOCKET_TOKEN => socket_ready = true,
                _ => {}
            }
        }

        if shutdown || shared.is_stopping() {
            return;
        }
        if socket_ready {
            log::trace!(
                "{}: descriptor {} again",
                shared.label(),
                if shared.blocked_direction_is_send() {
                    "writable"
                } else {
                    "readable"
                }
            );
            shared.mark_ready();
        }
        // A poll wake with no relevant event loops straight back into the
        // poll: the blocked event is still signaled, so wait_blocked does
        // not park.
    }
}
