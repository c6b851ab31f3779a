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

use std::io;
use std::net::{SocketAddr, TcpListener};
use std::os::fd::AsRawFd;
use std::sync::Arc;

use nema_core::sync::{Event, Mutex, Waitable};
use nema_core::RuntimeContext;

use crate::error::{ErrorClass, NetError};
use crate::socket::{DataSocket, SocketCore};

/// A TCP listener with the same waitable readiness machinery as
/// [`DataSocket`]: in non-blocking mode an accept on an empty pending
/// queue parks the listener in the blocked state until the monitor sees an
/// incoming connection.
pub struct Listener {
    core: SocketCore,
    // Arc for the same reason as DataSocket: an accept mid-syscall must
    // not pin the lock that close needs.
    listener: Mutex<Option<Arc<TcpListener>>>,
}

impl Listener {
    /// Binds to `host:port` and starts listening. Port 0 asks the OS for
    /// an ephemeral port; read it back with [`local_addr`](Self::local_addr).
    pub fn open(ctx: &RuntimeContext, host: &str, port: u16) -> Result<Self, NetError> {
        let listener = TcpListener::bind((host, port)).map_err(NetError::from_io)?;
        let label = match listener.local_addr() {
            Ok(addr) => format!("listener {addr}"),
            Err(_) => "listener".to_string(),
        };
        log::info!("{label} accepting connections");
        Ok(Self {
            core: SocketCore::new(ctx.clone(), label),
            listener: Mutex::new(Some(Arc::new(listener))),
        })
    }

    fn listener_handle(&self) -> Result<Arc<TcpListener>, NetError> {
        match self.listener.lock().as_ref() {
            Some(listener) => Ok(Arc::clone(listener)),
            None => Err(NetError::Closed),
        }
    }

    /// The address the listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, NetError> {
        let listener = self.listener_handle()?;
        listener.local_addr().map_err(NetError::from_io)
    }

    /// Accepts one pending connection.
    ///
    /// The new socket has Nagle coalescing disabled and starts in blocking
    /// mode with its ready event signaled. An accepted connection counts as
    /// inbound activity on the context clock. In non-blocking mode an empty
    /// pending queue yields [`NetError::WouldBlock`] and parks the listener
    /// until the monitor signals readiness.
    pub fn accept(&self) -> Result<DataSocket, NetError> {
        let listener = match self.listener_handle() {
            Ok(listener) => listener,
            Err(err) => {
                self.core.record_failure(&err);
                return Err(err);
            }
        };
        loop {
            match listener.accept() {
                Ok((stream, peer)) => {
                    if let Err(e) = stream.set_nodelay(true) {
                        log::warn!("{}: failed to disable Nagle on {peer}: {e}", self.core.label());
                    }
                    self.core.note_success();
                    self.core.ctx().activity().touch();
                    log::debug!("{}: accepted {peer}", self.core.label());
                    return Ok(DataSocket::from_accepted(self.core.ctx().clone(), stream));
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    self.core.enter_blocked(false);
                    return Err(NetError::WouldBlock);
                }
                Err(e) => {
                    let err = NetError::from_io(e);
                    self.core.record_failure(&err);
                    return Err(err);
                }
            }
        }
    }

    /// Switches the listener to non-blocking mode and starts its readiness
    /// monitor. Idempotent.
    pub fn set_non_blocking(&self) -> Result<(), NetError> {
        let listener = self.listener_handle()?;
        listener.set_nonblocking(true).map_err(NetError::from_io)?;
        self.core.launch_monitor(listener.as_raw_fd())
    }

    /// The class of the most recent failure, cleared by the next
    /// successful accept.
    pub fn last_error(&self) -> Option<ErrorClass> {
        self.core.last_error()
    }

    /// Stops accepting and releases the port. Safe against an in-flight
    /// monitor and safe to call twice; see [`DataSocket::close`].
    ///
    /// Close returns without waiting for a thread that is already parked
    /// inside a blocking `accept`; that call keeps the descriptor (and the
    /// bound port) alive until it returns. A non-blocking listener, the
    /// monitored mode, has no such parked calls.
    pub fn close(&self) {
        let taken = self.listener.lock().take();
        if let Some(listener) = taken {
            self.core.stop_monitor();
            drop(listener);
            self.core.note_closed();
        }
    }
}

impl Waitable for Listener {
    fn event(&self) -> &Event {
        self.core.ready_event()
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        self.close();
    }
}
