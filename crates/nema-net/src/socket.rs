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

//! Waitable TCP sockets.
//!
//! A socket in non-blocking mode is a two-state machine published through a
//! pair of manual-reset events:
//!
//! * **Ready**: the last operation did not block; callers should attempt
//!   I/O directly.
//! * **Blocked**: an operation reported would-block; callers wait on the
//!   socket (its ready event) while the readiness monitor thread watches
//!   the descriptor and flips the pair back once the OS reports progress.
//!
//! The two events are never both signaled once non-blocking mode is active:
//! the would-block path resets ready before signaling blocked, and the
//! monitor resets blocked before signaling ready. A socket still in
//! blocking mode keeps its ready event permanently signaled, so waiting on
//! it is always an immediate "go ahead and try".

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::os::fd::{AsRawFd, RawFd};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use mio::unix::SourceFd;
use mio::{Interest, Poll, Waker};
use nema_core::sync::{Event, Mutex, Waitable};
use nema_core::thread::Thread;
use nema_core::RuntimeContext;

use crate::error::{ErrorClass, NetError};
use crate::monitor;

/// Event pair and monitor-facing flags shared between a socket wrapper and
/// its readiness monitor thread.
#[derive(Debug)]
pub(crate) struct SocketShared {
    label: String,
    /// Signaled while callers should attempt I/O. Starts signaled.
    ready: Event,
    /// Signaled while the monitor should watch the descriptor.
    blocked: Event,
    /// Direction of the operation that hit would-block: true for send.
    send_blocked: AtomicBool,
    /// Set by close before waking the monitor.
    stop: AtomicBool,
}

impl SocketShared {
    fn new(label: String) -> Arc<Self> {
        let ready = Event::manual_reset();
        ready.signal();
        Arc::new(Self {
            label,
            ready,
            blocked: Event::manual_reset(),
            send_blocked: AtomicBool::new(false),
            stop: AtomicBool::new(false),
        })
    }

    pub(crate) fn label(&self) -> &str {
        &self.label
    }

    pub(crate) fn ready(&self) -> &Event {
        &self.ready
    }

    /// Blocks the monitor until a would-block transition (or shutdown)
    /// signals the blocked event.
    pub(crate) fn wait_blocked(&self) {
        self.blocked.wait(None);
    }

    pub(crate) fn is_stopping(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub(crate) fn blocked_direction_is_send(&self) -> bool {
        self.send_blocked.load(Ordering::SeqCst)
    }

    /// Ready → Blocked. Direction is recorded first so the monitor wakes
    /// with the right interest to watch.
    fn enter_blocked(&self, send: bool) {
        self.send_blocked.store(send, Ordering::SeqCst);
        self.ready.reset();
        self.blocked.signal();
    }

    /// Blocked → Ready, driven by the monitor observing OS readiness.
    pub(crate) fn mark_ready(&self) {
        self.blocked.reset();
        self.ready.signal();
    }

    /// Signals both events so nothing stays parked on a socket whose
    /// monitor is gone. Only used on monitor exit.
    pub(crate) fn release_all_waiters(&self) {
        self.blocked.signal();
        self.ready.signal();
    }
}

/// The per-socket plumbing common to data sockets and listeners: context
/// accounting, the shared event pair, the sticky last error, and the
/// monitor thread lifecycle.
#[derive(Debug)]
pub(crate) struct SocketCore {
    ctx: RuntimeContext,
    shared: Arc<SocketShared>,
    waker: Mutex<Option<Waker>>,
    monitor: Mutex<Option<Thread>>,
    last_error: Mutex<Option<ErrorClass>>,
}

impl SocketCore {
    pub(crate) fn new(ctx: RuntimeContext, label: String) -> Self {
        let open = ctx.open_sockets().increment();
        log::debug!("{label} opened ({open} open)");
        Self {
            ctx,
            shared: SocketShared::new(label),
            waker: Mutex::new(None),
            monitor: Mutex::new(None),
            last_error: Mutex::new(None),
        }
    }

    pub(crate) fn ctx(&self) -> &RuntimeContext {
        &self.ctx
    }

    pub(crate) fn label(&self) -> &str {
        self.shared.label()
    }

    pub(crate) fn ready_event(&self) -> &Event {
        self.shared.ready()
    }

    /// Records a would-block transition in the stated direction.
    pub(crate) fn enter_blocked(&self, send: bool) {
        self.shared.enter_blocked(send);
        *self.last_error.lock() = Some(ErrorClass::WouldBlock);
        log::trace!(
            "{}: would block on {}, parking until readiness",
            self.label(),
            if send { "send" } else { "receive" }
        );
    }

    pub(crate) fn note_success(&self) {
        *self.last_error.lock() = None;
    }

    pub(crate) fn record_failure(&self, err: &NetError) {
        *self.last_error.lock() = Some(err.class());
        log::debug!("{}: {err}", self.label());
    }

    pub(crate) fn last_error(&self) -> Option<ErrorClass> {
        *self.last_error.lock()
    }

    /// Starts the readiness monitor for `fd` if it is not already running.
    pub(crate) fn launch_monitor(&self, fd: RawFd) -> Result<(), NetError> {
        let mut slot = self.monitor.lock();
        if slot.is_some() {
            return Ok(());
        }

        let poll = Poll::new()?;
        poll.registry()
            .register(&mut SourceFd(&fd), monitor::SOCKET_TOKEN, Interest::READABLE)?;
        let waker = Waker::new(poll.registry(), monitor::WAKER_TOKEN)?;

        let shared = Arc::clone(&self.shared);
        let name = format!("monitor[{}]", self.label());
        let thread = Thread::launch(&self.ctx, &name, move || monitor::run(poll, fd, shared))
            .map_err(|e| NetError::Io(io::Error::other(e)))?;
        // The waker slot is populated only alongside a running monitor
        // thread; an error return leaves both slots empty.
        *self.waker.lock() = Some(waker);
        *slot = Some(thread);
        Ok(())
    }

    /// Stops the monitor and waits for it to exit. The caller's descriptor
    /// must stay open until this returns.
    pub(crate) fn stop_monitor(&self) {
        let thread = self.monitor.lock().take();
        if let Some(thread) = thread {
            self.shared.request_stop();
            if let Some(waker) = self.waker.lock().as_ref() {
                if let Err(e) = waker.wake() {
                    log::warn!("{}: failed to wake monitor for shutdown: {e}", self.label());
                }
            }
            // The monitor may be parked on the blocked event rather than in
            // the poll; wake that rendezvous too.
            self.shared.blocked.signal();
            thread.wait(None);
            *self.waker.lock() = None;
        }
    }

    /// Final accounting once the OS handle is gone.
    pub(crate) fn note_closed(&self) {
        let open = self.ctx.open_sockets().decrement();
        log::debug!("{} closed ({open} still open)", self.label());
    }
}

/// A TCP data socket whose readiness can be waited on alongside events,
/// threads, and queues.
///
/// In blocking mode this is a plain socket. After
/// [`set_non_blocking`](Self::set_non_blocking), send and receive never
/// stall: they either transfer bytes or return
/// [`NetError::WouldBlock`] after parking the socket in the blocked state,
/// to be released by the readiness monitor.
#[derive(Debug)]
pub struct DataSocket {
    core: SocketCore,
    // Arc so a caller mid-syscall holds the stream alive without holding
    // the lock; close takes the slot and never waits behind blocking I/O.
    stream: Mutex<Option<Arc<TcpStream>>>,
}

impl DataSocket {
    /// Opens a TCP connection to `host:port` (blocking mode).
    pub fn connect(ctx: &RuntimeContext, host: &str, port: u16) -> Result<Self, NetError> {
        let stream = TcpStream::connect((host, port)).map_err(NetError::from_io)?;
        log::debug!("Connected to {host}:{port}");
        Ok(Self::wrap(ctx.clone(), stream, "connection"))
    }

    pub(crate) fn from_accepted(ctx: RuntimeContext, stream: TcpStream) -> Self {
        Self::wrap(ctx, stream, "accepted connection")
    }

    fn wrap(ctx: RuntimeContext, stream: TcpStream, kind: &str) -> Self {
        let label = match (stream.local_addr(), stream.peer_addr()) {
            (Ok(local), Ok(peer)) => format!("{kind} {local} -> {peer}"),
            _ => kind.to_string(),
        };
        Self {
            core: SocketCore::new(ctx, label),
            stream: Mutex::new(Some(Arc::new(stream))),
        }
    }

    /// Clones out the live stream handle, holding the lock only for the
    /// clone. I/O then proceeds without blocking [`close`](Self::close).
    fn stream_handle(&self) -> Result<Arc<TcpStream>, NetError> {
        match self.stream.lock().as_ref() {
            Some(stream) => Ok(Arc::clone(stream)),
            None => Err(NetError::Closed),
        }
    }

    /// Sends bytes, returning how many were accepted by the OS.
    ///
    /// In non-blocking mode a full send buffer yields
    /// [`NetError::WouldBlock`] and parks the socket in the blocked state;
    /// wait on the socket and retry once it signals.
    pub fn send(&self, buf: &[u8]) -> Result<usize, NetError> {
        let stream = match self.stream_handle() {
            Ok(stream) => stream,
            Err(err) => {
                self.core.record_failure(&err);
                return Err(err);
            }
        };
        let mut stream: &TcpStream = &stream;
        loop {
            match stream.write(buf) {
                Ok(sent) => {
                    self.core.note_success();
                    return Ok(sent);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    self.core.enter_blocked(true);
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

    /// Receives bytes into `buf`, returning the count; `Ok(0)` is the
    /// peer's orderly close.
    ///
    /// A receive that delivers bytes stamps the context's activity clock;
    /// the zero-byte end-of-stream read does not, so a half-closed peer
    /// cannot keep an idle process looking busy. In non-blocking mode an
    /// empty receive buffer yields [`NetError::WouldBlock`] exactly as
    /// [`send`](Self::send) does.
    pub fn recv(&self, buf: &mut [u8]) -> Result<usize, NetError> {
        let stream = match self.stream_handle() {
            Ok(stream) => stream,
            Err(err) => {
                self.core.record_failure(&err);
                return Err(err);
            }
        };
        let mut stream: &TcpStream = &stream;
        loop {
            match stream.read(buf) {
                Ok(received) => {
                    self.core.note_success();
                    if received > 0 {
                        self.core.ctx().activity().touch();
                    }
                    return Ok(received);
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

    /// Switches the socket to non-blocking mode and starts its readiness
    /// monitor. Idempotent.
    pub fn set_non_blocking(&self) -> Result<(), NetError> {
        let stream = self.stream_handle()?;
        stream.set_nonblocking(true).map_err(NetError::from_io)?;
        self.core.launch_monitor(stream.as_raw_fd())
    }

    /// The local address of this socket.
    pub fn local_addr(&self) -> Result<SocketAddr, NetError> {
        let stream = self.stream_handle()?;
        stream.local_addr().map_err(NetError::from_io)
    }

    /// The peer's address.
    pub fn peer_addr(&self) -> Result<SocketAddr, NetError> {
        let stream = self.stream_handle()?;
        stream.peer_addr().map_err(NetError::from_io)
    }

    /// The class of the most recent failure, cleared by the next
    /// successful operation.
    pub fn last_error(&self) -> Option<ErrorClass> {
        self.core.last_error()
    }

    /// Closes the socket. Safe to call while the monitor thread is mid-poll
    /// and safe to call twice.
    ///
    /// A thread parked inside a blocking send or receive is woken first by
    /// an orderly shutdown (it observes EOF or a write failure), so close
    /// never waits for traffic. The monitor is then stopped and waited for
    /// *before* the OS handle is released, so the monitor never polls a
    /// recycled descriptor. Waiters parked on the socket are released by
    /// the monitor's exit.
    pub fn close(&self) {
        let taken = self.stream.lock().take();
        if let Some(stream) = taken {
            let _ = stream.shutdown(Shutdown::Both);
            self.core.stop_monitor();
            drop(stream);
            self.core.note_closed();
        }
    }
}

impl Waitable for DataSocket {
    fn event(&self) -> &Event {
        self.core.ready_event()
    }
}

impl Drop for DataSocket {
    fn drop(&mut self) {
        self.close();
    }
}
