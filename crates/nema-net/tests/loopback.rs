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

//! Loopback exercises for the socket layer: readiness transitions,
//! monitor-driven wakeups, concurrent close, and multi-object waits over
//! live sockets.

use std::thread;
use std::time::{Duration, Instant};

use nema_core::sync::{multi_wait, MultiWaitStatus, WaitStatus, Waitable};
use nema_core::RuntimeContext;
use nema_net::{DataSocket, ErrorClass, Listener, NetError};

/// Opens a connected (client, server) socket pair through a throwaway
/// listener.
fn socket_pair(ctx: &RuntimeContext) -> (DataSocket, DataSocket) {
    let listener = Listener::open(ctx, "127.0.0.1", 0).expect("bind should succeed");
    let port = listener
        .local_addr()
        .expect("listener has an address")
        .port();
    let client = DataSocket::connect(ctx, "127.0.0.1", port).expect("connect should succeed");
    let server = listener.accept().expect("accept should succeed");
    (client, server)
}

#[test]
fn test_nonblocking_recv_parks_until_peer_sends() {
    // --- 1. ARRANGE ---
    let ctx = RuntimeContext::new();
    let (client, server) = socket_pair(&ctx);
    client
        .set_non_blocking()
        .expect("non-blocking mode should engage");

    // --- 2. ACT: receive on an empty socket ---
    let mut buf = [0u8; 64];
    let err = client.recv(&mut buf).expect_err("nothing to read yet");
    assert!(
        matches!(err, NetError::WouldBlock),
        "an empty non-blocking receive must report would-block, got {err:?}"
    );
    assert_eq!(client.last_error(), Some(ErrorClass::WouldBlock));

    // The socket is parked: its readiness wait must not complete.
    assert_eq!(
        client.wait(Some(Duration::from_millis(100))),
        WaitStatus::TimedOut,
        "a blocked socket must not report ready"
    );

    // --- 3. ACT: the peer sends ---
    let sent = server.send(b"ping").expect("peer send should succeed");
    assert_eq!(sent, 4);

    // --- 4. ASSERT: the monitor flips the socket back to ready ---
    assert_eq!(
        client.wait(Some(Duration::from_secs(5))),
        WaitStatus::Signaled,
        "readiness must arrive once the peer has sent"
    );
    let received = client.recv(&mut buf).expect("data is waiting");
    assert_eq!(&buf[..received], b"ping");
    assert_eq!(client.last_error(), None, "success clears the sticky error");

    client.close();
    server.close();
}

#[test]
fn test_nonblocking_send_parks_on_full_buffer_and_resumes() {
    // --- 1. ARRANGE ---
    let ctx = RuntimeContext::new();
    let (client, server) = socket_pair(&ctx);
    client
        .set_non_blocking()
        .expect("non-blocking mode should engage");

    // --- 2. ACT: flood until the OS buffers fill ---
    let chunk = [0x5au8; 64 * 1024];
    let mut total_sent = 0usize;
    let mut blocked = false;
    for _ in 0..4096 {
        match client.send(&chunk) {
            Ok(n) => total_sent += n,
            Err(NetError::WouldBlock) => {
                blocked = true;
                break;
            }
            Err(e) => panic!("unexpected send failure: {e}"),
        }
    }
    assert!(blocked, "loopback buffers should fill well before 256 MiB");
    assert_eq!(
        client.wait(Some(Duration::from_millis(50))),
        WaitStatus::TimedOut,
        "a send-blocked socket must not report ready"
    );

    // --- 3. ACT: the peer drains half of what is in flight ---
    let mut drained = 0usize;
    let mut buf = vec![0u8; 64 * 1024];
    while drained < total_sent / 2 {
        let n = server.recv(&mut buf).expect("drain read should succeed");
        assert!(n > 0, "sender is still open, the stream cannot be at EOF");
        drained += n;
    }

    // --- 4. ASSERT: writability comes back and sending resumes ---
    assert_eq!(
        client.wait(Some(Duration::from_secs(5))),
        WaitStatus::Signaled,
        "draining the peer must restore writability"
    );
    client
        .send(b"after the thaw")
        .expect("send should succeed once writable again");

    client.close();
    server.close();
}

#[test]
fn test_close_releases_a_parked_waiter() {
    // --- 1. ARRANGE: park a socket in the blocked state ---
    let ctx = RuntimeContext::new();
    let (client, server) = socket_pair(&ctx);
    client
        .set_non_blocking()
        .expect("non-blocking mode should engage");
    let mut buf = [0u8; 16];
    assert!(client.recv(&mut buf).is_err(), "expected would-block");

    // A second thread waits on the socket's readiness.
    let client = std::sync::Arc::new(client);
    let waiter = {
        let client = std::sync::Arc::clone(&client);
        thread::spawn(move || client.wait(Some(Duration::from_secs(10))))
    };
    thread::sleep(Duration::from_millis(100));

    // --- 2. ACT: close while the monitor is mid-poll ---
    client.close();

    // --- 3. ASSERT: close returned and the waiter was released ---
    let status = waiter.join().expect("waiter should not panic");
    assert_eq!(
        status,
        WaitStatus::Signaled,
        "closing must release parked waiters rather than strand them"
    );

    // Closing again is a no-op, and I/O now reports the closed state.
    client.close();
    assert!(matches!(client.recv(&mut buf), Err(NetError::Closed)));
    server.close();
}

#[test]
fn test_listener_accept_parks_and_wakes_on_connection() {
    // --- 1. ARRANGE ---
    let ctx = RuntimeContext::new();
    let listener = Listener::open(&ctx, "127.0.0.1", 0).expect("bind should succeed");
    let port = listener.local_addr().expect("bound").port();
    listener
        .set_non_blocking()
        .expect("non-blocking mode should engage");

    // --- 2. ACT: accept with nobody connecting ---
    let err = listener.accept().expect_err("no pending connections");
    assert!(matches!(err, NetError::WouldBlock));
    assert_eq!(
        listener.wait(Some(Duration::from_millis(100))),
        WaitStatus::TimedOut
    );

    // --- 3. ACT: a client connects ---
    let client = DataSocket::connect(&ctx, "127.0.0.1", port).expect("connect should succeed");

    // --- 4. ASSERT ---
    assert_eq!(
        listener.wait(Some(Duration::from_secs(5))),
        WaitStatus::Signaled,
        "an incoming connection must wake the parked listener"
    );
    let server = listener.accept().expect("the pending connection is there");
    assert!(server.peer_addr().is_ok());

    // A freshly accepted socket is in blocking mode: always ready.
    assert_eq!(server.wait(Some(Duration::ZERO)), WaitStatus::Signaled);

    client.close();
    server.close();
    listener.close();
}

#[test]
fn test_multi_wait_picks_the_socket_with_traffic() {
    // --- 1. ARRANGE: two parked sockets ---
    let ctx = RuntimeContext::new();
    let (first_client, first_server) = socket_pair(&ctx);
    let (second_client, second_server) = socket_pair(&ctx);
    for socket in [&first_client, &second_client] {
        socket
            .set_non_blocking()
            .expect("non-blocking mode should engage");
        let mut buf = [0u8; 8];
        assert!(socket.recv(&mut buf).is_err(), "expected would-block");
    }

    // --- 2. ACT: traffic arrives on the second socket only ---
    second_server.send(b"here").expect("send should succeed");

    // --- 3. ASSERT ---
    let objs: [&dyn Waitable; 2] = [&first_client, &second_client];
    match multi_wait(&objs, Some(Duration::from_secs(5))) {
        MultiWaitStatus::Ready(1) => {}
        other => panic!("expected the second socket to be the ready one, got {other:?}"),
    }
    let mut buf = [0u8; 8];
    let n = second_client.recv(&mut buf).expect("data is waiting");
    assert_eq!(&buf[..n], b"here");

    first_client.close();
    first_server.close();
    second_client.close();
    second_server.close();
}

#[test]
fn test_peer_close_reads_as_orderly_eof() {
    // --- 1. ARRANGE ---
    let ctx = RuntimeContext::new();
    let (client, server) = socket_pair(&ctx);
    client
        .set_non_blocking()
        .expect("non-blocking mode should engage");
    let mut buf = [0u8; 16];
    assert!(client.recv(&mut buf).is_err(), "expected would-block");

    // --- 2. ACT: the peer hangs up ---
    server.close();

    // --- 3. ASSERT: the FIN wakes the socket and reads as Ok(0) ---
    assert_eq!(
        client.wait(Some(Duration::from_secs(5))),
        WaitStatus::Signaled,
        "a peer close is readable readiness"
    );
    let n = client.recv(&mut buf).expect("EOF is not an error");
    assert_eq!(n, 0, "the peer's orderly close reads as zero bytes");

    client.close();
}

#[test]
fn test_eof_recv_leaves_the_idle_clock_untouched() {
    // --- 1. ARRANGE: a half-closed connection and an aged idle clock ---
    let ctx = RuntimeContext::new();
    let (client, server) = socket_pair(&ctx);
    drop(client);
    thread::sleep(Duration::from_millis(100));
    let aged = ctx.activity().idle_for();
    assert!(aged >= Duration::from_millis(80));

    // --- 2. ACT: read the peer's orderly close ---
    let mut buf = [0u8; 16];
    let n = server.recv(&mut buf).expect("EOF is not an error");

    // --- 3. ASSERT: zero bytes is not inbound activity ---
    assert_eq!(n, 0);
    let after = ctx.activity().idle_for();
    assert!(
        after >= aged,
        "an EOF read must not reset the idle clock: {aged:?} -> {after:?}"
    );

    server.close();
}

#[test]
fn test_close_unblocks_a_blocking_mode_reader() {
    // --- 1. ARRANGE: a reader parked inside a blocking receive ---
    let ctx = RuntimeContext::new();
    let (client, server) = socket_pair(&ctx);
    let server = std::sync::Arc::new(server);
    let reader = {
        let server = std::sync::Arc::clone(&server);
        thread::spawn(move || {
            let mut buf = [0u8; 16];
            server.recv(&mut buf)
        })
    };
    thread::sleep(Duration::from_millis(100));

    // --- 2. ACT: close from another thread ---
    let started = Instant::now();
    server.close();
    let took = started.elapsed();

    // --- 3. ASSERT: close was prompt and the reader came back ---
    assert!(
        took < Duration::from_secs(2),
        "close must not wait behind a blocked receive, took {took:?}"
    );
    let result = reader.join().expect("reader should not panic");
    assert!(
        matches!(result, Ok(0) | Err(NetError::Closed)),
        "the reader must observe EOF or the closed state, got {result:?}"
    );

    client.close();
}

#[test]
fn test_listener_close_does_not_wait_for_a_blocked_accept() {
    // --- 1. ARRANGE: a thread parked inside a blocking accept ---
    let ctx = RuntimeContext::new();
    let listener =
        std::sync::Arc::new(Listener::open(&ctx, "127.0.0.1", 0).expect("bind should succeed"));
    let port = listener.local_addr().expect("bound").port();
    let acceptor = {
        let listener = std::sync::Arc::clone(&listener);
        thread::spawn(move || listener.accept())
    };
    thread::sleep(Duration::from_millis(100));

    // --- 2. ACT: close from another thread ---
    let started = Instant::now();
    listener.close();
    let took = started.elapsed();

    // --- 3. ASSERT: close was prompt ---
    assert!(
        took < Duration::from_secs(2),
        "close must not wait for a connection to arrive, took {took:?}"
    );

    // The parked accept holds the descriptor until its call returns; hand
    // it one connection so the thread can be joined.
    let _wake = std::net::TcpStream::connect(("127.0.0.1", port));
    let _ = acceptor.join().expect("acceptor should not panic");
}

#[test]
fn test_socket_accounting_and_activity_clock() {
    // --- 1. ARRANGE ---
    let ctx = RuntimeContext::new();
    assert_eq!(ctx.open_sockets().get(), 0);

    let listener = Listener::open(&ctx, "127.0.0.1", 0).expect("bind should succeed");
    let port = listener.local_addr().expect("bound").port();
    let client = DataSocket::connect(&ctx, "127.0.0.1", port).expect("connect should succeed");
    let server = listener.accept().expect("accept should succeed");
    assert_eq!(
        ctx.open_sockets().get(),
        3,
        "listener, client, and accepted socket are all open"
    );

    // --- 2. ACT: some traffic, then close everything ---
    thread::sleep(Duration::from_millis(150));
    let idle_before = ctx.activity().idle_for();
    assert!(idle_before >= Duration::from_millis(100));

    client.send(b"tick").expect("send should succeed");
    let mut buf = [0u8; 8];
    let n = server.recv(&mut buf).expect("recv should succeed");
    assert_eq!(&buf[..n], b"tick");

    // --- 3. ASSERT ---
    assert!(
        ctx.activity().idle_for() < idle_before,
        "a successful receive must stamp the activity clock"
    );

    drop(server);
    drop(client);
    drop(listener);
    assert_eq!(
        ctx.open_sockets().get(),
        0,
        "dropping sockets closes them and balances the counter"
    );
}
