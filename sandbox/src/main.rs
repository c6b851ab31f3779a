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

// Nema Runtime Sandbox
// Main binary for testing and demos: a loopback echo exchange driven
// entirely through waitable sockets, a background server thread, and the
// host-facing message queue.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use nema_sdk::prelude::*;

/// Accepts one connection and echoes everything it receives, posting each
/// chunk to the host queue, until the peer closes or quit is signaled.
fn serve_one(
    listener: &Listener,
    queue: &MessageQueue<String>,
    quit: &Event,
) -> Result<(), NetError> {
    let conn = loop {
        match listener.accept() {
            Ok(conn) => break conn,
            Err(NetError::WouldBlock) => match multi_wait(&[listener, quit], None) {
                MultiWaitStatus::Ready(0) => continue,
                _ => return Ok(()),
            },
            Err(e) => return Err(e),
        }
    };
    log::info!("Accepted connection from {}", conn.peer_addr()?);
    conn.set_non_blocking()?;

    let mut buf = [0u8; 1024];
    loop {
        match conn.recv(&mut buf) {
            Ok(0) => return Ok(()),
            Ok(n) => {
                queue.post(String::from_utf8_lossy(&buf[..n]).into_owned());
                let mut sent = 0;
                while sent < n {
                    match conn.send(&buf[sent..n]) {
                        Ok(written) => sent += written,
                        Err(NetError::WouldBlock) => {
                            conn.wait(None);
                        }
                        Err(e) => return Err(e),
                    }
                }
            }
            Err(NetError::WouldBlock) => match multi_wait(&[&conn, quit], None) {
                MultiWaitStatus::Ready(0) => continue,
                _ => return Ok(()),
            },
            Err(e) => return Err(e),
        }
    }
}

fn send_all(socket: &DataSocket, mut data: &[u8]) -> Result<()> {
    while !data.is_empty() {
        match socket.send(data) {
            Ok(n) => data = &data[n..],
            Err(NetError::WouldBlock) => {
                socket.wait(None);
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

fn recv_some(socket: &DataSocket, buf: &mut [u8]) -> Result<usize> {
    loop {
        match socket.recv(buf) {
            Ok(n) => return Ok(n),
            Err(NetError::WouldBlock) => {
                socket.wait(None);
            }
            Err(e) => return Err(e.into()),
        }
    }
}

fn main() -> Result<()> {
    use env_logger::{Builder, Env};

    Builder::from_env(Env::default().default_filter_or("info")).init();

    let runtime = Runtime::init(RuntimeConfig {
        watchdog: Some(WatchdogPolicy::default()),
        ..RuntimeConfig::default()
    })?;
    let ctx = runtime.ctx().clone();

    let policy = NetPolicy::localhost_only();
    log::info!(
        "Host identity under localhost-only policy: name={:?} ip={:?}",
        policy.host_name(),
        policy.host_ip()
    );

    // Echo server on an ephemeral loopback port, accepting via multi_wait
    // so a quit broadcast can release it at any point.
    let listener = Listener::open(&ctx, "127.0.0.1", 0)?;
    let port = listener.local_addr()?.port();
    listener.set_non_blocking()?;

    let events: Arc<MessageQueue<String>> = Arc::new(MessageQueue::new());
    let server = {
        let queue = Arc::clone(&events);
        let quit = Arc::clone(ctx.quit());
        Thread::launch(&ctx, "echo-server", move || {
            if let Err(e) = serve_one(&listener, &queue, &quit) {
                log::error!("Echo server failed: {e}");
            }
            queue.shutdown();
        })?
    };

    let socket = DataSocket::connect(&ctx, "127.0.0.1", port)?;
    socket.set_non_blocking()?;

    let lines = ["hello", "from", "the sandbox"];
    for line in lines {
        send_all(&socket, line.as_bytes())?;
        let mut buf = [0u8; 1024];
        let n = recv_some(&socket, &mut buf)?;
        log::info!("Echoed back: {:?}", String::from_utf8_lossy(&buf[..n]));
    }
    socket.close();

    // The server posts every chunk it echoes to the host queue; drain them
    // the way a session host would, with a bounded wait per event.
    let mut delivered = 0;
    while delivered < lines.len() {
        match events.wait(Some(Duration::from_secs(5))) {
            Ok(SessionEvent::Message(text)) => {
                log::info!("Queue delivered: {text:?}");
                delivered += 1;
            }
            Ok(SessionEvent::Timeout) => {
                log::warn!("Timed out draining the queue");
                break;
            }
            Ok(SessionEvent::DebugBreak) => {}
            Err(e) => {
                log::warn!("Queue closed early: {e}");
                break;
            }
        }
    }

    server.wait(Some(Duration::from_secs(5)));
    runtime.shutdown();
    Ok(())
}
