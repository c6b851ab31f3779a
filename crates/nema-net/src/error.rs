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

//! Error types for the networking layer.

use std::io;
use thiserror::Error;

/// Errors reported by sockets, listeners, and the message queue.
///
/// [`WouldBlock`](NetError::WouldBlock) is not a failure: it is the signal
/// that the caller should wait on the socket's readiness and retry.
/// Connection reset and abort are recoverable per-connection conditions a
/// server loop handles by dropping that one connection.
#[derive(Debug, Error)]
pub enum NetError {
    /// The operation cannot make progress right now; wait for readiness
    /// and retry.
    #[error("Operation would block; wait for socket readiness and retry")]
    WouldBlock,
    /// The peer reset the connection.
    #[error("Connection reset by peer")]
    ConnectionReset,
    /// The connection was aborted before it could be used.
    #[error("Connection aborted")]
    ConnectionAborted,
    /// The socket has already been closed on this side.
    #[error("Socket is closed")]
    Closed,
    /// The message queue was shut down while a caller was waiting on it.
    /// This is the description hosts surface to their own error channel.
    #[error("Message queue terminated while waiting for a network event")]
    QueueTerminated,
    /// Any other I/O failure.
    #[error("Network I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Coarse classification of a [`NetError`], suitable for storing as a
/// socket's sticky last-error value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// See [`NetError::WouldBlock`].
    WouldBlock,
    /// See [`NetError::ConnectionReset`].
    ConnectionReset,
    /// See [`NetError::ConnectionAborted`].
    ConnectionAborted,
    /// See [`NetError::Closed`].
    Closed,
    /// See [`NetError::QueueTerminated`].
    QueueTerminated,
    /// Any other I/O failure.
    Other,
}

impl NetError {
    /// Maps an OS error to the matching variant.
    pub fn from_io(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::WouldBlock => NetError::WouldBlock,
            io::ErrorKind::ConnectionReset => NetError::ConnectionReset,
            io::ErrorKind::ConnectionAborted => NetError::ConnectionAborted,
            _ => NetError::Io(e),
        }
    }

    /// The coarse class of this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            NetError::WouldBlock => ErrorClass::WouldBlock,
            NetError::ConnectionReset => ErrorClass::ConnectionReset,
            NetError::ConnectionAborted => ErrorClass::ConnectionAborted,
            NetError::Closed => ErrorClass::Closed,
            NetError::QueueTerminated => ErrorClass::QueueTerminated,
            NetError::Io(_) => ErrorClass::Other,
        }
    }

    /// True for the retry-after-readiness condition.
    pub fn is_would_block(&self) -> bool {
        matches!(self, NetError::WouldBlock)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_kinds_map_to_distinguished_variants() {
        let reset = NetError::from_io(io::Error::from(io::ErrorKind::ConnectionReset));
        assert!(matches!(reset, NetError::ConnectionReset));

        let aborted = NetError::from_io(io::Error::from(io::ErrorKind::ConnectionAborted));
        assert!(matches!(aborted, NetError::ConnectionAborted));

        let wb = NetError::from_io(io::Error::from(io::ErrorKind::WouldBlock));
        assert!(wb.is_would_block());

        let other = NetError::from_io(io::Error::other("boom"));
        assert!(matches!(other, NetError::Io(_)));
        assert_eq!(other.class(), ErrorClass::Other);
    }

    #[test]
    fn display_messages_are_human_readable() {
        assert_eq!(
            NetError::QueueTerminated.to_string(),
            "Message queue terminated while waiting for a network event"
        );
        assert!(NetError::WouldBlock.to_string().contains("retry"));
    }
}
