// Copyright (c) 2026 Gvp
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! UDP datagram transport: one `LocationOffset` per datagram, IPv4 only,
//! no reassembly, no retries (`spec.md` §4.3/§6.1).

use crate::core::codec::{self, CodecError};
use crate::core::types::{LocationOffset, MAX_DATAGRAM_BYTES};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use tokio::net::UdpSocket;

/// Transport-level send errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Serialized offset exceeds [`MAX_DATAGRAM_BYTES`]; nothing was sent.
    #[error("offset too large ({0} bytes)")]
    OffsetTooLarge(usize),
    /// The datagram write did not cover the whole buffer.
    #[error("short write")]
    ShortWrite,
    /// Underlying OS/network error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Receive-side errors.
#[derive(Debug, Error)]
pub enum RecvError {
    /// No datagram arrived before the caller's deadline.
    #[error("receive timed out")]
    TimedOut,
    /// The datagram failed to decode as a `LocationOffset`.
    #[error("decode error: {0}")]
    Decode(#[from] CodecError),
    /// Underlying OS/network error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Bind a UDP socket on all interfaces for receiving offsets.
pub async fn open_listener(port: u16) -> std::io::Result<UdpSocket> {
    UdpSocket::bind(("0.0.0.0", port)).await
}

/// Bind an ephemeral UDP socket for sending to arbitrary peers.
pub async fn open_sender() -> std::io::Result<UdpSocket> {
    UdpSocket::bind(("0.0.0.0", 0)).await
}

/// Serialize and send a single offset as one datagram.
///
/// Refuses to send (no bytes written) if the serialized form exceeds
/// [`MAX_DATAGRAM_BYTES`]. A short write is treated as fatal for this send.
pub async fn send(
    sock: &UdpSocket,
    peer: SocketAddr,
    offset: &LocationOffset,
) -> Result<(), TransportError> {
    let bytes = codec::encode(offset);
    if bytes.len() > MAX_DATAGRAM_BYTES {
        return Err(TransportError::OffsetTooLarge(bytes.len()));
    }
    let n = sock.send_to(&bytes, peer).await?;
    if n != bytes.len() {
        return Err(TransportError::ShortWrite);
    }
    Ok(())
}

/// Receive and decode one datagram, bounded by `deadline`.
///
/// A timeout is distinguished from a decode/IO error so the Receiver Loop
/// can re-check cancellation without treating it as a transport fault.
pub async fn recv(
    sock: &UdpSocket,
    deadline: Duration,
) -> Result<(LocationOffset, SocketAddr), RecvError> {
    let mut buf = [0u8; MAX_DATAGRAM_BYTES];
    let (n, sender) = tokio::time::timeout(deadline, sock.recv_from(&mut buf))
        .await
        .map_err(|_| RecvError::TimedOut)??;
    let (offset, _consumed) = codec::decode(&buf[..n])?;
    Ok((offset, sender))
}
