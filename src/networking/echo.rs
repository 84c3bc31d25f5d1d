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

//! A concrete, minimal two-way echo used to satisfy [`super::prober::EchoClient`].
//!
//! The wire protocol here is intentionally trivial and out of this crate's
//! spec scope beyond "black-box RTT provider" (`spec.md` §6.2): an 8-byte
//! correlation nonce is sent, the responder bounces the same bytes back
//! unmodified, and wall-clock RTT is measured on the matching reply.
//! Mismatched or late nonces are discarded rather than misattributed.

use crate::networking::prober::EchoClient;
use async_trait::async_trait;
use ring::rand::{SecureRandom, SystemRandom};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tracing::debug;

use crate::core::types::PeerAddress;

/// Echo client backed by a single shared UDP socket.
pub struct UdpEchoClient {
    sock: Arc<UdpSocket>,
}

impl UdpEchoClient {
    /// Wrap an already-bound socket. The same socket may also be driven by
    /// [`run_echo_responder`] for inbound pings from other nodes.
    pub fn new(sock: Arc<UdpSocket>) -> Self {
        Self { sock }
    }
}

#[async_trait]
impl EchoClient for UdpEchoClient {
    async fn probe(&self, peer: PeerAddress, timeout: Duration) -> Option<u64> {
        let mut nonce = [0u8; 8];
        SystemRandom::new().fill(&mut nonce).ok()?;

        let sent_at = Instant::now();
        self.sock.send_to(&nonce, peer.to_socket_addr()).await.ok()?;

        let deadline = sent_at + timeout;
        loop {
            let remaining = deadline.checked_duration_since(Instant::now())?;
            let mut buf = [0u8; 8];
            let (n, from) =
                tokio::time::timeout(remaining, self.sock.recv_from(&mut buf))
                    .await
                    .ok()?
                    .ok()?;
            if n == 8 && buf == nonce && from == peer.to_socket_addr() {
                return Some(sent_at.elapsed().as_nanos() as u64);
            }
            debug!(%peer, "discarding mismatched or late echo reply");
        }
    }
}

/// Bounce every inbound 8-byte datagram back to its sender unmodified.
/// Runs until the socket errors out; intended to share a socket with
/// [`UdpEchoClient`] so a node can serve probes from peers while also
/// probing them.
pub async fn run_echo_responder(sock: Arc<UdpSocket>) {
    let mut buf = [0u8; 8];
    loop {
        let (n, from): (usize, SocketAddr) = match sock.recv_from(&mut buf).await {
            Ok(v) => v,
            Err(_) => return,
        };
        if n != 8 {
            continue;
        }
        let _ = sock.send_to(&buf[..n], from).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn probe_measures_rtt_against_a_live_responder() {
        let responder_sock = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
        let responder_addr = responder_sock.local_addr().unwrap();
        tokio::spawn(run_echo_responder(responder_sock));

        let client_sock = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
        let client = UdpEchoClient::new(client_sock);

        let peer = PeerAddress::new(
            match responder_addr.ip() {
                std::net::IpAddr::V4(v4) => v4,
                _ => unreachable!(),
            },
            responder_addr.port(),
        )
        .unwrap();

        let rtt = client.probe(peer, Duration::from_secs(1)).await;
        assert!(rtt.is_some());
    }

    #[tokio::test]
    async fn probe_times_out_with_no_responder() {
        let client_sock = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
        let client = UdpEchoClient::new(client_sock);

        // Nothing listens on this ephemeral port once bound-and-dropped.
        let scratch = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let dead_addr = scratch.local_addr().unwrap();
        drop(scratch);

        let peer = PeerAddress::new(
            match dead_addr.ip() {
                std::net::IpAddr::V4(v4) => v4,
                _ => unreachable!(),
            },
            dead_addr.port(),
        )
        .unwrap();

        let rtt = client.probe(peer, Duration::from_millis(200)).await;
        assert!(rtt.is_none());
    }
}
