//! ==============================================================================
//! heartbeat.rs - liveness pings, controller -> agent
//! ==============================================================================
//!
//! purpose:
//!     the controller proves it is alive by sending the token `ping` to the
//!     agent's heartbeat port on a fixed cadence. the agent records the arrival
//!     time of each valid ping in `Liveness`, which the watchdog reads.
//!
//! rules:
//!     - a datagram is a valid ping iff its trimmed text equals "ping",
//!       ignoring case.
//!     - anything else is ignored silently and never touches the timestamp.
//!     - this channel is independent of the data channel; losing snapshots
//!       never affects liveness.
//!
//! relationships:
//!     - HeartbeatReceiver: agent side, writes Liveness
//!     - HeartbeatSender: controller side
//!     - read by: watchdog.rs
//!
//! ==============================================================================

use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::time::Instant;

pub const PING: &str = "ping";

/// Whether a heartbeat payload is a valid ping.
pub fn is_ping(payload: &[u8]) -> bool {
    std::str::from_utf8(payload)
        .map(|text| text.trim().eq_ignore_ascii_case(PING))
        .unwrap_or(false)
}

// ==============================================================================
// liveness - the one value shared between agent activities
// ==============================================================================
// single writer (receiver), single reader (watchdog). stored as milliseconds
// since a monotonic origin, so a plain atomic overwrite is enough. a stale
// read only delays detection by one check interval.

#[derive(Debug)]
pub struct Liveness {
    origin: Instant,
    last_beat_ms: AtomicU64,
}

impl Liveness {
    /// The origin counts as the first heartbeat.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            last_beat_ms: AtomicU64::new(0),
        }
    }

    pub fn beat(&self) {
        let now = self.origin.elapsed().as_millis() as u64;
        self.last_beat_ms.store(now, Ordering::Relaxed);
    }

    pub fn last_beat(&self) -> Instant {
        self.origin + Duration::from_millis(self.last_beat_ms.load(Ordering::Relaxed))
    }

    /// Time since the last valid heartbeat.
    pub fn silence(&self) -> Duration {
        Instant::now().saturating_duration_since(self.last_beat())
    }
}

impl Default for Liveness {
    fn default() -> Self {
        Self::new()
    }
}

// ==============================================================================
// receiver (agent side)
// ==============================================================================

pub struct HeartbeatReceiver {
    socket: UdpSocket,
    liveness: Arc<Liveness>,
}

impl HeartbeatReceiver {
    pub async fn bind(addr: SocketAddr, liveness: Arc<Liveness>) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        Ok(Self { socket, liveness })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Block on the heartbeat port for the rest of the process lifetime.
    pub async fn run(self) {
        let mut buf = [0u8; 512];
        loop {
            match self.socket.recv_from(&mut buf).await {
                Ok((n, _)) if is_ping(&buf[..n]) => self.liveness.beat(),
                Ok((n, from)) => {
                    tracing::debug!(%from, bytes = n, "Ignoring non-ping heartbeat payload");
                }
                // windows reports icmp port-unreachable from earlier sends here
                Err(e) => tracing::debug!(error = %e, "Heartbeat receive error"),
            }
        }
    }
}

// ==============================================================================
// sender (controller side)
// ==============================================================================

pub struct HeartbeatSender {
    socket: UdpSocket,
    target: SocketAddr,
    interval: Duration,
}

impl HeartbeatSender {
    pub async fn bind(target: SocketAddr, interval: Duration) -> io::Result<Self> {
        let socket = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).await?;
        Ok(Self { socket, target, interval })
    }

    pub async fn ping(&self) -> io::Result<()> {
        self.socket.send_to(PING.as_bytes(), self.target).await.map(|_| ())
    }

    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            ticker.tick().await;
            if let Err(e) = self.ping().await {
                tracing::debug!(error = %e, target = %self.target, "Heartbeat send failed");
            }
        }
    }
}
