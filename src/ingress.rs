//! ==============================================================================
//! ingress.rs - consumer-side decode / republish
//! ==============================================================================
//!
//! purpose:
//!     turns inbound snapshot text into published snapshots and keeps the
//!     connection state honest.
//!
//! per arrival:
//!     1. parse against the wire schema
//!     2. failure: log, drop, leave ConnectionState alone
//!     3. success: broadcast the raw text, call every consumer, then mark
//!        the connection live
//!
//! relationships:
//!     - DataListener: the udp transport feeding `handle` (port A)
//!     - writes: connection.rs (ConnectionState)
//!     - calls: consumers.rs (SnapshotConsumer)
//!
//! ==============================================================================

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::UdpSocket;
use tokio::sync::broadcast;

use crate::codec::{self, CodecError};
use crate::connection::ConnectionState;
use crate::consumers::SnapshotConsumer;

const RAW_CHANNEL_CAPACITY: usize = 16;

pub struct ConsumerIngress {
    state: Arc<ConnectionState>,
    consumers: Vec<Arc<dyn SnapshotConsumer>>,
    raw: broadcast::Sender<Arc<str>>,
}

impl ConsumerIngress {
    pub fn new(state: Arc<ConnectionState>) -> Self {
        let (raw, _) = broadcast::channel(RAW_CHANNEL_CAPACITY);
        Self { state, consumers: Vec::new(), raw }
    }

    pub fn with_consumer(mut self, consumer: Arc<dyn SnapshotConsumer>) -> Self {
        self.consumers.push(consumer);
        self
    }

    pub fn state(&self) -> &Arc<ConnectionState> {
        &self.state
    }

    /// Raw snapshot text, one message per parsed snapshot.
    /// Subscribers parse it themselves.
    pub fn subscribe_raw(&self) -> broadcast::Receiver<Arc<str>> {
        self.raw.subscribe()
    }

    /// Handle one inbound payload. Returns the number of nodes published.
    pub fn handle(&self, payload: &str) -> Result<usize, CodecError> {
        let snapshot = match codec::decode(payload) {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(error = %e, bytes = payload.len(), "Failed to parse snapshot payload");
                return Err(e);
            }
        };

        // no subscribers is fine
        let _ = self.raw.send(Arc::from(payload));
        for consumer in &self.consumers {
            consumer.consume(&snapshot);
        }
        self.state.mark_received();

        Ok(snapshot.nodes.len())
    }
}

// ==============================================================================
// data listener - udp transport into the ingress
// ==============================================================================

pub struct DataListener {
    socket: UdpSocket,
}

impl DataListener {
    pub async fn bind(addr: SocketAddr) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        Ok(Self { socket })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub async fn run(self, ingress: Arc<ConsumerIngress>) {
        let mut buf = vec![0u8; 65_535];
        loop {
            let n = match self.socket.recv_from(&mut buf).await {
                Ok((n, _)) => n,
                Err(e) => {
                    tracing::debug!(error = %e, "Data receive error");
                    continue;
                }
            };
            match std::str::from_utf8(&buf[..n]) {
                Ok(text) => {
                    let _ = ingress.handle(text);
                }
                Err(_) => tracing::debug!(bytes = n, "Dropping non-utf8 datagram"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consumers::LatestSnapshot;
    use std::time::Duration;
    use tokio::time::Instant;

    const ONE_NODE: &str = r#"[{"Id":"/cpu/0","Name":"CPU","Type":"Cpu","Sensors":[{"Id":"/cpu/0/load/0","Name":"CPU Total","Type":"Load","Value":7.25}]}]"#;

    #[tokio::test(start_paused = true)]
    async fn test_success_publishes_then_connects() {
        let state = Arc::new(ConnectionState::new());
        let latest = Arc::new(LatestSnapshot::new());
        let ingress = ConsumerIngress::new(state.clone()).with_consumer(latest.clone());
        let mut raw = ingress.subscribe_raw();

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(ingress.handle(ONE_NODE).unwrap(), 1);

        assert!(state.is_connected());
        assert_eq!(state.last_update_at(), Instant::now());
        assert_eq!(latest.value_of("/cpu/0", "/cpu/0/load/0"), Some(7.25));
        assert_eq!(&*raw.recv().await.unwrap(), ONE_NODE);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_leaves_state_untouched() {
        let state = Arc::new(ConnectionState::new());
        let latest = Arc::new(LatestSnapshot::new());
        let ingress = ConsumerIngress::new(state.clone()).with_consumer(latest.clone());
        let mut raw = ingress.subscribe_raw();
        let before = state.status();

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(ingress.handle("not json").is_err());
        assert!(ingress.handle(r#"{"Id":"x"}"#).is_err());

        assert_eq!(state.status(), before);
        assert!(latest.get().is_none());
        assert!(raw.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_bad_payload_after_good_keeps_connection() {
        let state = Arc::new(ConnectionState::new());
        let ingress = ConsumerIngress::new(state.clone());

        ingress.handle("[]").unwrap();
        let at = state.last_update_at();
        tokio::time::sleep(Duration::from_secs(2)).await;
        let _ = ingress.handle("[");

        assert!(state.is_connected());
        assert_eq!(state.last_update_at(), at);
    }

    #[tokio::test]
    async fn test_listener_feeds_ingress() {
        let state = Arc::new(ConnectionState::new());
        let ingress = Arc::new(ConsumerIngress::new(state.clone()));
        let mut raw = ingress.subscribe_raw();

        let listener = DataListener::bind((std::net::Ipv4Addr::LOCALHOST, 0).into()).await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(listener.run(ingress));

        let client = UdpSocket::bind((std::net::Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        client.send_to(&[0xff, 0xfe], addr).await.unwrap();
        client.send_to(b"garbage", addr).await.unwrap();
        client.send_to(ONE_NODE.as_bytes(), addr).await.unwrap();

        let text = tokio::time::timeout(Duration::from_secs(2), raw.recv()).await.unwrap().unwrap();
        assert_eq!(&*text, ONE_NODE);
        assert!(state.is_connected());
    }
}
