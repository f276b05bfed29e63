//! Best-effort snapshot sender.
//!
//! One encoded snapshot goes out as exactly one connectionless datagram.
//! Whether anyone is listening is not this module's concern: `send` hands
//! back a result the sampling loop is free to drop. There is no framing and
//! no chunking, so a snapshot too large for one datagram is not sent at all.

use std::io;
use std::net::{Ipv4Addr, SocketAddr};

use tokio::net::UdpSocket;

use crate::codec::{self, CodecError};
use crate::domain::Snapshot;

/// Largest UDP payload over IPv4: 65535 - 8 (udp header) - 20 (ip header).
pub const MAX_DATAGRAM_LEN: usize = 65_507;

#[derive(Debug, thiserror::Error)]
pub enum TransmitError {
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("encoded snapshot is {len} bytes, datagram limit is {max}")]
    Oversize { len: usize, max: usize },

    #[error("send failed: {0}")]
    Io(#[from] io::Error),
}

pub struct Transmitter {
    socket: UdpSocket,
    target: SocketAddr,
}

impl Transmitter {
    /// Bind an ephemeral loopback port for sending to `target`.
    pub async fn bind(target: SocketAddr) -> io::Result<Self> {
        let socket = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).await?;
        Ok(Self { socket, target })
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }

    /// Encode and send one snapshot. Nothing is sent if encoding fails or
    /// the encoding does not fit a single datagram.
    pub async fn send(&self, snapshot: &Snapshot) -> Result<usize, TransmitError> {
        let payload = codec::encode(snapshot)?;
        if payload.len() > MAX_DATAGRAM_LEN {
            return Err(TransmitError::Oversize { len: payload.len(), max: MAX_DATAGRAM_LEN });
        }
        let sent = self.socket.send_to(payload.as_bytes(), self.target).await?;
        Ok(sent)
    }
}
