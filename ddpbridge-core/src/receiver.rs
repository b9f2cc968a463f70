//! UDP listener feeding the ingress queue

use crate::constants::{
    ERROR_BACKOFF, MAX_DATAGRAM_SIZE, PREVIEW_BYTES, PREVIEW_PACKETS, RECEIVE_LOG_EVERY,
    RECV_TIMEOUT,
};
use crate::error::BridgeError;
use crate::packet::{self, hex_preview};
use crate::queue::IngressQueue;
use crate::telemetry::{Severity, Telemetry};
use bytes::Bytes;
use std::io::ErrorKind;
use std::net::{Ipv4Addr, SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

#[cfg(feature = "logging")]
use tracing::debug;

/// A datagram as captured off the socket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDatagram {
    /// Datagram bytes
    pub payload: Bytes,

    /// Sender address
    pub source: SocketAddr,

    /// Capture time
    pub received_at: Instant,
}

impl RawDatagram {
    /// Capture `payload` from `source` now
    pub fn new(payload: impl Into<Bytes>, source: SocketAddr) -> Self {
        Self {
            payload: payload.into(),
            source,
            received_at: Instant::now(),
        }
    }
}

/// Bind a UDP socket on every interface with the receive timeout applied
pub fn bind(port: u16) -> Result<UdpSocket, BridgeError> {
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    let socket = UdpSocket::bind(addr).map_err(|source| BridgeError::Bind { addr, source })?;
    socket.set_read_timeout(Some(RECV_TIMEOUT))?;
    Ok(socket)
}

fn is_timeout(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
    )
}

/// Owns the socket and pushes every datagram into the queue
pub struct NetworkReceiver {
    socket: UdpSocket,
    queue: Arc<IngressQueue<RawDatagram>>,
    telemetry: Arc<Telemetry>,
    received: u64,
}

impl NetworkReceiver {
    /// Receiver over an already-bound socket
    pub fn new(
        socket: UdpSocket,
        queue: Arc<IngressQueue<RawDatagram>>,
        telemetry: Arc<Telemetry>,
    ) -> Self {
        Self {
            socket,
            queue,
            telemetry,
            received: 0,
        }
    }

    /// Local address the socket is bound to
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Run until `shutdown` is set
    ///
    /// Receive timeouts loop silently so the flag is checked every
    /// [`RECV_TIMEOUT`]; other socket errors are logged and backed off.
    pub fn run(&mut self, shutdown: &AtomicBool) {
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];

        while !shutdown.load(Ordering::Relaxed) {
            match self.socket.recv_from(&mut buf) {
                Ok((len, source)) => {
                    let payload = Bytes::copy_from_slice(&buf[..len]);
                    self.accept(RawDatagram::new(payload, source));
                }
                Err(e) if is_timeout(&e) => {}
                Err(e) => {
                    self.telemetry
                        .log(Severity::Error, format!("[ERROR] UDP RX: {}", e));
                    thread::sleep(ERROR_BACKOFF);
                }
            }
        }

        #[cfg(feature = "logging")]
        debug!("Network receiver stopped after {} datagrams", self.received);
    }

    /// Count, log and enqueue one datagram
    pub fn accept(&mut self, datagram: RawDatagram) {
        let len = datagram.payload.len();

        if self.received % RECEIVE_LOG_EVERY == 0 {
            self.telemetry.log(
                Severity::Quiet,
                format!("[UDP] Received {} bytes from {}", len, datagram.source),
            );
        }

        if self.received < PREVIEW_PACKETS {
            self.telemetry.log(
                Severity::Info,
                format!(
                    "[DDP] Packet #{} RAW: {}",
                    self.received + 1,
                    hex_preview(&datagram.payload, PREVIEW_BYTES)
                ),
            );
            if let Ok(parsed) = packet::parse(&datagram.payload) {
                self.telemetry
                    .log(Severity::Info, format!("[DDP] Parsed: {}", parsed.summary()));
            }
        }

        self.received += 1;
        self.telemetry.record_datagram(len);

        if self.queue.push(datagram).is_some() {
            self.telemetry.record_dropped();
        }
    }
}
