//! Peer Connections
//!
//! A validated client stream split into a buffered read half and a write
//! half, plus the peek-only liveness check used while it waits in the queue.

use std::fmt;
use std::net::SocketAddr;

use futures_util::FutureExt;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, ReadHalf, WriteHalf};

use crate::network::protocol::{read_frame, write_frame, Message, ProtocolError};

/// Any bidirectional byte stream a peer can arrive on (TLS or plain TCP).
pub trait PeerStream: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

impl<T> PeerStream for T where T: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

/// Type-erased peer stream.
pub type BoxedStream = Box<dyn PeerStream>;

/// Buffered read half of a peer stream.
pub type PeerReader = BufReader<ReadHalf<BoxedStream>>;

/// Write half of a peer stream.
pub type PeerWriter = WriteHalf<BoxedStream>;

/// Result of a liveness check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    /// Nothing says the peer is gone.
    Alive,
    /// End-of-stream or a transport error was observed.
    Closed,
}

/// Non-blocking, non-consuming liveness check.
pub trait LivenessCheck {
    /// Check the peer without waiting and without consuming buffered data.
    fn check_liveness(&mut self) -> Liveness;
}

/// A connected, version-checked peer.
pub struct PeerConnection {
    id: u64,
    addr: SocketAddr,
    version: Option<String>,
    reader: PeerReader,
    writer: PeerWriter,
}

impl PeerConnection {
    /// Wrap a freshly accepted stream.
    pub fn new(id: u64, addr: SocketAddr, stream: BoxedStream) -> Self {
        let (read_half, writer) = tokio::io::split(stream);
        Self {
            id,
            addr,
            version: None,
            reader: BufReader::new(read_half),
            writer,
        }
    }

    /// Connection id, unique for the lifetime of the server.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Remote address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Protocol version advertised at handshake.
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Record the advertised version.
    pub fn set_version(&mut self, version: impl Into<String>) {
        self.version = Some(version.into());
    }

    /// Read the next frame.
    pub async fn read_message(&mut self) -> Result<Option<Message>, ProtocolError> {
        read_frame(&mut self.reader).await
    }

    /// Write one frame.
    pub async fn send(&mut self, message: &Message) -> Result<(), ProtocolError> {
        write_frame(&mut self.writer, message).await
    }

    /// Shut down the write side. Errors are irrelevant at this point.
    pub async fn close(mut self) {
        let _ = self.writer.shutdown().await;
    }

    /// Split into the halves owned by the worker and the writer task.
    pub fn into_parts(self) -> (PeerReader, PeerWriter) {
        (self.reader, self.writer)
    }
}

impl LivenessCheck for PeerConnection {
    fn check_liveness(&mut self) -> Liveness {
        // Poll the buffer once; any bytes read stay buffered for the worker.
        match self.reader.fill_buf().now_or_never() {
            None => Liveness::Alive,
            Some(Ok(buf)) if buf.is_empty() => Liveness::Closed,
            Some(Ok(_)) => Liveness::Alive,
            Some(Err(_)) => Liveness::Closed,
        }
    }
}

impl fmt::Debug for PeerConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeerConnection")
            .field("id", &self.id)
            .field("addr", &self.addr)
            .field("version", &self.version)
            .finish()
    }
}
