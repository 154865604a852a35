//! Connection Handshake
//!
//! Transport (TLS) handshake followed by the protocol version check. A peer
//! that fails either never reaches the matchmaking queue.

use std::io;
use std::net::SocketAddr;

use crate::network::connection::{PeerConnection, PeerStream};
use crate::network::protocol::{Message, MessageType, ProtocolError};
use crate::network::tls::Transport;

/// Reasons a connection is not admitted to the queue.
#[derive(Debug, thiserror::Error)]
pub enum HandshakeError {
    /// TLS negotiation failed.
    #[error("TLS handshake failed: {0}")]
    Tls(io::Error),

    /// First frame could not be read or the reply could not be sent.
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Peer left before announcing a version.
    #[error("Connection closed before version check")]
    ClosedBeforeCheck,

    /// Peer announced a different version, or something else entirely.
    #[error("Version mismatch (offered {offered:?})")]
    VersionMismatch {
        /// What the peer announced, if anything.
        offered: Option<String>,
    },
}

/// Bring an accepted socket up to a validated [`PeerConnection`].
///
/// On a version mismatch the peer is told `INVALID` and the connection is
/// closed before returning.
pub async fn handshake<S: PeerStream>(
    transport: &Transport,
    stream: S,
    addr: SocketAddr,
    id: u64,
    version: &str,
) -> Result<PeerConnection, HandshakeError> {
    let stream = transport.accept(stream).await.map_err(HandshakeError::Tls)?;
    let mut conn = PeerConnection::new(id, addr, stream);

    let first = conn
        .read_message()
        .await?
        .ok_or(HandshakeError::ClosedBeforeCheck)?;

    let offered = match first.kind {
        MessageType::VersionCheck => first.version,
        _ => None,
    };

    if offered.as_deref() != Some(version) {
        // The peer is going away either way; a failed reply changes nothing.
        let _ = conn.send(&Message::version_result(false)).await;
        conn.close().await;
        return Err(HandshakeError::VersionMismatch { offered });
    }

    conn.send(&Message::version_result(true)).await?;
    conn.set_version(version);
    Ok(conn)
}
