//! Network Layer
//!
//! TLS transport, framing, matchmaking and session plumbing.
//! Game rules live in `game/`; this layer only moves frames and enforces
//! who may talk to whom.

pub mod admission;
pub mod connection;
pub mod handshake;
pub mod matchmaking;
pub mod protocol;
pub mod server;
pub mod session;
pub mod tls;
pub mod worker;

pub use admission::{AdmissionController, AdmissionSlot};
pub use connection::{Liveness, PeerConnection, LivenessCheck};
pub use handshake::HandshakeError;
pub use matchmaking::MatchmakingQueue;
pub use protocol::{read_frame, write_frame, Message, MessageType, PlayerType, ProtocolError};
pub use server::{GameServer, GameServerError};
pub use session::{GameSession, SessionId, SessionManager};
pub use tls::{TlsConfigError, Transport};
