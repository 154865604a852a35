//! Protocol Messages
//!
//! Wire format for client-server communication over TLS.
//!
//! Every frame is a 4-byte big-endian length followed by that many bytes of
//! UTF-8 JSON encoding one [`Message`]. Both directions share the same
//! message shape; the `type` field says which fields are meaningful.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::game::board::{Shape, CELL_COUNT};
use crate::game::state::Player;

/// Largest accepted frame body in bytes.
pub const MAX_FRAME_LEN: usize = 16 * 1024;

/// Length prefix size in bytes.
pub const LEN_PREFIX: usize = 4;

/// `VERSION_CHECK` content for an accepted client.
pub const VERSION_VALID: &str = "VALID";

/// `VERSION_CHECK` content for a rejected client.
pub const VERSION_INVALID: &str = "INVALID";

/// Notice sent to the survivor when the opponent drops.
pub const OPPONENT_DISCONNECTED: &str = "Opponent has disconnected";

/// Notice sent to every player on graceful shutdown.
pub const SERVER_SHUTTING_DOWN: &str = "Server shutting down";

// =============================================================================
// ERRORS
// =============================================================================

/// Framing and serialization errors.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Transport failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Body was not a valid message.
    #[error("Invalid message: {0}")]
    Json(#[from] serde_json::Error),

    /// Length prefix of zero.
    #[error("Empty frame")]
    EmptyFrame,

    /// Length prefix above [`MAX_FRAME_LEN`].
    #[error("Frame too large: {0} bytes")]
    FrameTooLarge(usize),

    /// Stream or buffer ended inside a frame.
    #[error("Truncated frame")]
    Truncated,

    /// Bytes left over after a complete frame.
    #[error("{0} trailing bytes after frame")]
    TrailingBytes(usize),
}

// =============================================================================
// MESSAGE SCHEMA
// =============================================================================

/// Message kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    /// Client version announcement and the server's verdict.
    VersionCheck,
    /// Player was paired into a session.
    Start,
    /// Move request (client) or applied move (server).
    Move,
    /// Client wants a rematch.
    ResetRequest,
    /// A fresh round started.
    ResetConfirmation,
    /// Relayed chat line.
    Chat,
    /// Server notice shown to the player.
    #[serde(rename = "MESSAGE")]
    Notice,
    /// Opponent asked for a rematch.
    PlayAgain,
    /// Any kind this build does not know.
    #[serde(other)]
    Unknown,
}

/// Seat as it appears on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerType {
    /// First paired player.
    #[serde(rename = "PLAYER_1")]
    Player1,
    /// Second paired player.
    #[serde(rename = "PLAYER_2")]
    Player2,
    /// No turn owner (game over).
    #[serde(rename = "UNKNOWN_PLAYER")]
    Unknown,
}

impl From<Option<Player>> for PlayerType {
    fn from(player: Option<Player>) -> Self {
        match player {
            Some(Player::One) => PlayerType::Player1,
            Some(Player::Two) => PlayerType::Player2,
            None => PlayerType::Unknown,
        }
    }
}

impl From<Player> for PlayerType {
    fn from(player: Player) -> Self {
        Some(player).into()
    }
}

impl PlayerType {
    /// Seat, or `None` for [`PlayerType::Unknown`].
    pub fn seat(self) -> Option<Player> {
        match self {
            PlayerType::Player1 => Some(Player::One),
            PlayerType::Player2 => Some(Player::Two),
            PlayerType::Unknown => None,
        }
    }
}

/// One protocol frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Message kind.
    #[serde(rename = "type")]
    pub kind: MessageType,

    /// Free-form payload: cell index, chat text, session id, verdict.
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    /// Protocol version (handshake only).
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Seat of the recipient (`START`) or new turn owner (`MOVE`).
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub player: Option<PlayerType>,

    /// Shape of the mover (`MOVE`) or recipient (`RESET_CONFIRMATION`).
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub player_shape: Option<Shape>,

    /// Whether the recipient may move next.
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub is_your_turn: Option<bool>,

    /// Board evaluation code after a move.
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub win_type: Option<u8>,
}

/// Decode an optional field, treating a value this build cannot represent
/// (unknown variant, out-of-range number, wrong JSON type) as unset.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(T::deserialize(value).ok())
}

impl Message {
    /// Bare message of the given kind.
    pub fn new(kind: MessageType) -> Self {
        Self {
            kind,
            content: None,
            version: None,
            player: None,
            player_shape: None,
            is_your_turn: None,
            win_type: None,
        }
    }

    fn with_content(kind: MessageType, content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::new(kind)
        }
    }

    // =========================================================================
    // CONSTRUCTORS
    // =========================================================================

    /// Client handshake.
    pub fn version_check(version: impl Into<String>) -> Self {
        Self {
            version: Some(version.into()),
            ..Self::new(MessageType::VersionCheck)
        }
    }

    /// Server verdict on a handshake.
    pub fn version_result(valid: bool) -> Self {
        let verdict = if valid { VERSION_VALID } else { VERSION_INVALID };
        Self::with_content(MessageType::VersionCheck, verdict)
    }

    /// Pairing notification carrying the recipient's seat and session id.
    pub fn start(player: Player, session_id: &str) -> Self {
        Self {
            player: Some(player.into()),
            ..Self::with_content(MessageType::Start, session_id)
        }
    }

    /// Client move request.
    pub fn move_request(cell: usize) -> Self {
        Self::with_content(MessageType::Move, cell.to_string())
    }

    /// Applied move, as broadcast to one recipient.
    pub fn move_update(
        cell: usize,
        shape: Shape,
        next_turn: Option<Player>,
        win_type: u8,
        is_your_turn: bool,
    ) -> Self {
        Self {
            player: Some(next_turn.into()),
            player_shape: Some(shape),
            is_your_turn: Some(is_your_turn),
            win_type: Some(win_type),
            ..Self::with_content(MessageType::Move, cell.to_string())
        }
    }

    /// Client rematch request.
    pub fn reset_request() -> Self {
        Self::new(MessageType::ResetRequest)
    }

    /// New round, as seen by one recipient.
    pub fn reset_confirmation(shape: Shape, is_your_turn: bool) -> Self {
        Self {
            player_shape: Some(shape),
            is_your_turn: Some(is_your_turn),
            ..Self::new(MessageType::ResetConfirmation)
        }
    }

    /// Chat line.
    pub fn chat(text: impl Into<String>) -> Self {
        Self::with_content(MessageType::Chat, text)
    }

    /// Server notice.
    pub fn notice(text: impl Into<String>) -> Self {
        Self::with_content(MessageType::Notice, text)
    }

    /// Opponent rematch notification.
    pub fn play_again() -> Self {
        Self::new(MessageType::PlayAgain)
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    /// `content` parsed as a board cell, if it is one.
    pub fn cell_index(&self) -> Option<usize> {
        self.content
            .as_deref()
            .and_then(|c| c.trim().parse::<usize>().ok())
            .filter(|cell| *cell < CELL_COUNT)
    }

    /// `content` or an empty string.
    pub fn content_str(&self) -> &str {
        self.content.as_deref().unwrap_or_default()
    }

    // =========================================================================
    // FRAMING
    // =========================================================================

    /// Encode as a complete frame, length prefix included.
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        let body = serde_json::to_vec(self)?;
        if body.len() > MAX_FRAME_LEN {
            return Err(ProtocolError::FrameTooLarge(body.len()));
        }

        let mut frame = Vec::with_capacity(LEN_PREFIX + body.len());
        frame.extend_from_slice(&(body.len() as u32).to_be_bytes());
        frame.extend_from_slice(&body);
        Ok(frame)
    }

    /// Decode exactly one complete frame.
    pub fn decode(frame: &[u8]) -> Result<Self, ProtocolError> {
        if frame.len() < LEN_PREFIX {
            return Err(ProtocolError::Truncated);
        }
        let (prefix, body) = frame.split_at(LEN_PREFIX);
        let len = frame_len([prefix[0], prefix[1], prefix[2], prefix[3]])?;

        if body.len() < len {
            return Err(ProtocolError::Truncated);
        }
        if body.len() > len {
            return Err(ProtocolError::TrailingBytes(body.len() - len));
        }
        Ok(serde_json::from_slice(body)?)
    }
}

/// Validate a length prefix.
fn frame_len(prefix: [u8; LEN_PREFIX]) -> Result<usize, ProtocolError> {
    let len = u32::from_be_bytes(prefix) as usize;
    if len == 0 {
        return Err(ProtocolError::EmptyFrame);
    }
    if len > MAX_FRAME_LEN {
        return Err(ProtocolError::FrameTooLarge(len));
    }
    Ok(len)
}

// =============================================================================
// STREAM HELPERS
// =============================================================================

/// Read one frame.
///
/// Returns `Ok(None)` when the stream ends cleanly between frames. Ending
/// inside a frame is [`ProtocolError::Truncated`].
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Message>, ProtocolError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut prefix = [0u8; LEN_PREFIX];
    let mut filled = 0;
    while filled < LEN_PREFIX {
        let n = reader.read(&mut prefix[filled..]).await?;
        if n == 0 {
            return if filled == 0 {
                Ok(None)
            } else {
                Err(ProtocolError::Truncated)
            };
        }
        filled += n;
    }

    let len = frame_len(prefix)?;
    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            ProtocolError::Truncated
        } else {
            ProtocolError::Io(e)
        }
    })?;

    Ok(Some(serde_json::from_slice(&body)?))
}

/// Write one frame and flush.
pub async fn write_frame<W>(writer: &mut W, message: &Message) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let frame = message.encode()?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body_of(frame: &[u8]) -> serde_json::Value {
        serde_json::from_slice(&frame[LEN_PREFIX..]).unwrap()
    }

    #[test]
    fn test_unset_fields_are_omitted() {
        let frame = Message::reset_request().encode().unwrap();
        let json = body_of(&frame);
        assert_eq!(json, serde_json::json!({ "type": "RESET_REQUEST" }));
    }

    #[test]
    fn test_length_prefix_is_big_endian() {
        let frame = Message::chat("hi").encode().unwrap();
        let len = u32::from_be_bytes([frame[0], frame[1], frame[2], frame[3]]) as usize;
        assert_eq!(len, frame.len() - LEN_PREFIX);
    }

    #[test]
    fn test_move_update_wire_shape() {
        let msg = Message::move_update(4, Shape::X, Some(Player::Two), 0, false);
        let json = body_of(&msg.encode().unwrap());
        assert_eq!(
            json,
            serde_json::json!({
                "type": "MOVE",
                "content": "4",
                "player": "PLAYER_2",
                "player_shape": "X",
                "is_your_turn": false,
                "win_type": 0,
            })
        );
    }

    #[test]
    fn test_notice_kind_is_message() {
        let json = body_of(&Message::notice(OPPONENT_DISCONNECTED).encode().unwrap());
        assert_eq!(json["type"], "MESSAGE");
        assert_eq!(json["content"], OPPONENT_DISCONNECTED);
    }

    #[test]
    fn test_terminal_move_has_unknown_player() {
        let msg = Message::move_update(2, Shape::O, None, 1, false);
        let json = body_of(&msg.encode().unwrap());
        assert_eq!(json["player"], "UNKNOWN_PLAYER");
        assert_eq!(json["win_type"], 1);
    }

    #[test]
    fn test_unknown_kind_and_fields() {
        let body = br#"{"type":"EMOTE","content":"wave","extra":123}"#;
        let mut frame = (body.len() as u32).to_be_bytes().to_vec();
        frame.extend_from_slice(body);

        let msg = Message::decode(&frame).unwrap();
        assert_eq!(msg.kind, MessageType::Unknown);
        assert_eq!(msg.content.as_deref(), Some("wave"));
        assert_eq!(msg.version, None);
    }

    #[test]
    fn test_decode_rejects_bad_frames() {
        let frame = Message::chat("hello").encode().unwrap();

        assert!(matches!(
            Message::decode(&frame[..frame.len() - 1]),
            Err(ProtocolError::Truncated)
        ));
        assert!(matches!(Message::decode(&frame[..2]), Err(ProtocolError::Truncated)));

        let mut trailing = frame.clone();
        trailing.push(b' ');
        assert!(matches!(
            Message::decode(&trailing),
            Err(ProtocolError::TrailingBytes(1))
        ));

        assert!(matches!(
            Message::decode(&[0, 0, 0, 0]),
            Err(ProtocolError::EmptyFrame)
        ));

        let huge = ((MAX_FRAME_LEN + 1) as u32).to_be_bytes();
        assert!(matches!(
            Message::decode(&huge),
            Err(ProtocolError::FrameTooLarge(_))
        ));

        let mut garbage = 3u32.to_be_bytes().to_vec();
        garbage.extend_from_slice(b"{{{");
        assert!(matches!(Message::decode(&garbage), Err(ProtocolError::Json(_))));
    }

    fn frame_of(body: &str) -> Vec<u8> {
        let mut frame = (body.len() as u32).to_be_bytes().to_vec();
        frame.extend_from_slice(body.as_bytes());
        frame
    }

    #[test]
    fn test_unrepresentable_optional_values_decode_as_unset() {
        let msg = Message::decode(&frame_of(r#"{"type":"MOVE","content":"4","player":"SPECTATOR"}"#))
            .unwrap();
        assert_eq!(msg.kind, MessageType::Move);
        assert_eq!(msg.cell_index(), Some(4));
        assert_eq!(msg.player, None);

        let msg = Message::decode(&frame_of(
            r#"{"type":"MOVE","content":"4","player":"PLAYER_1","player_shape":"TRIANGLE"}"#,
        ))
        .unwrap();
        assert_eq!(msg.player_shape, None);
        assert_eq!(msg.player, Some(PlayerType::Player1));

        let msg = Message::decode(&frame_of(r#"{"type":"MOVE","content":"4","win_type":300}"#))
            .unwrap();
        assert_eq!(msg.win_type, None);
        assert_eq!(msg.cell_index(), Some(4));

        let msg = Message::decode(&frame_of(
            r#"{"type":"RESET_CONFIRMATION","player_shape":"O","is_your_turn":"maybe","win_type":-1}"#,
        ))
        .unwrap();
        assert_eq!(msg.player_shape, Some(Shape::O));
        assert_eq!(msg.is_your_turn, None);
        assert_eq!(msg.win_type, None);
    }

    #[test]
    fn test_null_and_wrongly_typed_content_decode_as_unset() {
        let msg = Message::decode(&frame_of(r#"{"type":"MOVE","content":4,"version":null}"#)).unwrap();
        assert_eq!(msg.content, None);
        assert_eq!(msg.version, None);
        assert_eq!(msg.cell_index(), None);
    }

    #[test]
    fn test_missing_type_is_rejected() {
        let body = br#"{"content":"4"}"#;
        let mut frame = (body.len() as u32).to_be_bytes().to_vec();
        frame.extend_from_slice(body);
        assert!(matches!(Message::decode(&frame), Err(ProtocolError::Json(_))));
    }

    #[test]
    fn test_cell_index() {
        assert_eq!(Message::move_request(0).cell_index(), Some(0));
        assert_eq!(Message::move_request(8).cell_index(), Some(8));
        assert_eq!(Message::move_request(9).cell_index(), None);
        assert_eq!(Message::chat("x").cell_index(), None);
        assert_eq!(Message::chat("-1").cell_index(), None);
        assert_eq!(Message::reset_request().cell_index(), None);
    }

    #[test]
    fn test_player_type_conversion() {
        assert_eq!(PlayerType::from(Player::One), PlayerType::Player1);
        assert_eq!(PlayerType::from(None), PlayerType::Unknown);
        assert_eq!(PlayerType::Player2.seat(), Some(Player::Two));
        assert_eq!(PlayerType::Unknown.seat(), None);
    }

    #[tokio::test]
    async fn test_stream_frames_in_order() {
        let (mut a, mut b) = tokio::io::duplex(1024);

        write_frame(&mut a, &Message::version_check("1.0.0")).await.unwrap();
        write_frame(&mut a, &Message::move_request(3)).await.unwrap();
        drop(a);

        let first = read_frame(&mut b).await.unwrap().unwrap();
        assert_eq!(first.kind, MessageType::VersionCheck);
        assert_eq!(first.version.as_deref(), Some("1.0.0"));

        let second = read_frame(&mut b).await.unwrap().unwrap();
        assert_eq!(second.cell_index(), Some(3));

        assert!(read_frame(&mut b).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stream_eof_inside_frame() {
        let (mut a, mut b) = tokio::io::duplex(1024);
        let frame = Message::chat("cut short").encode().unwrap();

        a.write_all(&frame[..frame.len() - 3]).await.unwrap();
        drop(a);

        assert!(matches!(read_frame(&mut b).await, Err(ProtocolError::Truncated)));
    }

    #[tokio::test]
    async fn test_stream_eof_inside_prefix() {
        let (mut a, mut b) = tokio::io::duplex(1024);
        a.write_all(&[0, 0]).await.unwrap();
        drop(a);

        assert!(matches!(read_frame(&mut b).await, Err(ProtocolError::Truncated)));
    }
}
