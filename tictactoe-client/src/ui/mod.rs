//! UI module - terminal board rendering and command parsing

use std::fmt::Write as _;

use tictactoe::game::board::{Board, CELL_COUNT};

use crate::network::{ClientEvent, ClientState, Outcome};

/// What the player typed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Place our shape on a cell.
    Move(usize),
    /// Ask for a rematch.
    Rematch,
    Quit,
    Chat(String),
    /// Blank line, redraw only.
    Redraw,
}

/// Parse one line of input.
///
/// A lone digit is a move, `/again` and `/quit` are commands, anything else
/// is sent as chat.
pub fn parse_command(line: &str) -> Command {
    let trimmed = line.trim();
    match trimmed {
        "" => Command::Redraw,
        "/again" | "/rematch" => Command::Rematch,
        "/quit" | "/exit" => Command::Quit,
        _ => match trimmed.parse::<usize>() {
            Ok(cell) if cell < CELL_COUNT => Command::Move(cell),
            _ => Command::Chat(trimmed.to_string()),
        },
    }
}

/// Board as three rows, free cells showing their index.
pub fn render_board(board: &Board) -> String {
    let mut out = String::new();
    for row in 0..3 {
        if row > 0 {
            out.push_str("---+---+---\n");
        }
        let cells: Vec<String> = (0..3)
            .map(|col| {
                let index = row * 3 + col;
                match board.get(index) {
                    Some(shape) => shape.symbol().to_string(),
                    None => index.to_string(),
                }
            })
            .collect();
        let _ = writeln!(out, " {} ", cells.join(" | "));
    }
    out
}

/// One-line status for the prompt.
pub fn status_line(state: &ClientState) -> String {
    use crate::network::ClientPhase::*;

    match state.phase {
        Connecting => "Connecting...".to_string(),
        Searching => "Waiting for an opponent...".to_string(),
        Rejected => "Version rejected by server".to_string(),
        Playing if state.my_turn => "Your turn (0-8)".to_string(),
        Playing => "Opponent's turn".to_string(),
        GameOver => "Game over. /again for a rematch, /quit to leave".to_string(),
    }
}

/// Text to print for an event, if any.
pub fn describe(event: &ClientEvent) -> Option<String> {
    let text = match event {
        ClientEvent::Searching => "Connected. Looking for an opponent...".to_string(),
        ClientEvent::VersionRejected => {
            "Server rejected our version. Update the client.".to_string()
        }
        ClientEvent::Joined { player, session_id } => {
            format!("Matched as {} in session {}", player, session_id)
        }
        ClientEvent::NewRound { shape, my_turn } => format!(
            "New round. You are {}. {}",
            shape.symbol(),
            if *my_turn { "You start." } else { "Opponent starts." }
        ),
        ClientEvent::MovePlayed { .. } => return None,
        ClientEvent::GameOver(Outcome::Won { line }) => format!("You won! ({:?})", line),
        ClientEvent::GameOver(Outcome::Lost { line }) => format!("You lost. ({:?})", line),
        ClientEvent::GameOver(Outcome::Draw) => "Draw.".to_string(),
        ClientEvent::OpponentWantsRematch => {
            "Opponent wants a rematch. Type /again to accept.".to_string()
        }
        ClientEvent::Chat(text) => format!("Opponent: {}", text),
        ClientEvent::Notice(text) => format!("* {}", text),
        ClientEvent::Ignored(_) => return None,
    };
    Some(text)
}

/// Whether the board should be redrawn after this event.
pub fn redraws_board(event: &ClientEvent) -> bool {
    matches!(
        event,
        ClientEvent::NewRound { .. } | ClientEvent::MovePlayed { .. }
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tictactoe::game::board::Shape;
    use tictactoe::game::state::Player;

    #[test]
    fn test_parse_command() {
        assert_eq!(parse_command("4\n"), Command::Move(4));
        assert_eq!(parse_command(" 0 "), Command::Move(0));
        assert_eq!(parse_command("9"), Command::Chat("9".into()));
        assert_eq!(parse_command("/again"), Command::Rematch);
        assert_eq!(parse_command("/quit"), Command::Quit);
        assert_eq!(parse_command("good game"), Command::Chat("good game".into()));
        assert_eq!(parse_command("   "), Command::Redraw);
    }

    #[test]
    fn test_render_board() {
        let mut board = Board::new();
        board.place(0, Shape::X);
        board.place(4, Shape::O);

        let rendered = render_board(&board);
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], " X | 1 | 2 ");
        assert_eq!(lines[1], "---+---+---");
        assert_eq!(lines[2], " 3 | O | 5 ");
        assert_eq!(lines.len(), 5);
    }

    #[test]
    fn test_describe() {
        let joined = ClientEvent::Joined {
            player: Player::One,
            session_id: "deadbeef".into(),
        };
        assert_eq!(
            describe(&joined).unwrap(),
            "Matched as Player 1 in session deadbeef"
        );
        assert!(describe(&ClientEvent::GameOver(Outcome::Draw)).is_some());
        assert!(describe(&ClientEvent::MovePlayed {
            cell: 0,
            shape: Shape::X,
            my_turn: false
        })
        .is_none());
    }

    #[test]
    fn test_status_line() {
        let mut state = ClientState::new();
        assert_eq!(status_line(&state), "Connecting...");
        state.phase = crate::network::ClientPhase::Playing;
        state.my_turn = true;
        assert_eq!(status_line(&state), "Your turn (0-8)");
    }
}
