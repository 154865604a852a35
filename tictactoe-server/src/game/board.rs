//! Board Representation
//!
//! The 3x3 grid, the two player shapes and the canonical win-line table.
//!
//! Win-type codes are positional references into [`WIN_LINES`]: the client
//! maps a code back to a line on screen using the same table, so the order of
//! the lines is part of the wire protocol.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Number of cells on the board.
pub const CELL_COUNT: usize = 9;

/// The 8 winning lines in canonical order: 3 rows, 3 columns, 2 diagonals.
pub const WIN_LINES: [[usize; 3]; 8] = [
    // Rows
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    // Columns
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    // Diagonals
    [0, 4, 8],
    [2, 4, 6],
];

// =============================================================================
// SHAPE
// =============================================================================

/// Marker placed by a player.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Shape {
    /// Cross.
    X,
    /// Nought.
    O,
}

impl Shape {
    /// The other shape.
    #[inline]
    pub fn opposite(self) -> Shape {
        match self {
            Shape::X => Shape::O,
            Shape::O => Shape::X,
        }
    }

    /// Single character used when printing boards.
    pub fn symbol(self) -> char {
        match self {
            Shape::X => 'X',
            Shape::O => 'O',
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

// =============================================================================
// WIN TYPE
// =============================================================================

/// Result of evaluating a board.
///
/// Encoded on the wire as a single integer: `0` ongoing, `1..=8` winning line
/// index + 1, `9` draw.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WinType {
    /// Empty cells remain and nobody has three in a row.
    Ongoing,
    /// Index into [`WIN_LINES`] of the first completed line.
    Line(usize),
    /// Board is full without a completed line.
    Draw,
}

impl WinType {
    /// Wire code for this result.
    pub fn code(self) -> u8 {
        match self {
            WinType::Ongoing => 0,
            WinType::Line(index) => index as u8 + 1,
            WinType::Draw => 9,
        }
    }

    /// Parse a wire code. Returns `None` for codes above 9.
    pub fn from_code(code: u8) -> Option<WinType> {
        match code {
            0 => Some(WinType::Ongoing),
            1..=8 => Some(WinType::Line(code as usize - 1)),
            9 => Some(WinType::Draw),
            _ => None,
        }
    }

    /// Whether the game is over.
    #[inline]
    pub fn is_terminal(self) -> bool {
        !matches!(self, WinType::Ongoing)
    }

    /// Cells of the winning line, if any.
    pub fn line(self) -> Option<[usize; 3]> {
        match self {
            WinType::Line(index) => WIN_LINES.get(index).copied(),
            _ => None,
        }
    }
}

// =============================================================================
// BOARD
// =============================================================================

/// A 3x3 board. Cells are indexed row-major, `0..9`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Board {
    cells: [Option<Shape>; CELL_COUNT],
}

impl Board {
    /// Create an empty board.
    pub fn new() -> Self {
        Self::default()
    }

    /// Shape at `index`, or `None` if empty or out of range.
    pub fn get(&self, index: usize) -> Option<Shape> {
        self.cells.get(index).copied().flatten()
    }

    /// Whether `index` is on the board and unoccupied.
    pub fn is_free(&self, index: usize) -> bool {
        matches!(self.cells.get(index), Some(None))
    }

    /// Place `shape` at `index`. Returns false (and leaves the board
    /// untouched) if the cell is occupied or out of range.
    pub fn place(&mut self, index: usize, shape: Shape) -> bool {
        if !self.is_free(index) {
            return false;
        }
        self.cells[index] = Some(shape);
        true
    }

    /// Number of occupied cells.
    pub fn occupied(&self) -> usize {
        self.cells.iter().filter(|c| c.is_some()).count()
    }

    /// Whether every cell is occupied.
    pub fn is_full(&self) -> bool {
        self.cells.iter().all(Option::is_some)
    }

    /// Evaluate the board in canonical line order.
    pub fn win_type(&self) -> WinType {
        for (index, [a, b, c]) in WIN_LINES.iter().enumerate() {
            if let Some(shape) = self.cells[*a] {
                if self.cells[*b] == Some(shape) && self.cells[*c] == Some(shape) {
                    return WinType::Line(index);
                }
            }
        }

        if self.is_full() {
            WinType::Draw
        } else {
            WinType::Ongoing
        }
    }

    /// Empty every cell.
    pub fn clear(&mut self) {
        self.cells = [None; CELL_COUNT];
    }

    /// All cells in row-major order.
    pub fn cells(&self) -> &[Option<Shape>; CELL_COUNT] {
        &self.cells
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in 0..3 {
            if row > 0 {
                writeln!(f, "---+---+---")?;
            }
            let line: Vec<String> = (0..3)
                .map(|col| {
                    let index = row * 3 + col;
                    match self.cells[index] {
                        Some(shape) => format!(" {} ", shape),
                        None => format!(" {} ", index),
                    }
                })
                .collect();
            writeln!(f, "{}", line.join("|"))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn board_from(cells: [Option<Shape>; CELL_COUNT]) -> Board {
        Board { cells }
    }

    const X: Option<Shape> = Some(Shape::X);
    const O: Option<Shape> = Some(Shape::O);
    const E: Option<Shape> = None;

    #[test]
    fn test_first_row_is_code_one() {
        let board = board_from([X, X, X, E, E, E, E, E, E]);
        assert_eq!(board.win_type(), WinType::Line(0));
        assert_eq!(board.win_type().code(), 1);
    }

    #[test]
    fn test_full_board_without_line_is_draw() {
        let board = board_from([X, O, X, X, O, O, O, X, X]);
        assert_eq!(board.win_type(), WinType::Draw);
        assert_eq!(board.win_type().code(), 9);
    }

    #[test]
    fn test_empty_board_is_ongoing() {
        assert_eq!(Board::new().win_type().code(), 0);
    }

    #[test]
    fn test_each_canonical_line() {
        for (index, line) in WIN_LINES.iter().enumerate() {
            let mut board = Board::new();
            for cell in line {
                assert!(board.place(*cell, Shape::O));
            }
            assert_eq!(board.win_type(), WinType::Line(index));
            assert_eq!(board.win_type().line(), Some(*line));
        }
    }

    #[test]
    fn test_first_matching_line_wins() {
        // Row 0 and column 0 both complete; row comes first.
        let board = board_from([X, X, X, X, O, O, X, O, O]);
        assert_eq!(board.win_type().code(), 1);
    }

    #[test]
    fn test_win_on_last_cell_beats_draw() {
        let board = board_from([X, O, X, O, X, O, O, X, X]);
        assert_eq!(board.win_type(), WinType::Line(6));
    }

    #[test]
    fn test_place_rejects_occupied_and_out_of_range() {
        let mut board = Board::new();
        assert!(board.place(4, Shape::X));
        assert!(!board.place(4, Shape::O));
        assert!(!board.place(9, Shape::O));
        assert_eq!(board.get(4), Some(Shape::X));
        assert_eq!(board.occupied(), 1);
    }

    #[test]
    fn test_code_conversion() {
        assert_eq!(WinType::from_code(0), Some(WinType::Ongoing));
        assert_eq!(WinType::from_code(3), Some(WinType::Line(2)));
        assert_eq!(WinType::from_code(9), Some(WinType::Draw));
        assert_eq!(WinType::from_code(10), None);
    }

    #[test]
    fn test_clear() {
        let mut board = board_from([X, O, E, E, E, E, E, E, X]);
        board.clear();
        assert_eq!(board, Board::new());
    }

    proptest! {
        #[test]
        fn prop_cells_written_once(moves in proptest::collection::vec(0usize..12, 0..40)) {
            let mut board = Board::new();
            let mut shape = Shape::X;
            let mut accepted = 0;
            for cell in moves {
                let was_free = board.is_free(cell);
                let placed = board.place(cell, shape);
                prop_assert_eq!(placed, was_free);
                if placed {
                    accepted += 1;
                    shape = shape.opposite();
                }
            }
            prop_assert!(board.occupied() <= CELL_COUNT);
            prop_assert_eq!(board.occupied(), accepted);
        }
    }
}
