use serde::{Deserialize, Serialize};

/// Player color. Serialized as `"white"`/`"black"` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    White,
    Black,
}

impl Color {
    pub fn opponent(self) -> Color {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }

    /// Rank direction of this color's pawns: White advances towards higher
    /// indices, Black towards lower ones.
    pub fn direction(self) -> i16 {
        match self {
            Color::White => 1,
            Color::Black => -1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Color::White => "white",
            Color::Black => "black",
        }
    }
}

/// Piece kind. The wire letters are German initials: D = queen, T = rook,
/// L = bishop, S = knight, B = pawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PieceKind {
    King,
    Queen,
    Rook,
    Bishop,
    Knight,
    Pawn,
}

impl PieceKind {
    pub fn letter(self) -> &'static str {
        match self {
            PieceKind::King => "K",
            PieceKind::Queen => "D",
            PieceKind::Rook => "T",
            PieceKind::Bishop => "L",
            PieceKind::Knight => "S",
            PieceKind::Pawn => "B",
        }
    }
}

impl Serialize for PieceKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.letter())
    }
}

/// A piece standing on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Piece {
    pub kind: PieceKind,
    pub owner: Color,
    pub has_moved: bool,
}

impl Piece {
    fn initial(kind: PieceKind, owner: Color) -> Piece {
        Piece {
            kind,
            owner,
            has_moved: false,
        }
    }
}

pub const BOARD_SIZE: u8 = 64;

pub fn file_of(idx: u8) -> u8 {
    idx % 8
}

pub fn rank_of(idx: u8) -> u8 {
    idx / 8
}

/// Human-readable field name (`A1`..`H8`), used only for logging.
pub fn field_name(idx: u8) -> String {
    format!("{}{}", (b'A' + file_of(idx)) as char, rank_of(idx) + 1)
}

/// The 8x8 grid. Index `i` maps to file `i % 8` and rank `i / 8`;
/// White occupies indices 0..16, Black 48..64 in the initial layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    cells: [Option<Piece>; 64],
}

impl Board {
    /// Initial layout: rooks on the corners, then knights, bishops, king
    /// on file D and
    /// queen on file E.
    pub fn initial() -> Board {
        let mut cells = [None; 64];
        for (idx, cell) in cells.iter_mut().enumerate() {
            let idx = idx as u8;
            let owner = if idx < 32 { Color::White } else { Color::Black };
            let kind = match idx {
                0 | 7 | 56 | 63 => Some(PieceKind::Rook),
                1 | 6 | 57 | 62 => Some(PieceKind::Knight),
                2 | 5 | 58 | 61 => Some(PieceKind::Bishop),
                3 | 59 => Some(PieceKind::King),
                4 | 60 => Some(PieceKind::Queen),
                8..=15 | 48..=55 => Some(PieceKind::Pawn),
                _ => None,
            };
            *cell = kind.map(|kind| Piece::initial(kind, owner));
        }
        Board { cells }
    }

    pub fn piece_at(&self, idx: u8) -> Option<&Piece> {
        self.cells[idx as usize].as_ref()
    }

    pub fn owner_of(&self, idx: u8) -> Option<Color> {
        self.piece_at(idx).map(|p| p.owner)
    }

    pub fn is_empty(&self, idx: u8) -> bool {
        self.cells[idx as usize].is_none()
    }

    pub fn set(&mut self, idx: u8, piece: Option<Piece>) {
        self.cells[idx as usize] = piece;
    }

    /// Removes and returns the piece at `idx`.
    pub fn take(&mut self, idx: u8) -> Option<Piece> {
        self.cells[idx as usize].take()
    }

    pub fn cells(&self) -> impl Iterator<Item = (u8, Option<&Piece>)> {
        self.cells.iter().enumerate().map(|(i, c)| (i as u8, c.as_ref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_layout_has_kings_on_the_d_file() {
        let board = Board::initial();
        assert_eq!(board.piece_at(0).unwrap().kind, PieceKind::Rook);
        assert_eq!(board.piece_at(3).unwrap().kind, PieceKind::King);
        assert_eq!(board.piece_at(4).unwrap().kind, PieceKind::Queen);
        assert_eq!(board.piece_at(59).unwrap().kind, PieceKind::King);
        assert_eq!(board.piece_at(12).unwrap().owner, Color::White);
        assert_eq!(board.piece_at(52).unwrap().owner, Color::Black);
        assert!(board.is_empty(27));
        assert!(!board.piece_at(0).unwrap().has_moved);
        let pieces = board.cells().filter(|(_, c)| c.is_some()).count();
        assert_eq!(pieces, 32);
    }

    #[test]
    fn field_names_follow_index_scheme() {
        assert_eq!(field_name(0), "A1");
        assert_eq!(field_name(7), "H1");
        assert_eq!(field_name(63), "H8");
        assert_eq!(field_name(12), "E2");
    }
}
