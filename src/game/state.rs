use std::collections::BTreeMap;

use serde::Serialize;

use crate::game::board::{Board, Color, PieceKind};

/// Per-color tally of fallen pieces. `white` holds the pieces White has lost,
/// which is also the pool a White pawn promotes from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DefeatedTallies {
    pub white: BTreeMap<PieceKind, u32>,
    pub black: BTreeMap<PieceKind, u32>,
}

impl DefeatedTallies {
    pub fn of(&self, color: Color) -> &BTreeMap<PieceKind, u32> {
        match color {
            Color::White => &self.white,
            Color::Black => &self.black,
        }
    }

    fn of_mut(&mut self, color: Color) -> &mut BTreeMap<PieceKind, u32> {
        match color {
            Color::White => &mut self.white,
            Color::Black => &mut self.black,
        }
    }

    /// Records that `loser` lost a piece of the given kind.
    pub fn record_loss(&mut self, loser: Color, kind: PieceKind) {
        *self.of_mut(loser).entry(kind).or_insert(0) += 1;
    }

    /// The most valuable piece `color` has lost so far, the piece a pawn
    /// reaching the far rank resurrects. Queen > Rook > Bishop > Knight >
    /// Pawn, with Pawn as the default when nothing was captured.
    pub fn best_recyclable(&self, color: Color) -> PieceKind {
        let tally = self.of(color);
        let has = |kind| tally.get(&kind).copied().unwrap_or(0) > 0;
        if has(PieceKind::Queen) {
            PieceKind::Queen
        } else if has(PieceKind::Rook) {
            PieceKind::Rook
        } else if has(PieceKind::Bishop) {
            PieceKind::Bishop
        } else if has(PieceKind::Knight) {
            PieceKind::Knight
        } else {
            PieceKind::Pawn
        }
    }

    /// Removes one piece of the given kind from `color`'s pool, if present.
    pub fn consume(&mut self, color: Color, kind: PieceKind) {
        let tally = self.of_mut(color);
        if let Some(count) = tally.get_mut(&kind) {
            *count -= 1;
            if *count == 0 {
                tally.remove(&kind);
            }
        }
    }
}

/// Canonical state of one match: the board plus everything the rule engine
/// needs to evaluate a move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchState {
    pub board: Board,
    pub current_turn: Color,
    pub turn_count: u32,
    /// Destination square of each color's last two-square pawn advance,
    /// valid only through the opponent's very next ply.
    en_passant: [Option<u8>; 2],
    pub defeated: DefeatedTallies,
    pub game_over: bool,
    pub winner: Option<Color>,
}

impl MatchState {
    pub fn new() -> MatchState {
        MatchState {
            board: Board::initial(),
            current_turn: Color::White,
            turn_count: 0,
            en_passant: [None, None],
            defeated: DefeatedTallies::default(),
            game_over: false,
            winner: None,
        }
    }

    pub fn en_passant_target(&self, color: Color) -> Option<u8> {
        self.en_passant[color as usize]
    }

    pub fn set_en_passant_target(&mut self, color: Color, target: Option<u8>) {
        self.en_passant[color as usize] = target;
    }

    pub fn flip_turn(&mut self) {
        self.current_turn = self.current_turn.opponent();
    }
}

impl Default for MatchState {
    fn default() -> Self {
        Self::new()
    }
}
