//! Per-piece move legality, move application, and attack/check detection.
//!
//! Everything here evaluates against a [`MatchState`]; the only mutation
//! happens inside [`apply_move`]. Danger probes work on cloned state, so a
//! probe can never leave residual changes on the live board.

use thiserror::Error;

use crate::game::board::{file_of, rank_of, Color, Piece, PieceKind, BOARD_SIZE};
use crate::game::state::MatchState;

/// Rule-level rejection of a requested move. The display strings are the
/// warning texts sent back to the acting player.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoveError {
    #[error("That field does not exist.")]
    OutOfBounds,

    #[error("You cannot move an empty field.")]
    EmptyField,

    #[error("That is not your piece.")]
    NotYourPiece,

    #[error("Your {0} is not allowed to move to this position.")]
    IllegalFor(&'static str),
}

fn illegal(kind: PieceKind) -> MoveError {
    let name = match kind {
        PieceKind::King => "king",
        PieceKind::Queen => "queen",
        PieceKind::Rook => "rook",
        PieceKind::Bishop => "bishop",
        PieceKind::Knight => "knight",
        PieceKind::Pawn => "pawn",
    };
    MoveError::IllegalFor(name)
}

const KNIGHT_DELTAS: [i16; 8] = [17, 15, 10, 6, -6, -10, -15, -17];
const KING_DELTAS: [i16; 8] = [9, 8, 7, 1, -1, -7, -8, -9];
const DIAGONAL_STRIDES: [i16; 4] = [9, 7, -7, -9];

fn on_board(idx: i16) -> bool {
    (0..BOARD_SIZE as i16).contains(&idx)
}

fn file_distance(a: u8, b: u8) -> u8 {
    file_of(a).abs_diff(file_of(b))
}

fn rank_distance(a: u8, b: u8) -> u8 {
    rank_of(a).abs_diff(rank_of(b))
}

/// Destination is free to enter for `mover`: empty or enemy-occupied.
fn empty_or_enemy(state: &MatchState, idx: u8, mover: Color) -> bool {
    state.board.owner_of(idx) != Some(mover)
}

/// Sliding move along a rank or file. Every square strictly between `from`
/// and `to` must be empty; the destination must be empty or enemy-occupied.
fn rook_reaches(state: &MatchState, from: u8, to: u8, mover: Color) -> bool {
    if from == to {
        return false;
    }
    let step = if rank_of(from) == rank_of(to) {
        if to > from {
            1
        } else {
            -1
        }
    } else if file_of(from) == file_of(to) {
        if to > from {
            8
        } else {
            -8
        }
    } else {
        return false;
    };

    let mut cur = from as i16 + step;
    while cur != to as i16 {
        if !state.board.is_empty(cur as u8) {
            return false;
        }
        cur += step;
    }
    empty_or_enemy(state, to, mover)
}

/// Sliding move along one of the four diagonals. Each step must shift the
/// file by exactly one, which rejects rays wrapping around the board edge.
fn bishop_reaches(state: &MatchState, from: u8, to: u8, mover: Color) -> bool {
    for stride in DIAGONAL_STRIDES {
        let mut cur = from as i16;
        loop {
            let next = cur + stride;
            if !on_board(next) || file_distance(cur as u8, next as u8) != 1 {
                break;
            }
            if next == to as i16 {
                return empty_or_enemy(state, to, mover);
            }
            if !state.board.is_empty(next as u8) {
                break;
            }
            cur = next;
        }
    }
    false
}

/// The index delta alone is necessary but not sufficient: a delta that only
/// matches numerically by crossing the file seam (e.g. 7 -> 1) is rejected
/// by the file/rank distance check.
fn knight_reaches(state: &MatchState, from: u8, to: u8, mover: Color) -> bool {
    let delta = to as i16 - from as i16;
    if !KNIGHT_DELTAS.contains(&delta) {
        return false;
    }
    let (fd, rd) = (file_distance(from, to), rank_distance(from, to));
    if !((fd == 1 && rd == 2) || (fd == 2 && rd == 1)) {
        return false;
    }
    empty_or_enemy(state, to, mover)
}

/// A plain one-square king step; castling is handled separately since a swap
/// never attacks anything.
fn king_steps(state: &MatchState, from: u8, to: u8, mover: Color) -> bool {
    let delta = to as i16 - from as i16;
    KING_DELTAS.contains(&delta)
        && file_distance(from, to) <= 1
        && rank_distance(from, to) <= 1
        && empty_or_enemy(state, to, mover)
}

/// How a pawn would move from `from` to `to`, or `None` when illegal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PawnStep {
    Push,
    DoublePush,
    Capture,
    /// Capture in passing; the field holds the passed pawn's square.
    EnPassant(u8),
}

fn pawn_step(state: &MatchState, from: u8, to: u8, mover: Color) -> Option<PawnStep> {
    let dir = mover.direction();
    let forward = 8 * dir;
    let delta = to as i16 - from as i16;
    let unmoved = state
        .board
        .piece_at(from)
        .map_or(false, |p| !p.has_moved);

    if delta == forward && state.board.is_empty(to) {
        return Some(PawnStep::Push);
    }
    if delta == 2 * forward
        && unmoved
        && state.board.is_empty(to)
        && state.board.is_empty((from as i16 + forward) as u8)
    {
        return Some(PawnStep::DoublePush);
    }
    if (delta == forward - 1 || delta == forward + 1)
        && file_distance(from, to) == 1
        && state.board.owner_of(to) == Some(mover.opponent())
    {
        return Some(PawnStep::Capture);
    }
    // En passant: the opponent's last double push must have landed right next
    // to this pawn, and the capture steps diagonally behind it.
    if let Some(passed) = state.en_passant_target(mover.opponent()) {
        if rank_of(passed) == rank_of(from)
            && file_distance(passed, from) == 1
            && to as i16 == from as i16 + forward + (passed as i16 - from as i16)
            && state.board.is_empty(to)
        {
            return Some(PawnStep::EnPassant(passed));
        }
    }
    None
}

/// Pure legality check for `state.current_turn` moving `from` -> `to`,
/// used by the attack scan. Castling is excluded: the swap cannot capture.
fn is_move_allowed(state: &MatchState, from: u8, to: u8) -> bool {
    let mover = state.current_turn;
    let Some(piece) = state.board.piece_at(from) else {
        return false;
    };
    if piece.owner != mover {
        return false;
    }
    match piece.kind {
        PieceKind::Rook => rook_reaches(state, from, to, mover),
        PieceKind::Bishop => bishop_reaches(state, from, to, mover),
        PieceKind::Queen => {
            rook_reaches(state, from, to, mover) || bishop_reaches(state, from, to, mover)
        }
        PieceKind::Knight => knight_reaches(state, from, to, mover),
        PieceKind::King => king_steps(state, from, to, mover),
        PieceKind::Pawn => pawn_step(state, from, to, mover).is_some(),
    }
}

/// Moves the piece on `from` to `to`, capturing whatever stood there and
/// recording the loss in the victim's tally.
fn relocate(state: &mut MatchState, from: u8, to: u8) {
    if let Some(victim) = state.board.piece_at(to) {
        state.defeated.record_loss(victim.owner, victim.kind);
    }
    let mut piece = state
        .board
        .take(from)
        .unwrap_or_else(|| unreachable!("relocate from an empty field"));
    piece.has_moved = true;
    state.board.set(to, Some(piece));
}

/// The non-standard castling swap: both cells unmoved, one holding the king
/// and one a rook of the mover, exactly 3 or 4 squares apart on the same
/// rank with nothing in between. The two cells swap contents and both count
/// as moved afterwards.
fn try_castling(state: &mut MatchState, from: u8, to: u8, mover: Color) -> bool {
    let (Some(a), Some(b)) = (state.board.piece_at(from), state.board.piece_at(to)) else {
        return false;
    };
    let kinds_match = (a.kind == PieceKind::King && b.kind == PieceKind::Rook)
        || (a.kind == PieceKind::Rook && b.kind == PieceKind::King);
    if a.has_moved || b.has_moved || !kinds_match || a.owner != mover || b.owner != mover {
        return false;
    }
    if rank_of(from) != rank_of(to) || !matches!(file_distance(from, to), 3 | 4) {
        return false;
    }
    let step = if to > from { 1i16 } else { -1 };
    let mut cur = from as i16 + step;
    while cur != to as i16 {
        if !state.board.is_empty(cur as u8) {
            return false;
        }
        cur += step;
    }

    let mut a = state.board.take(from).unwrap_or_else(|| unreachable!());
    let mut b = state.board.take(to).unwrap_or_else(|| unreachable!());
    a.has_moved = true;
    b.has_moved = true;
    state.board.set(from, Some(b));
    state.board.set(to, Some(a));
    true
}

fn apply_pawn(state: &mut MatchState, from: u8, to: u8, mover: Color) -> Result<(), MoveError> {
    let step = pawn_step(state, from, to, mover).ok_or_else(|| illegal(PieceKind::Pawn))?;
    relocate(state, from, to);

    match step {
        PawnStep::DoublePush => state.set_en_passant_target(mover, Some(to)),
        PawnStep::EnPassant(passed) => {
            if let Some(victim) = state.board.take(passed) {
                state.defeated.record_loss(victim.owner, victim.kind);
            }
        }
        PawnStep::Push | PawnStep::Capture => {}
    }

    // Capture-recycling promotion: on the far rank the pawn is replaced by
    // the most valuable piece the mover has lost so far.
    let far_rank = if mover.direction() > 0 { 7 } else { 0 };
    if rank_of(to) == far_rank {
        let kind = state.defeated.best_recyclable(mover);
        state.defeated.consume(mover, kind);
        state.board.set(
            to,
            Some(Piece {
                kind,
                owner: mover,
                has_moved: true,
            }),
        );
    }
    Ok(())
}

/// Validates and applies one move for the color to move. On error the state
/// is untouched; on success the board, tallies, and en-passant records are
/// updated. Turn flipping and turn counting stay with the coordinator.
pub fn apply_move(state: &mut MatchState, from: u8, to: u8) -> Result<(), MoveError> {
    if from >= BOARD_SIZE || to >= BOARD_SIZE {
        return Err(MoveError::OutOfBounds);
    }
    let mover = state.current_turn;
    let piece = state.board.piece_at(from).ok_or(MoveError::EmptyField)?;
    if piece.owner != mover {
        return Err(MoveError::NotYourPiece);
    }
    let kind = piece.kind;

    match kind {
        PieceKind::Pawn => apply_pawn(state, from, to, mover)?,
        PieceKind::Rook | PieceKind::King => {
            if is_move_allowed(state, from, to) {
                relocate(state, from, to);
            } else if !try_castling(state, from, to, mover) {
                return Err(illegal(kind));
            }
        }
        PieceKind::Queen | PieceKind::Bishop | PieceKind::Knight => {
            if !is_move_allowed(state, from, to) {
                return Err(illegal(kind));
            }
            relocate(state, from, to);
        }
    }

    // A double-push record survives only while the opponent can still answer
    // it; the mover's own record is dropped unless this move refreshed it.
    if let Some(target) = state.en_passant_target(mover) {
        if target != to {
            state.set_en_passant_target(mover, None);
        }
    }
    Ok(())
}

/// All squares from which `attacker` has a legal move onto `square`.
///
/// With `occupant` given, the piece is hypothetically placed on `square`
/// first; with `None` the square is probed as it stands. The probe runs on a
/// cloned state, leaving the caller's board untouched.
pub fn attackers_of(
    state: &MatchState,
    square: u8,
    attacker: Color,
    occupant: Option<Piece>,
) -> Vec<u8> {
    let mut probe = state.clone();
    if let Some(piece) = occupant {
        probe.board.set(square, Some(piece));
    }
    probe.current_turn = attacker;

    (0..BOARD_SIZE)
        .filter(|&idx| {
            idx != square
                && probe.board.owner_of(idx) == Some(attacker)
                && is_move_allowed(&probe, idx, square)
        })
        .collect()
}

/// Whether `square` would be attackable by `attacker` (with an optional
/// hypothetical occupant), without mutating the live state.
pub fn field_in_danger(
    state: &MatchState,
    square: u8,
    attacker: Color,
    occupant: Option<Piece>,
) -> bool {
    !attackers_of(state, square, attacker, occupant).is_empty()
}

/// King-mobility checkmate test for a king already in danger: mate holds iff
/// every adjacent square is either an illegal king move or still dangerous
/// after the hypothetical relocation. Blocking or capturing with another
/// piece is deliberately not searched.
pub fn is_checkmate(state: &MatchState, king_square: u8, defender: Color) -> bool {
    let attacker = defender.opponent();
    for delta in KING_DELTAS {
        let candidate = king_square as i16 + delta;
        if !on_board(candidate) {
            continue;
        }
        let candidate = candidate as u8;

        let mut probe = state.clone();
        probe.current_turn = defender;
        if !king_steps(&probe, king_square, candidate, defender) {
            continue;
        }
        let king = probe.board.take(king_square);
        probe.board.set(candidate, king.map(|mut k| {
            k.has_moved = true;
            k
        }));
        if attackers_of(&probe, candidate, attacker, None).is_empty() {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_state(turn: Color) -> MatchState {
        let mut state = MatchState::new();
        for idx in 0..BOARD_SIZE {
            state.board.set(idx, None);
        }
        state.current_turn = turn;
        state
    }

    fn put(state: &mut MatchState, idx: u8, kind: PieceKind, owner: Color, has_moved: bool) {
        state.board.set(
            idx,
            Some(Piece {
                kind,
                owner,
                has_moved,
            }),
        );
    }

    #[test]
    fn rook_blocked_by_intervening_piece() {
        let mut state = empty_state(Color::White);
        put(&mut state, 0, PieceKind::Rook, Color::White, true);
        put(&mut state, 3, PieceKind::Pawn, Color::White, true);

        assert!(apply_move(&mut state, 0, 5).is_err());
        assert!(apply_move(&mut state, 0, 2).is_ok());
    }

    #[test]
    fn rook_captures_only_at_destination() {
        let mut state = empty_state(Color::White);
        put(&mut state, 8, PieceKind::Rook, Color::White, true);
        put(&mut state, 40, PieceKind::Pawn, Color::Black, true);

        // Capturing the blocker is fine, sliding past it is not.
        assert!(apply_move(&mut state, 8, 56).is_err());
        assert!(apply_move(&mut state, 8, 40).is_ok());
        assert_eq!(
            state.defeated.of(Color::Black).get(&PieceKind::Pawn),
            Some(&1)
        );
    }

    #[test]
    fn rook_rejects_non_lines() {
        let mut state = empty_state(Color::White);
        put(&mut state, 0, PieceKind::Rook, Color::White, true);
        assert!(apply_move(&mut state, 0, 9).is_err());
    }

    #[test]
    fn knight_delta_alone_is_not_enough() {
        let mut state = empty_state(Color::White);
        put(&mut state, 7, PieceKind::Knight, Color::White, true);
        // 7 -> 1 has delta -6, but the two-file step wraps around the H edge.
        assert!(apply_move(&mut state, 7, 1).is_err());
        // 7 -> 17 has delta +10 and wraps the same way.
        assert!(apply_move(&mut state, 7, 17).is_err());
        // A real move out of the corner is fine.
        assert!(apply_move(&mut state, 7, 22).is_ok());

        let mut state = empty_state(Color::White);
        put(&mut state, 1, PieceKind::Knight, Color::White, false);
        assert!(apply_move(&mut state, 1, 18).is_ok());
    }

    #[test]
    fn bishop_rays_stop_at_the_board_edge() {
        let mut state = empty_state(Color::White);
        put(&mut state, 7, PieceKind::Bishop, Color::White, true);
        // 7 + 9 = 16 would wrap to the A file.
        assert!(apply_move(&mut state, 7, 16).is_err());
        assert!(apply_move(&mut state, 7, 14).is_ok());
    }

    #[test]
    fn bishop_blocked_diagonal() {
        let mut state = empty_state(Color::White);
        put(&mut state, 0, PieceKind::Bishop, Color::White, true);
        put(&mut state, 18, PieceKind::Pawn, Color::Black, true);

        assert!(apply_move(&mut state, 0, 27).is_err());
        assert!(apply_move(&mut state, 0, 18).is_ok());
    }

    #[test]
    fn queen_moves_straight_and_diagonal() {
        let mut state = empty_state(Color::White);
        put(&mut state, 27, PieceKind::Queen, Color::White, true);
        assert!(apply_move(&mut state, 27, 31).is_ok());

        state.current_turn = Color::White;
        assert!(apply_move(&mut state, 31, 13).is_ok());

        state.current_turn = Color::White;
        assert!(apply_move(&mut state, 13, 30).is_err());
    }

    #[test]
    fn pawn_double_push_only_while_unmoved() {
        let mut state = MatchState::new();
        assert!(apply_move(&mut state, 8, 24).is_ok());
        assert_eq!(state.en_passant_target(Color::White), Some(24));

        // Same pawn again: has_moved is set, the double push must fail.
        state.current_turn = Color::White;
        assert!(apply_move(&mut state, 24, 40).is_err());
    }

    #[test]
    fn pawn_cannot_capture_straight_ahead() {
        let mut state = empty_state(Color::White);
        put(&mut state, 12, PieceKind::Pawn, Color::White, true);
        put(&mut state, 20, PieceKind::Pawn, Color::Black, true);
        assert!(apply_move(&mut state, 12, 20).is_err());
    }

    #[test]
    fn pawn_diagonal_capture_needs_enemy() {
        let mut state = empty_state(Color::White);
        put(&mut state, 12, PieceKind::Pawn, Color::White, true);
        assert!(apply_move(&mut state, 12, 21).is_err());

        put(&mut state, 21, PieceKind::Knight, Color::Black, true);
        assert!(apply_move(&mut state, 12, 21).is_ok());
    }

    #[test]
    fn en_passant_window_and_vacation() {
        let mut state = empty_state(Color::Black);
        put(&mut state, 33, PieceKind::Pawn, Color::White, true);
        put(&mut state, 50, PieceKind::Pawn, Color::Black, false);
        state.current_turn = Color::Black;

        // Black double-pushes next to the white pawn.
        assert!(apply_move(&mut state, 50, 34).is_ok());
        assert_eq!(state.en_passant_target(Color::Black), Some(34));

        // White captures in passing: lands behind the pawn, square 34 empties.
        state.current_turn = Color::White;
        assert!(apply_move(&mut state, 33, 42).is_ok());
        assert!(state.board.is_empty(34));
        assert_eq!(
            state.defeated.of(Color::Black).get(&PieceKind::Pawn),
            Some(&1)
        );
    }

    #[test]
    fn en_passant_expires_after_an_intervening_move() {
        let mut state = empty_state(Color::Black);
        put(&mut state, 33, PieceKind::Pawn, Color::White, true);
        put(&mut state, 50, PieceKind::Pawn, Color::Black, false);
        put(&mut state, 63, PieceKind::Rook, Color::Black, true);
        state.current_turn = Color::Black;
        assert!(apply_move(&mut state, 50, 34).is_ok());

        // Black moves something else; its own double-push record is dropped.
        state.current_turn = Color::Black;
        assert!(apply_move(&mut state, 63, 62).is_ok());
        assert_eq!(state.en_passant_target(Color::Black), None);

        state.current_turn = Color::White;
        assert!(apply_move(&mut state, 33, 42).is_err());
    }

    #[test]
    fn promotion_recycles_best_lost_piece() {
        let mut state = empty_state(Color::White);
        put(&mut state, 48, PieceKind::Pawn, Color::White, true);
        state.defeated.record_loss(Color::White, PieceKind::Knight);
        state.defeated.record_loss(Color::White, PieceKind::Queen);

        assert!(apply_move(&mut state, 48, 56).is_ok());
        let promoted = state.board.piece_at(56).unwrap();
        assert_eq!(promoted.kind, PieceKind::Queen);
        assert_eq!(promoted.owner, Color::White);
        assert!(state.defeated.of(Color::White).get(&PieceKind::Queen).is_none());
    }

    #[test]
    fn promotion_defaults_to_pawn_without_captures() {
        let mut state = empty_state(Color::Black);
        put(&mut state, 8, PieceKind::Pawn, Color::Black, true);
        state.current_turn = Color::Black;
        assert!(apply_move(&mut state, 8, 0).is_ok());
        assert_eq!(state.board.piece_at(0).unwrap().kind, PieceKind::Pawn);
    }

    #[test]
    fn castling_swaps_and_marks_both_moved() {
        let mut state = MatchState::new();
        state.board.set(1, None);
        state.board.set(2, None);

        // King on 3, rook on 0, distance 3, clear in between.
        assert!(apply_move(&mut state, 3, 0).is_ok());
        assert_eq!(state.board.piece_at(0).unwrap().kind, PieceKind::King);
        assert_eq!(state.board.piece_at(3).unwrap().kind, PieceKind::Rook);
        assert!(state.board.piece_at(0).unwrap().has_moved);
        assert!(state.board.piece_at(3).unwrap().has_moved);
    }

    #[test]
    fn castling_from_the_rook_side() {
        let mut state = MatchState::new();
        state.board.set(4, None);
        state.board.set(5, None);
        state.board.set(6, None);

        // Rook on 7, king on 3, distance 4.
        assert!(apply_move(&mut state, 7, 3).is_ok());
        assert_eq!(state.board.piece_at(7).unwrap().kind, PieceKind::King);
        assert_eq!(state.board.piece_at(3).unwrap().kind, PieceKind::Rook);
    }

    #[test]
    fn castling_rejected_after_either_piece_moved() {
        let mut state = MatchState::new();
        state.board.set(1, None);
        state.board.set(2, None);
        if let Some(mut rook) = state.board.take(0) {
            rook.has_moved = true;
            state.board.set(0, Some(rook));
        }
        assert!(apply_move(&mut state, 3, 0).is_err());
    }

    #[test]
    fn castling_rejected_when_blocked() {
        let mut state = MatchState::new();
        // Knight still on 1.
        state.board.set(2, None);
        assert!(apply_move(&mut state, 3, 0).is_err());
    }

    #[test]
    fn rejected_move_leaves_state_untouched() {
        let mut state = MatchState::new();
        let before = state.clone();
        assert!(apply_move(&mut state, 0, 16).is_err());
        assert_eq!(state, before);
    }

    #[test]
    fn out_of_turn_piece_is_rejected() {
        let mut state = MatchState::new();
        assert_eq!(
            apply_move(&mut state, 48, 40),
            Err(MoveError::NotYourPiece)
        );
        assert_eq!(apply_move(&mut state, 27, 28), Err(MoveError::EmptyField));
        assert_eq!(apply_move(&mut state, 0, 64), Err(MoveError::OutOfBounds));
    }

    #[test]
    fn attackers_found_without_mutating_state() {
        let mut state = empty_state(Color::White);
        put(&mut state, 3, PieceKind::King, Color::White, true);
        put(&mut state, 59, PieceKind::Rook, Color::Black, true);
        let before = state.clone();

        let attackers = attackers_of(&state, 3, Color::Black, None);
        assert_eq!(attackers, vec![59]);
        assert!(field_in_danger(&state, 3, Color::Black, None));
        assert_eq!(state, before);
    }

    #[test]
    fn hypothetical_occupant_blocks_pawn_pushes() {
        let mut state = empty_state(Color::White);
        put(&mut state, 20, PieceKind::Pawn, Color::Black, true);
        let king = Piece {
            kind: PieceKind::King,
            owner: Color::White,
            has_moved: true,
        };
        // A pawn threatens diagonally, not straight ahead.
        assert!(field_in_danger(&state, 13, Color::Black, Some(king)));
        assert!(!field_in_danger(&state, 12, Color::Black, Some(king)));
    }

    #[test]
    fn cornered_king_is_checkmated() {
        let mut state = empty_state(Color::White);
        put(&mut state, 0, PieceKind::King, Color::White, true);
        put(&mut state, 56, PieceKind::Rook, Color::Black, true);
        put(&mut state, 57, PieceKind::Queen, Color::Black, true);

        assert!(field_in_danger(&state, 0, Color::Black, None));
        assert!(is_checkmate(&state, 0, Color::White));
    }

    #[test]
    fn king_with_an_escape_square_is_not_checkmated() {
        let mut state = empty_state(Color::White);
        put(&mut state, 0, PieceKind::King, Color::White, true);
        put(&mut state, 56, PieceKind::Rook, Color::Black, true);

        assert!(field_in_danger(&state, 0, Color::Black, None));
        assert!(!is_checkmate(&state, 0, Color::White));
    }
}
