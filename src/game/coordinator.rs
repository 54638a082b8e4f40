//! Per-match coordination: player slots, the turn state machine, and the
//! outbound broadcasts derived from each accepted action.

use log::info;

use crate::game::board::{field_name, Board, Color, PieceKind, BOARD_SIZE};
use crate::game::rules;
use crate::game::state::MatchState;
use crate::game::ConnId;
use crate::models::messages::{map_of, ClientAction, GameStats, ServerMessage};

/// A delivery instruction for the transport layer. The coordinator never
/// touches connections directly; it only emits these.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Send { to: ConnId, msg: ServerMessage },
    Close { conn: ConnId },
}

/// One occupied seat in a match. The color is fixed for the connection's
/// whole tenure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub conn: ConnId,
    pub color: Color,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    WaitingForOpponent,
    /// Both slots filled, `ready` not yet broadcast.
    Active,
    InProgress,
    GameOver,
}

/// One independent game session: exactly one board, at most two players.
#[derive(Debug)]
pub struct Match {
    state: MatchState,
    slots: Vec<Slot>,
    phase: Phase,
}

impl Match {
    pub fn new() -> Match {
        Match {
            state: MatchState::new(),
            slots: Vec::with_capacity(2),
            phase: Phase::WaitingForOpponent,
        }
    }

    pub fn is_full(&self) -> bool {
        self.slots.len() == 2
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn connections(&self) -> Vec<ConnId> {
        self.slots.iter().map(|s| s.conn).collect()
    }

    pub fn color_of(&self, conn: ConnId) -> Option<Color> {
        self.slots.iter().find(|s| s.conn == conn).map(|s| s.color)
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn state(&self) -> &MatchState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut MatchState {
        &mut self.state
    }

    /// Seats a connection, picking a random color for the first occupant and
    /// the complement for the second. Returns `None` when the match is full.
    pub fn add_connection(&mut self, conn: ConnId) -> Option<Color> {
        if self.is_full() {
            return None;
        }
        let color = match self.slots.first() {
            Some(seated) => seated.color.opponent(),
            None => {
                if rand::random() {
                    Color::White
                } else {
                    Color::Black
                }
            }
        };
        self.slots.push(Slot { conn, color });
        if self.is_full() && self.phase == Phase::WaitingForOpponent {
            self.phase = Phase::Active;
        }
        Some(color)
    }

    pub fn remove_connection(&mut self, conn: ConnId) {
        self.slots.retain(|s| s.conn != conn);
    }

    /// Whether the match ever reached two occupants since its last reset.
    pub fn has_been_active(&self) -> bool {
        self.phase != Phase::WaitingForOpponent
    }

    /// Tears the match down to a fresh board and no occupants, closing
    /// whatever connections are still seated.
    pub fn reset(&mut self) -> Vec<Outbound> {
        let closes = self
            .slots
            .drain(..)
            .map(|s| Outbound::Close { conn: s.conn })
            .collect();
        self.state = MatchState::new();
        self.phase = Phase::WaitingForOpponent;
        closes
    }

    /// Periodic step: announces `ready` to both players on the first tick
    /// after the match fills, a no-op on every later tick.
    pub fn step(&mut self) -> Vec<Outbound> {
        if self.phase != Phase::Active {
            return Vec::new();
        }
        self.phase = Phase::InProgress;
        info!("match is ready, starting game");
        self.slots
            .iter()
            .map(|s| Outbound::Send {
                to: s.conn,
                msg: ServerMessage::Ready { color: s.color },
            })
            .collect()
    }

    pub fn handle_action(&mut self, conn: ConnId, action: ClientAction) -> Vec<Outbound> {
        match action {
            ClientAction::MapRequest => self
                .deliver_map(conn)
                .map(|out| vec![out])
                .unwrap_or_default(),
            ClientAction::Turn { from, to } => self.handle_turn(conn, from, to),
            ClientAction::UserMsg { msg, .. } => self.handle_user_msg(conn, &msg),
            ClientAction::UserGaveUp { .. } => self.handle_gave_up(conn),
        }
    }

    fn handle_turn(&mut self, conn: ConnId, from: u8, to: u8) -> Vec<Outbound> {
        let Some(color) = self.color_of(conn) else {
            return Vec::new();
        };
        if self.state.game_over {
            let mut out = self.resend_board(conn);
            out.push(self.warning(conn, "The game is already over."));
            return out;
        }
        if !self.is_full() {
            return vec![self.warning(conn, "Your opponent is not connected yet.")];
        }
        if color != self.state.current_turn {
            let mut out = self.resend_board(conn);
            out.push(self.warning(conn, "It's not your turn, please wait ..."));
            return out;
        }

        let snapshot = self.state.board.clone();
        match rules::apply_move(&mut self.state, from, to) {
            Ok(()) => {
                self.state.turn_count += 1;
                self.state.flip_turn();
                info!(
                    "{} moved {} -> {}",
                    color.as_str(),
                    field_name(from),
                    field_name(to)
                );

                let movement = movement_diff(&snapshot, &self.state.board, from, to, color);
                let mut out = Vec::new();
                for slot in &self.slots {
                    out.push(Outbound::Send {
                        to: slot.conn,
                        msg: movement.clone(),
                    });
                    if let Some(map) = self.deliver_map(slot.conn) {
                        out.push(map);
                    }
                }
                out.extend(self.check_victory());
                if !self.state.game_over {
                    out.extend(self.check_scan());
                }
                out
            }
            Err(err) => {
                info!("rejected move by {}: {}", color.as_str(), err);
                let mut out = self.resend_board(conn);
                out.push(self.warning(conn, &err.to_string()));
                out
            }
        }
    }

    fn handle_user_msg(&self, conn: ConnId, msg: &str) -> Vec<Outbound> {
        let Some(color) = self.color_of(conn) else {
            return Vec::new();
        };
        if msg.is_empty() {
            return Vec::new();
        }
        self.broadcast(ServerMessage::UserMsg {
            msg: escape_html(msg),
            from: color,
        })
    }

    fn handle_gave_up(&self, conn: ConnId) -> Vec<Outbound> {
        let Some(color) = self.color_of(conn) else {
            return Vec::new();
        };
        info!("{} gave up", color.as_str());
        // Announced to both players, but the match itself keeps running.
        self.broadcast(ServerMessage::UserGaveUp { user: color })
    }

    /// Scans for surviving kings; when exactly one color still has its king,
    /// the game ends and both players learn the winner.
    pub fn check_victory(&mut self) -> Vec<Outbound> {
        let mut white_king = false;
        let mut black_king = false;
        for (_, cell) in self.state.board.cells() {
            if let Some(piece) = cell {
                if piece.kind == PieceKind::King {
                    match piece.owner {
                        Color::White => white_king = true,
                        Color::Black => black_king = true,
                    }
                }
            }
        }
        let winner = match (white_king, black_king) {
            (true, false) => Some(Color::White),
            (false, true) => Some(Color::Black),
            _ => None,
        };
        let Some(winner) = winner else {
            return Vec::new();
        };

        self.state.game_over = true;
        self.state.winner = Some(winner);
        self.phase = Phase::GameOver;
        info!(
            "game over, {} wins after {} turns",
            winner.as_str(),
            self.state.turn_count
        );
        self.broadcast(ServerMessage::Gameover {
            winner,
            stats: GameStats {
                turns: self.state.turn_count,
            },
        })
    }

    /// Reports the first king (in index order) currently in danger, as a
    /// `check` or `checkmate` event naming the attacking squares.
    fn check_scan(&self) -> Vec<Outbound> {
        for idx in 0..BOARD_SIZE {
            let Some(piece) = self.state.board.piece_at(idx) else {
                continue;
            };
            if piece.kind != PieceKind::King {
                continue;
            }
            let attacker = piece.owner.opponent();
            let checkers = rules::attackers_of(&self.state, idx, attacker, None);
            if checkers.is_empty() {
                continue;
            }
            let msg = if rules::is_checkmate(&self.state, idx, piece.owner) {
                ServerMessage::Checkmate {
                    from: attacker,
                    checked: idx,
                    checkers,
                }
            } else {
                ServerMessage::Check {
                    from: attacker,
                    checked: idx,
                    checkers,
                }
            };
            return self.broadcast(msg);
        }
        Vec::new()
    }

    fn deliver_map(&self, conn: ConnId) -> Option<Outbound> {
        let color = self.color_of(conn)?;
        Some(Outbound::Send {
            to: conn,
            msg: ServerMessage::MapDelivery {
                active_user: self.state.current_turn,
                color,
                map: map_of(&self.state.board),
                defeated: self.state.defeated.clone(),
            },
        })
    }

    fn resend_board(&self, conn: ConnId) -> Vec<Outbound> {
        self.deliver_map(conn).into_iter().collect()
    }

    fn warning(&self, conn: ConnId, msg: &str) -> Outbound {
        Outbound::Send {
            to: conn,
            msg: ServerMessage::Warning {
                msg: msg.to_string(),
            },
        }
    }

    fn broadcast(&self, msg: ServerMessage) -> Vec<Outbound> {
        self.slots
            .iter()
            .map(|s| Outbound::Send {
                to: s.conn,
                msg: msg.clone(),
            })
            .collect()
    }
}

impl Default for Match {
    fn default() -> Self {
        Self::new()
    }
}

/// Derives the semantic move description sent to clients instead of raw
/// state: the moved piece, what it displaced, whether the move was a
/// castling-style swap, and what a promotion produced. A square outside
/// {from, to} that emptied identifies an en-passant victim.
fn movement_diff(former: &Board, new: &Board, from: u8, to: u8, mover: Color) -> ServerMessage {
    let moved_figure = former
        .piece_at(from)
        .map(|p| p.kind)
        .unwrap_or_else(|| unreachable!("diff of a move from an empty field"));
    let mut former_figure = former.piece_at(to).map(|p| p.kind);
    let mut switched = false;
    let mut new_figure = None;

    let endpoints_are_own_castle_pair = former.piece_at(from).zip(former.piece_at(to)).map_or(
        false,
        |(a, b)| {
            matches!(a.kind, PieceKind::King | PieceKind::Rook)
                && matches!(b.kind, PieceKind::King | PieceKind::Rook)
                && a.owner == mover
                && b.owner == mover
        },
    );
    let promoted = moved_figure == PieceKind::Pawn
        && new
            .piece_at(to)
            .map_or(false, |p| p.kind != PieceKind::Pawn && p.owner == mover);

    if endpoints_are_own_castle_pair {
        switched = true;
    } else if promoted {
        new_figure = new.piece_at(to).map(|p| p.kind);
        switched = true;
    } else {
        for idx in 0..BOARD_SIZE {
            if idx != from
                && idx != to
                && new.is_empty(idx)
                && former.owner_of(idx) != new.owner_of(idx)
            {
                former_figure = former.piece_at(idx).map(|p| p.kind);
            }
        }
    }

    ServerMessage::Movement {
        who: mover,
        moved_figure,
        from_field: from,
        to_field: to,
        former_figure,
        switched,
        new_figure,
    }
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(c),
        }
    }
    out
}
