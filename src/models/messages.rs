use actix::Message;
use serde::{Deserialize, Serialize, Serializer};

use crate::game::board::{Board, Color, PieceKind};
use crate::game::state::DefeatedTallies;

/// Message sent from client to server, tagged by the `action` field.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClientAction {
    MapRequest,
    Turn { from: u8, to: u8 },
    UserMsg { msg: String, from: Color },
    UserGaveUp { user: Color },
}

/// Message sent from server to client. Field names are fixed wire format;
/// empty piece kinds and colors serialize as `""`.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ServerMessage {
    Ready {
        color: Color,
    },
    MapDelivery {
        active_user: Color,
        /// The recipient's own color.
        color: Color,
        map: Vec<MapField>,
        defeated: DefeatedTallies,
    },
    Movement {
        who: Color,
        moved_figure: PieceKind,
        from_field: u8,
        to_field: u8,
        #[serde(serialize_with = "kind_or_empty")]
        former_figure: Option<PieceKind>,
        switched: bool,
        #[serde(serialize_with = "kind_or_empty")]
        new_figure: Option<PieceKind>,
    },
    Check {
        from: Color,
        checked: u8,
        checkers: Vec<u8>,
    },
    Checkmate {
        from: Color,
        checked: u8,
        checkers: Vec<u8>,
    },
    Gameover {
        winner: Color,
        stats: GameStats,
    },
    Warning {
        msg: String,
    },
    Error {
        msg: String,
    },
    Info {
        msg: String,
    },
    UserMsg {
        msg: String,
        from: Color,
    },
    UserGaveUp {
        user: Color,
    },
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct GameStats {
    pub turns: u32,
}

/// One square in a `map_delivery` payload.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct MapField {
    #[serde(rename = "type", serialize_with = "kind_or_empty")]
    pub kind: Option<PieceKind>,
    #[serde(serialize_with = "color_or_empty")]
    pub origin: Option<Color>,
}

/// Serializes the full board into the 64-entry wire map.
pub fn map_of(board: &Board) -> Vec<MapField> {
    board
        .cells()
        .map(|(_, cell)| MapField {
            kind: cell.map(|p| p.kind),
            origin: cell.map(|p| p.owner),
        })
        .collect()
}

fn kind_or_empty<S: Serializer>(kind: &Option<PieceKind>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(kind.map_or("", PieceKind::letter))
}

fn color_or_empty<S: Serializer>(color: &Option<Color>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(color.map_or("", Color::as_str))
}

/// Serialized server message addressed to one session actor.
#[derive(Message)]
#[rtype(result = "()")]
pub struct OutboundText(pub String);

/// Instructs a session actor to close its connection, used when a match
/// resets after the peer disconnected.
#[derive(Message)]
#[rtype(result = "()")]
pub struct CloseConnection;
