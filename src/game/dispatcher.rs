//! Routing between live connections and matches: new connections fill the
//! first open seat, raw frames are decoded and handed to the owning match,
//! and abandoned matches are torn down.

use std::collections::HashMap;

use log::{info, warn};
use uuid::Uuid;

use crate::game::coordinator::{Match, Outbound};
use crate::game::ConnId;
use crate::models::messages::ClientAction;

pub type MatchId = Uuid;

#[derive(Debug, Default)]
pub struct Dispatcher {
    matches: HashMap<MatchId, Match>,
    clients: HashMap<ConnId, MatchId>,
}

impl Dispatcher {
    pub fn new() -> Dispatcher {
        Dispatcher {
            matches: HashMap::new(),
            clients: HashMap::new(),
        }
    }

    pub fn match_count(&self) -> usize {
        self.matches.len()
    }

    pub fn match_of(&self, conn: ConnId) -> Option<&Match> {
        self.matches.get(self.clients.get(&conn)?)
    }

    pub fn match_of_mut(&mut self, conn: ConnId) -> Option<&mut Match> {
        self.matches.get_mut(self.clients.get(&conn)?)
    }

    /// Seats a new connection in the first match with an open slot, opening
    /// a fresh match when every existing one is full.
    pub fn on_connect(&mut self, conn: ConnId) -> MatchId {
        for (id, game) in self.matches.iter_mut() {
            if !game.is_full() {
                game.add_connection(conn);
                self.clients.insert(conn, *id);
                info!("connection {conn} joined match {id}");
                return *id;
            }
        }
        let id = Uuid::new_v4();
        let mut game = Match::new();
        game.add_connection(conn);
        self.matches.insert(id, game);
        self.clients.insert(conn, id);
        info!("connection {conn} opened match {id}");
        id
    }

    /// Unseats a connection. A match that already saw both players is reset
    /// once either side leaves, closing the remaining connection.
    pub fn on_disconnect(&mut self, conn: ConnId) -> Vec<Outbound> {
        let Some(match_id) = self.clients.remove(&conn) else {
            return Vec::new();
        };
        let Some(game) = self.matches.get_mut(&match_id) else {
            return Vec::new();
        };
        game.remove_connection(conn);

        let mut out = Vec::new();
        if game.has_been_active() && game.slot_count() < 2 {
            out = game.reset();
            for directive in &out {
                if let Outbound::Close { conn } = directive {
                    self.clients.remove(conn);
                }
            }
            info!("match {match_id} reset after a disconnect");
        }
        if game.slot_count() == 0 {
            self.matches.remove(&match_id);
            info!("match {match_id} removed");
        }
        out
    }

    /// Decodes one inbound text frame and lets the owning match act on it.
    /// Malformed frames are logged and dropped.
    pub fn on_data(&mut self, conn: ConnId, text: &str) -> Vec<Outbound> {
        let action: ClientAction = match serde_json::from_str(text) {
            Ok(action) => action,
            Err(err) => {
                warn!("dropping malformed frame from {conn}: {err}");
                return Vec::new();
            }
        };
        match self.match_of_mut(conn) {
            Some(game) => game.handle_action(conn, action),
            None => Vec::new(),
        }
    }

    /// Drives the periodic step of every match.
    pub fn on_tick(&mut self) -> Vec<Outbound> {
        let mut out = Vec::new();
        for game in self.matches.values_mut() {
            out.extend(game.step());
        }
        out
    }
}
