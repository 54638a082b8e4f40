use std::collections::HashMap;
use std::sync::Mutex;

use actix::Addr;
use log::warn;

use crate::game::coordinator::Outbound;
use crate::game::dispatcher::Dispatcher;
use crate::game::ConnId;
use crate::models::messages::{CloseConnection, OutboundText};
use crate::websocket::handler::ChessSession;

/// Shared server state: the match dispatcher plus the registry of live
/// session actors it delivers to.
pub struct AppState {
    pub dispatcher: Mutex<Dispatcher>,
    pub sessions: Mutex<HashMap<ConnId, Addr<ChessSession>>>,
}

impl AppState {
    pub fn new() -> AppState {
        AppState {
            dispatcher: Mutex::new(Dispatcher::new()),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn register(&self, conn: ConnId, addr: Addr<ChessSession>) {
        self.sessions.lock().unwrap().insert(conn, addr);
    }

    pub fn deregister(&self, conn: ConnId) {
        self.sessions.lock().unwrap().remove(&conn);
    }

    /// Encodes and ships dispatcher directives to the live sessions.
    /// Call with the dispatcher lock already released.
    pub fn deliver(&self, directives: Vec<Outbound>) {
        if directives.is_empty() {
            return;
        }
        let sessions = self.sessions.lock().unwrap();
        for directive in directives {
            match directive {
                Outbound::Send { to, msg } => {
                    let Some(addr) = sessions.get(&to) else {
                        continue;
                    };
                    match serde_json::to_string(&msg) {
                        Ok(text) => addr.do_send(OutboundText(text)),
                        Err(err) => warn!("failed to encode message for {to}: {err}"),
                    }
                }
                Outbound::Close { conn } => {
                    if let Some(addr) = sessions.get(&conn) {
                        addr.do_send(CloseConnection);
                    }
                }
            }
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
