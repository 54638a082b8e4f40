pub mod board;
pub mod coordinator;
pub mod dispatcher;
pub mod rules;
pub mod state;

/// Identifier of one websocket connection.
pub type ConnId = uuid::Uuid;
