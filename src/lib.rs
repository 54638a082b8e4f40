pub mod game;
pub mod models;
pub mod routes;
pub mod websocket;
