use actix_files as fs;
use actix_web::web;

use crate::websocket::handler::ws_index;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.route("/ws", web::get().to(ws_index))
        .service(fs::Files::new("/", "./static").index_file("index.html"));
}
