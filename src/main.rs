use std::env;
use std::time::Duration;

use actix_web::{web, App, HttpServer};
use log::info;

use chess_server::models::app_state::AppState;
use chess_server::routes;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let app_state = web::Data::new(AppState::new());
    let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
    info!("starting server on {bind_addr}");

    // Match lifecycle ticker: announces ready once a match fills up.
    let ticker_state = app_state.clone();
    actix_rt::spawn(async move {
        let mut interval = actix_rt::time::interval(Duration::from_millis(500));
        loop {
            interval.tick().await;
            let out = ticker_state.dispatcher.lock().unwrap().on_tick();
            ticker_state.deliver(out);
        }
    });

    HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .configure(routes::config)
    })
    .bind(&bind_addr)?
    .run()
    .await
}
