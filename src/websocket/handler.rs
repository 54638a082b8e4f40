use actix::{Actor, ActorContext, AsyncContext, Handler, StreamHandler};
use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use log::{debug, info};
use uuid::Uuid;

use crate::game::ConnId;
use crate::models::app_state::AppState;
use crate::models::messages::{CloseConnection, OutboundText};

/// One websocket connection. All game logic lives behind the dispatcher;
/// the session only forwards frames and delivers directives.
pub struct ChessSession {
    pub id: ConnId,
    app_state: web::Data<AppState>,
}

impl ChessSession {
    pub fn new(app_state: web::Data<AppState>) -> ChessSession {
        ChessSession {
            id: Uuid::new_v4(),
            app_state,
        }
    }
}

impl Actor for ChessSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        self.app_state.register(self.id, ctx.address());
        let match_id = self.app_state.dispatcher.lock().unwrap().on_connect(self.id);
        info!("session {} connected to match {match_id}", self.id);
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        let out = self.app_state.dispatcher.lock().unwrap().on_disconnect(self.id);
        self.app_state.deregister(self.id);
        self.app_state.deliver(out);
        info!("session {} disconnected", self.id);
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for ChessSession {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(payload)) => ctx.pong(&payload),
            Ok(ws::Message::Text(text)) => {
                debug!("frame from {}: {}", self.id, text);
                let out = self.app_state.dispatcher.lock().unwrap().on_data(self.id, &text);
                self.app_state.deliver(out);
            }
            Ok(ws::Message::Close(reason)) => {
                ctx.close(reason);
                ctx.stop();
            }
            _ => {}
        }
    }
}

impl Handler<OutboundText> for ChessSession {
    type Result = ();

    fn handle(&mut self, msg: OutboundText, ctx: &mut Self::Context) {
        ctx.text(msg.0);
    }
}

impl Handler<CloseConnection> for ChessSession {
    type Result = ();

    fn handle(&mut self, _msg: CloseConnection, ctx: &mut Self::Context) {
        ctx.close(None);
        ctx.stop();
    }
}

pub async fn ws_index(
    req: HttpRequest,
    stream: web::Payload,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    ws::start(ChessSession::new(app_state), &req, stream)
}
