mod engine;
mod msg;
mod ws;

pub use engine::{RelayEngine, HISTORY_CAP};
pub use msg::{ClientEvent, Message, MessageBody, Rejection, ServerEvent, Signal};

use axum::{routing::get, Router};

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/ws", get(ws::relay_ws))
}
