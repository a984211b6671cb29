use std::sync::Arc;

use axum::{debug_handler, extract::{State, WebSocketUpgrade}, response::IntoResponse};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use super::msg::{ClientEvent, Signal};
use super::RelayEngine;

#[debug_handler(state = crate::AppState)]
pub async fn relay_ws(
    State(engine): State<Arc<RelayEngine>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(async move |stream| {
        let (mut sender, mut receiver) = stream.split();
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();

        // admission queues the history snapshot before anything else can
        // reach this channel
        let Ok(id) = engine.connect(tx).await else {
            return;
        };
        tracing::info!(%id, "client connected");

        let pump = tokio::spawn(async move {
            while let Some(frame) = rx.recv().await {
                if sender.send(frame.into()).await.is_err() {
                    break;
                }
            }
        });

        while let Some(Ok(frame)) = receiver.next().await {
            let Ok(event) = serde_json::from_slice(&frame.into_data()) else {
                tracing::debug!(%id, "ignoring undecodable frame");
                continue;
            };

            let res = match event {
                ClientEvent::JoinRoom { room } => engine.join_room(id, &room).await,
                ClientEvent::ChatMessage(payload) => engine.submit_message(id, &payload).await,
                ClientEvent::VideoOffer { sdp } => engine.submit_signal(id, Signal::Offer(sdp)).await,
                ClientEvent::VideoAnswer { sdp } => engine.submit_signal(id, Signal::Answer(sdp)).await,
                ClientEvent::IceCandidate { candidate } => {
                    engine.submit_signal(id, Signal::Candidate(candidate)).await
                }
            };
            if res.is_err() {
                break;
            }
        }

        engine.disconnect(id).await;
        tracing::info!(%id, "client disconnected");
        pump.abort();
    })
}
