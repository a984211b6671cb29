use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::sync::mpsc::UnboundedSender;

use crate::registry::{ConnectionId, Registry, DEFAULT_ROOM};
use crate::AppResult;

use super::msg::{Message, ServerEvent, Signal};

pub const HISTORY_CAP: usize = 50;

#[derive(Default)]
struct Room {
    history: VecDeque<Arc<Message>>,
}

/// Everything a fan-out decision reads or a message acceptance mutates.
/// Guarded by one mutex so that a history snapshot and the registry
/// insertion it pairs with are atomic with respect to concurrent writers.
#[derive(Default)]
struct Shared {
    registry: Registry,
    rooms: HashMap<String, Room>,
}

/// Delivery target for an accepted event. Chat goes to the whole room,
/// sender included; signaling goes to every other live connection and is
/// intentionally not room-scoped (the deployment assumes at most one
/// active call), even though that would misroute under multiple rooms.
enum Fanout<'a> {
    Room(&'a str),
    AllExcept(ConnectionId),
}

impl Shared {
    fn history_frame(&self, room: &str) -> AppResult<String> {
        let snapshot: Vec<Arc<Message>> = self
            .rooms
            .get(room)
            .map(|r| r.history.iter().cloned().collect())
            .unwrap_or_default();
        Ok(serde_json::to_string(&ServerEvent::MessageHistory(snapshot))?)
    }

    fn fan_out(&self, target: Fanout<'_>, event: &ServerEvent) -> AppResult<()> {
        let frame = serde_json::to_string(event)?;
        match target {
            Fanout::Room(room) => {
                for conn in self.registry.members(room) {
                    conn.push(frame.clone());
                }
            }
            Fanout::AllExcept(exclude) => {
                for conn in self.registry.all_except(exclude) {
                    conn.push(frame.clone());
                }
            }
        }
        Ok(())
    }
}

pub struct RelayEngine {
    shared: Mutex<Shared>,
}

impl RelayEngine {
    pub fn new() -> Self {
        Self {
            shared: Mutex::new(Shared::default()),
        }
    }

    /// Admits a connection and queues its room's history snapshot, both
    /// under the lock: nothing accepted afterwards can precede the
    /// snapshot or go missing between snapshot and subscription.
    pub async fn connect(&self, outbound: UnboundedSender<String>) -> AppResult<ConnectionId> {
        let mut shared = self.shared.lock().await;
        let snapshot = shared.history_frame(DEFAULT_ROOM)?;
        let id = shared.registry.admit(outbound);
        if let Some(conn) = shared.registry.get(id) {
            conn.push(snapshot);
        }
        Ok(id)
    }

    /// One-room deployment: the requested name is accepted but ignored;
    /// the only effect is re-delivery of the history snapshot.
    pub async fn join_room(&self, id: ConnectionId, requested: &str) -> AppResult<()> {
        let shared = self.shared.lock().await;
        let Some(conn) = shared.registry.get(id) else {
            return Ok(());
        };
        tracing::debug!(%id, requested, pinned = conn.room, "join-room");
        let snapshot = shared.history_frame(&conn.room)?;
        conn.push(snapshot);
        Ok(())
    }

    /// Validates, stores, and broadcasts a chat message. Malformed
    /// payloads are dropped without a reply to the sender.
    pub async fn submit_message(&self, id: ConnectionId, payload: &serde_json::Value) -> AppResult<()> {
        let msg = match Message::parse(payload) {
            Ok(msg) => Arc::new(msg),
            Err(reason) => {
                tracing::debug!(%id, %reason, "dropping chat message");
                return Ok(());
            }
        };

        let mut shared = self.shared.lock().await;
        // placement follows the connection's pinned room, not the payload's
        // room field
        let Some(room) = shared.registry.get(id).map(|c| c.room.clone()) else {
            return Ok(());
        };

        {
            let history = &mut shared.rooms.entry(room.clone()).or_default().history;
            history.push_back(msg.clone());
            if history.len() > HISTORY_CAP {
                history.pop_front();
            }
        }

        shared.fan_out(Fanout::Room(&room), &ServerEvent::ChatMessage(msg))
    }

    /// Relays a signaling payload verbatim to every other live connection.
    /// Never validated, never stored.
    pub async fn submit_signal(&self, id: ConnectionId, signal: Signal) -> AppResult<()> {
        let shared = self.shared.lock().await;
        shared.fan_out(Fanout::AllExcept(id), &signal.into_event())
    }

    /// Removes the connection from all future fan-out. No notification is
    /// sent to peers.
    pub async fn disconnect(&self, id: ConnectionId) {
        self.shared.lock().await.registry.remove(id);
    }
}

impl Default for RelayEngine {
    fn default() -> Self {
        Self::new()
    }
}
