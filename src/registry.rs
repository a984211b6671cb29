use std::collections::HashMap;

use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

/// The only room in this deployment. Connections are pinned here no matter
/// what room a client asks for.
pub const DEFAULT_ROOM: &str = "general";

pub type ConnectionId = Uuid;

pub struct Connection {
    pub id: ConnectionId,
    pub room: String,
    outbound: UnboundedSender<String>,
}

impl Connection {
    /// Queues a frame for delivery. A closed peer channel is not an error
    /// here; the disconnect path removes the entry.
    pub fn push(&self, frame: String) {
        let _ = self.outbound.send(frame);
    }
}

#[derive(Default)]
pub struct Registry {
    connections: HashMap<ConnectionId, Connection>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a live connection in the default room. Always succeeds.
    pub fn admit(&mut self, outbound: UnboundedSender<String>) -> ConnectionId {
        let id = Uuid::now_v7();
        self.connections.insert(
            id,
            Connection {
                id,
                room: DEFAULT_ROOM.to_owned(),
                outbound,
            },
        );
        id
    }

    /// Unregisters a connection. Idempotent.
    pub fn remove(&mut self, id: ConnectionId) {
        self.connections.remove(&id);
    }

    pub fn get(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.get(&id)
    }

    pub fn members<'a>(&'a self, room: &'a str) -> impl Iterator<Item = &'a Connection> + 'a {
        self.connections.values().filter(move |c| c.room == room)
    }

    pub fn members_except<'a>(
        &'a self,
        room: &'a str,
        exclude: ConnectionId,
    ) -> impl Iterator<Item = &'a Connection> + 'a {
        self.members(room).filter(move |c| c.id != exclude)
    }

    /// Every live connection but one, regardless of room.
    pub fn all_except(&self, exclude: ConnectionId) -> impl Iterator<Item = &Connection> {
        self.connections.values().filter(move |c| c.id != exclude)
    }
}
