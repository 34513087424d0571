//! Room Transport
//!
//! The narrow interface the fan-out layer depends on (join, leave, broadcast,
//! direct send, force-close) and its WebSocket implementation. Each socket
//! is represented by an unbounded outbound channel drained by its socket
//! task; delivery is fire-and-forget.

use std::collections::HashSet;
use std::fmt;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error};

use crate::registry::ConnectionId;

// == Room Id ==
/// Name of a broadcast group. Rooms have no stored entity; membership lives
/// entirely inside the transport.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoomId(String);

impl RoomId {
    pub fn user_global() -> Self {
        Self("user:global".to_string())
    }

    pub fn user(user_id: &str) -> Self {
        Self(format!("user:{}", user_id))
    }

    pub fn campus_global() -> Self {
        Self("campus:global".to_string())
    }

    pub fn campus(campus_id: &str) -> Self {
        Self(format!("campus:{}", campus_id))
    }

    pub fn conversation(conversation_id: &str) -> Self {
        Self(format!("conversation:{}", conversation_id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// == Envelope ==
/// Wire frame in both directions: `{ "event": <name>, "data": <payload> }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl Envelope {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }
}

// == Outbound ==
/// Instruction for a socket task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// A serialized [`Envelope`]
    Frame(String),
    /// Close the socket without a response body
    Close,
}

// == Room Transport ==
/// Transport-native room membership and delivery.
pub trait RoomTransport: Send + Sync {
    fn join(&self, connection: &ConnectionId, room: &RoomId);

    fn leave(&self, connection: &ConnectionId, room: &RoomId);

    /// Hands the event to every member of `room`; returns how many accepted it.
    fn broadcast(&self, room: &RoomId, event: &str, payload: &Value) -> usize;

    /// Hands the event to one connection; returns whether it was accepted.
    fn send_to(&self, connection: &ConnectionId, event: &str, payload: &Value) -> bool;

    /// Force-closes a connection.
    fn disconnect(&self, connection: &ConnectionId);
}

fn encode(event: &str, payload: &Value) -> Option<String> {
    match serde_json::to_string(&Envelope::new(event, payload.clone())) {
        Ok(frame) => Some(frame),
        Err(e) => {
            error!(event, error = %e, "Failed to serialize outbound event");
            None
        }
    }
}

// == WebSocket Transport ==
/// Room membership and outbound channels for live WebSocket connections.
///
/// Sockets are attached when their task starts and detached when it ends;
/// detaching drops every room membership of the connection.
#[derive(Debug, Default)]
pub struct WsTransport {
    sockets: DashMap<ConnectionId, UnboundedSender<Outbound>>,
    rooms: DashMap<RoomId, HashSet<ConnectionId>>,
    memberships: DashMap<ConnectionId, HashSet<RoomId>>,
}

impl WsTransport {
    pub fn new() -> Self {
        Self::default()
    }

    // == Attach ==
    /// Registers the outbound channel of a newly opened socket.
    pub fn attach(&self, connection: ConnectionId, sender: UnboundedSender<Outbound>) {
        self.sockets.insert(connection, sender);
    }

    // == Detach ==
    /// Forgets a closed socket and tears down all of its room memberships.
    pub fn detach(&self, connection: &ConnectionId) {
        self.sockets.remove(connection);

        let Some((_, rooms)) = self.memberships.remove(connection) else {
            return;
        };
        for room in &rooms {
            self.remove_member(room, connection);
        }
        debug!(connection_id = %connection, rooms = rooms.len(), "Socket detached");
    }

    pub fn connection_count(&self) -> usize {
        self.sockets.len()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Number of connections currently joined to `room`.
    pub fn room_size(&self, room: &RoomId) -> usize {
        self.rooms.get(room).map_or(0, |members| members.len())
    }

    /// Rooms `connection` is joined to, sorted by name.
    pub fn rooms_of(&self, connection: &ConnectionId) -> Vec<RoomId> {
        let mut rooms: Vec<RoomId> = self
            .memberships
            .get(connection)
            .map(|rooms| rooms.iter().cloned().collect())
            .unwrap_or_default();
        rooms.sort();
        rooms
    }

    fn remove_member(&self, room: &RoomId, connection: &ConnectionId) {
        if let Some(mut members) = self.rooms.get_mut(room) {
            members.remove(connection);
        }
        self.rooms.remove_if(room, |_, members| members.is_empty());
    }

    fn deliver(&self, connection: &ConnectionId, outbound: Outbound) -> bool {
        let Some(sender) = self.sockets.get(connection) else {
            return false;
        };
        match sender.send(outbound) {
            Ok(()) => true,
            Err(_) => {
                debug!(connection_id = %connection, "Socket channel closed; event dropped");
                false
            }
        }
    }
}

impl RoomTransport for WsTransport {
    fn join(&self, connection: &ConnectionId, room: &RoomId) {
        if !self.sockets.contains_key(connection) {
            debug!(connection_id = %connection, room = %room, "Join ignored for unknown socket");
            return;
        }
        self.memberships
            .entry(connection.clone())
            .or_default()
            .insert(room.clone());
        self.rooms
            .entry(room.clone())
            .or_default()
            .insert(connection.clone());
    }

    fn leave(&self, connection: &ConnectionId, room: &RoomId) {
        if let Some(mut rooms) = self.memberships.get_mut(connection) {
            rooms.remove(room);
        }
        self.remove_member(room, connection);
    }

    fn broadcast(&self, room: &RoomId, event: &str, payload: &Value) -> usize {
        let members: Vec<ConnectionId> = match self.rooms.get(room) {
            Some(members) => members.iter().cloned().collect(),
            None => return 0,
        };
        let Some(frame) = encode(event, payload) else {
            return 0;
        };

        members
            .iter()
            .filter(|connection| self.deliver(connection, Outbound::Frame(frame.clone())))
            .count()
    }

    fn send_to(&self, connection: &ConnectionId, event: &str, payload: &Value) -> bool {
        match encode(event, payload) {
            Some(frame) => self.deliver(connection, Outbound::Frame(frame)),
            None => false,
        }
    }

    fn disconnect(&self, connection: &ConnectionId) {
        self.deliver(connection, Outbound::Close);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

    fn attached(transport: &WsTransport, id: &str) -> (ConnectionId, UnboundedReceiver<Outbound>) {
        let (tx, rx) = unbounded_channel();
        let connection = ConnectionId::from(id);
        transport.attach(connection.clone(), tx);
        (connection, rx)
    }

    fn frame(event: &str, data: Value) -> Outbound {
        Outbound::Frame(serde_json::to_string(&Envelope::new(event, data)).unwrap())
    }

    #[test]
    fn test_room_names() {
        assert_eq!(RoomId::user_global().as_str(), "user:global");
        assert_eq!(RoomId::user("42").as_str(), "user:42");
        assert_eq!(RoomId::campus_global().as_str(), "campus:global");
        assert_eq!(RoomId::campus("north").as_str(), "campus:north");
        assert_eq!(RoomId::conversation("c-7").to_string(), "conversation:c-7");
    }

    #[test]
    fn test_broadcast_reaches_room_members_only() {
        let transport = WsTransport::new();
        let (a, mut rx_a) = attached(&transport, "a");
        let (_b, mut rx_b) = attached(&transport, "b");
        let room = RoomId::user_global();

        transport.join(&a, &room);
        let delivered = transport.broadcast(&room, "notification", &json!({"n": 1}));

        assert_eq!(delivered, 1);
        assert_eq!(rx_a.try_recv().unwrap(), frame("notification", json!({"n": 1})));
        assert!(rx_b.try_recv().is_err());
    }

    #[test]
    fn test_leave_removes_membership_and_empty_room() {
        let transport = WsTransport::new();
        let (a, _rx) = attached(&transport, "a");
        let room = RoomId::campus("north");

        transport.join(&a, &room);
        assert_eq!(transport.room_size(&room), 1);

        transport.leave(&a, &room);
        assert_eq!(transport.room_size(&room), 0);
        assert_eq!(transport.room_count(), 0);
        assert!(transport.rooms_of(&a).is_empty());
    }

    #[test]
    fn test_detach_tears_down_all_rooms() {
        let transport = WsTransport::new();
        let (a, _rx_a) = attached(&transport, "a");
        let (b, _rx_b) = attached(&transport, "b");

        for room in [RoomId::user_global(), RoomId::user("u1")] {
            transport.join(&a, &room);
        }
        transport.join(&b, &RoomId::user_global());

        transport.detach(&a);

        assert_eq!(transport.connection_count(), 1);
        assert_eq!(transport.room_size(&RoomId::user_global()), 1);
        assert_eq!(transport.room_size(&RoomId::user("u1")), 0);
        assert!(!transport.send_to(&a, "notification", &Value::Null));
    }

    #[test]
    fn test_join_unknown_socket_is_ignored() {
        let transport = WsTransport::new();
        transport.join(&ConnectionId::from("ghost"), &RoomId::user_global());
        assert_eq!(transport.room_count(), 0);
    }

    #[test]
    fn test_closed_channel_is_not_counted() {
        let transport = WsTransport::new();
        let (a, rx_a) = attached(&transport, "a");
        transport.join(&a, &RoomId::user_global());
        drop(rx_a);

        assert_eq!(transport.broadcast(&RoomId::user_global(), "notification", &Value::Null), 0);
    }

    #[test]
    fn test_disconnect_sends_close() {
        let transport = WsTransport::new();
        let (a, mut rx_a) = attached(&transport, "a");

        transport.disconnect(&a);
        assert_eq!(rx_a.try_recv().unwrap(), Outbound::Close);
    }

    #[test]
    fn test_envelope_data_defaults_to_null() {
        let envelope: Envelope = serde_json::from_str(r#"{"event":"conversation:leave"}"#).unwrap();
        assert_eq!(envelope.data, Value::Null);
    }
}
