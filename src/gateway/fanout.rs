//! Room Fan-out Gateway
//!
//! Lifecycle hooks that join authenticated connections to their rooms and
//! keep the connection registry current, plus the broadcast operations
//! callers use to notify users.
//!
//! Two delivery paths exist on purpose:
//! - registry-based (`emit_to_users`): resolves each user to the single
//!   connection the registry knows about; unknown users are skipped;
//! - room-based (`emit_to_*_room*`): delivers to whatever the transport has
//!   joined to the room, which covers every connection a user has open and
//!   may diverge from the registry.
//!
//! All emits are fire-and-forget and return only how many connections the
//! transport accepted the event for.
//!
//! Conversation rooms are joined on client request; every join is checked
//! against a [`ConversationAuthorizer`] for the user the registry holds for
//! the requesting connection.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::auth::{ConversationAuthorizer, Identity, OpenConversations};
use crate::error::LookupError;
use crate::gateway::events::ControlEvent;
use crate::gateway::gate::GatewayHooks;
use crate::lookup::CampusAdminLookup;
use crate::registry::{ConnectionId, ConnectionKey, ConnectionRegistry};
use crate::transport::{RoomId, RoomTransport};

/// Rooms an authenticated identity is joined to on connect.
pub fn rooms_for(identity: &Identity) -> Vec<RoomId> {
    let mut rooms = vec![RoomId::user_global(), RoomId::user(&identity.id)];
    if let Some(campus_id) = identity.administered_campus() {
        rooms.push(RoomId::campus_global());
        rooms.push(RoomId::campus(campus_id));
    }
    rooms
}

/// Iterates `ids` in order, skipping repeats.
fn distinct<S: AsRef<str>>(ids: &[S]) -> impl Iterator<Item = &str> {
    let mut seen = HashSet::new();
    ids.iter()
        .map(AsRef::as_ref)
        .filter(move |id| seen.insert(*id))
}

// == Room Fan-out Gateway ==
pub struct RoomFanoutGateway {
    registry: Arc<ConnectionRegistry>,
    transport: Arc<dyn RoomTransport>,
    authorizer: Arc<dyn ConversationAuthorizer>,
}

impl RoomFanoutGateway {
    /// Creates a gateway whose conversation rooms are open to every
    /// authenticated user; see [`with_authorizer`](Self::with_authorizer).
    pub fn new(registry: Arc<ConnectionRegistry>, transport: Arc<dyn RoomTransport>) -> Self {
        Self {
            registry,
            transport,
            authorizer: Arc::new(OpenConversations),
        }
    }

    pub fn with_authorizer(mut self, authorizer: Arc<dyn ConversationAuthorizer>) -> Self {
        self.authorizer = authorizer;
        self
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    // == Registry-based delivery ==
    /// Sends to each user's registered connection. Users without a live
    /// connection are silently skipped.
    pub fn emit_to_users<S: AsRef<str>>(
        &self,
        user_ids: &[S],
        event: &str,
        payload: &Value,
    ) -> usize {
        let delivered = distinct(user_ids)
            .filter_map(|user_id| self.registry.get_connection(ConnectionKey::User(user_id)))
            .filter(|connection| self.transport.send_to(&connection.connection_id, event, payload))
            .count();

        debug!(event, targets = user_ids.len(), delivered, "Emitted to users");
        delivered
    }

    /// Resolves the admins of `campus_id` and sends to their connections.
    pub async fn emit_to_campus_admins(
        &self,
        lookup: &CampusAdminLookup,
        campus_id: &str,
        event: &str,
        payload: &Value,
    ) -> Result<usize, LookupError> {
        let admins = lookup.admins_of(campus_id).await?;
        Ok(self.emit_to_users(&admins, event, payload))
    }

    // == Room-based delivery ==
    pub fn emit_to_global_user_room(&self, event: &str, payload: &Value) -> usize {
        self.emit_to_room(&RoomId::user_global(), event, payload)
    }

    pub fn emit_to_specific_user_rooms<S: AsRef<str>>(
        &self,
        user_ids: &[S],
        event: &str,
        payload: &Value,
    ) -> usize {
        distinct(user_ids)
            .map(|user_id| self.emit_to_room(&RoomId::user(user_id), event, payload))
            .sum()
    }

    pub fn emit_to_global_campus_room(&self, event: &str, payload: &Value) -> usize {
        self.emit_to_room(&RoomId::campus_global(), event, payload)
    }

    pub fn emit_to_campus_specific_rooms<S: AsRef<str>>(
        &self,
        campus_ids: &[S],
        event: &str,
        payload: &Value,
    ) -> usize {
        distinct(campus_ids)
            .map(|campus_id| self.emit_to_room(&RoomId::campus(campus_id), event, payload))
            .sum()
    }

    pub fn emit_to_conversation(
        &self,
        conversation_id: &str,
        event: &str,
        payload: &Value,
    ) -> usize {
        self.emit_to_room(&RoomId::conversation(conversation_id), event, payload)
    }

    fn emit_to_room(&self, room: &RoomId, event: &str, payload: &Value) -> usize {
        let delivered = self.transport.broadcast(room, event, payload);
        debug!(room = %room, event, delivered, "Emitted to room");
        delivered
    }

    // == Client control ==
    /// Applies a conversation-room control frame sent by `connection`.
    ///
    /// Joins require the connection to resolve to a registered user whom the
    /// authorizer admits to the target conversation. A denied
    /// `ChangeConversation` leaves the current room untouched. Returns whether
    /// the frame was applied.
    pub async fn handle_control(&self, connection: &ConnectionId, control: ControlEvent) -> bool {
        match control {
            ControlEvent::JoinConversation { conversation_id } => {
                if !self.may_join(connection, &conversation_id).await {
                    return false;
                }
                self.transport.join(connection, &RoomId::conversation(&conversation_id));
            }
            ControlEvent::LeaveConversation { conversation_id } => {
                self.transport.leave(connection, &RoomId::conversation(&conversation_id));
            }
            ControlEvent::ChangeConversation { from, to } => {
                if !self.may_join(connection, &to).await {
                    return false;
                }
                if let Some(from) = from {
                    self.transport.leave(connection, &RoomId::conversation(&from));
                }
                self.transport.join(connection, &RoomId::conversation(&to));
            }
        }
        true
    }

    async fn may_join(&self, connection: &ConnectionId, conversation_id: &str) -> bool {
        let Some(owner) = self.registry.get_connection(ConnectionKey::Connection(connection))
        else {
            debug!(connection_id = %connection, "Join from unregistered connection ignored");
            return false;
        };

        let allowed = self.authorizer.can_join(&owner.user_id, conversation_id).await;
        if !allowed {
            warn!(
                connection_id = %connection,
                user_id = %owner.user_id,
                conversation_id,
                "Conversation join denied"
            );
        }
        allowed
    }
}

impl GatewayHooks for RoomFanoutGateway {
    fn on_init(&self, _transport: &Arc<dyn RoomTransport>) {
        info!("Room fan-out gateway ready");
    }

    fn on_connect(&self, connection: &ConnectionId, identity: &Identity) {
        self.registry.add_connection(identity.id.clone(), connection.clone());

        let rooms = rooms_for(identity);
        for room in &rooms {
            self.transport.join(connection, room);
        }
        debug!(
            connection_id = %connection,
            user_id = %identity.id,
            rooms = rooms.len(),
            "Joined rooms"
        );
    }

    fn on_disconnect(&self, connection: &ConnectionId) {
        // Room memberships are dropped by the transport when the socket closes
        self.registry.remove_associated_connection(ConnectionKey::Connection(connection));
    }
}
