//! Authenticated Transport Gate
//!
//! Connection lifecycle state machine. Every inbound connection starts
//! `Pending`; it becomes `Authenticated` once its bearer credential verifies,
//! or `Rejected` (and is force-closed) otherwise. Both paths end `Closed`
//! when the transport reports the disconnect.
//!
//! ```text
//! Pending ──verify ok──▶ Authenticated ──disconnect──▶ Closed
//!    └──missing/invalid──▶ Rejected ──disconnect──▶ Closed
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::http::{header::AUTHORIZATION, HeaderMap};
use dashmap::DashMap;
use tracing::{debug, info, warn};

use crate::auth::{AuthService, Identity};
use crate::error::AuthError;
use crate::registry::ConnectionId;
use crate::transport::RoomTransport;

/// Query parameter carrying the bearer credential.
pub const TOKEN_QUERY_PARAM: &str = "token";

// == Connection State ==
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Pending,
    Authenticated,
    Rejected,
    Closed,
}

// == Handshake ==
/// Credential sources captured from the upgrade request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Handshake {
    pub query_token: Option<String>,
    pub authorization: Option<String>,
}

impl Handshake {
    pub fn from_parts(query: &HashMap<String, String>, headers: &HeaderMap) -> Self {
        Self {
            query_token: query.get(TOKEN_QUERY_PARAM).cloned(),
            authorization: headers
                .get(AUTHORIZATION)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string),
        }
    }

    /// Extracts the bearer credential. The query parameter wins over the
    /// `Authorization: Bearer` header when both are present.
    pub fn credential(&self) -> Option<&str> {
        let from_query = self
            .query_token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty());

        from_query.or_else(|| {
            let header = self.authorization.as_deref()?.trim();
            let (scheme, token) = header.split_once(' ')?;
            let token = token.trim();
            (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
        })
    }
}

// == Lifecycle Hooks ==
/// Callbacks invoked by the gate. Every method defaults to a no-op.
pub trait GatewayHooks: Send + Sync {
    /// Called once at process start with the shared broadcast handle.
    fn on_init(&self, _transport: &Arc<dyn RoomTransport>) {}

    /// Called after a connection authenticates.
    fn on_connect(&self, _connection: &ConnectionId, _identity: &Identity) {}

    /// Called for every disconnect, whether or not the connection authenticated.
    fn on_disconnect(&self, _connection: &ConnectionId) {}
}

/// Hooks that do nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHooks;

impl GatewayHooks for NoopHooks {}

#[derive(Debug)]
struct Session {
    state: ConnectionState,
    identity: Option<Identity>,
}

// == Transport Gate ==
pub struct TransportGate {
    auth: Arc<dyn AuthService>,
    transport: Arc<dyn RoomTransport>,
    hooks: Arc<dyn GatewayHooks>,
    sessions: DashMap<ConnectionId, Session>,
    initialized: AtomicBool,
}

impl TransportGate {
    pub fn new(
        auth: Arc<dyn AuthService>,
        transport: Arc<dyn RoomTransport>,
        hooks: Arc<dyn GatewayHooks>,
    ) -> Self {
        Self {
            auth,
            transport,
            hooks,
            sessions: DashMap::new(),
            initialized: AtomicBool::new(false),
        }
    }

    pub fn transport(&self) -> &Arc<dyn RoomTransport> {
        &self.transport
    }

    // == Init ==
    /// Runs the `on_init` hook. Only the first call has any effect; returns
    /// whether this call ran it.
    pub fn init(&self) -> bool {
        if self
            .initialized
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        self.hooks.on_init(&self.transport);
        info!("Transport gate initialized");
        true
    }

    // == Connect ==
    /// Drives a new connection out of `Pending`.
    ///
    /// Authentication failures are logged and never surfaced: the transport
    /// is force-closed and no identity is left attached. If the connection
    /// disconnects while its credential is being verified, it ends `Closed`
    /// and `on_connect` is not invoked.
    pub async fn connect(
        &self,
        connection: ConnectionId,
        handshake: &Handshake,
    ) -> ConnectionState {
        self.sessions.insert(
            connection.clone(),
            Session {
                state: ConnectionState::Pending,
                identity: None,
            },
        );

        match self.authenticate(handshake).await {
            Ok(identity) => {
                match self.sessions.get_mut(&connection) {
                    Some(mut session) if session.state == ConnectionState::Pending => {
                        session.state = ConnectionState::Authenticated;
                        session.identity = Some(identity.clone());
                    }
                    _ => {
                        debug!(
                            connection_id = %connection,
                            "Connection closed during authentication"
                        );
                        return ConnectionState::Closed;
                    }
                }

                info!(
                    connection_id = %connection,
                    user_id = %identity.id,
                    role = identity.role.as_str(),
                    "Connection authenticated"
                );
                self.hooks.on_connect(&connection, &identity);
                ConnectionState::Authenticated
            }
            Err(e) => {
                warn!(connection_id = %connection, error = %e, "Rejecting connection");
                if let Some(mut session) = self.sessions.get_mut(&connection) {
                    session.state = ConnectionState::Rejected;
                    session.identity = None;
                }
                self.transport.disconnect(&connection);
                ConnectionState::Rejected
            }
        }
    }

    /// Extracts and verifies the handshake credential.
    pub async fn authenticate(&self, handshake: &Handshake) -> Result<Identity, AuthError> {
        let credential = handshake.credential().ok_or(AuthError::MissingCredential)?;
        self.auth.verify(credential).await
    }

    // == Disconnect ==
    /// Moves a connection to `Closed` and runs `on_disconnect` unconditionally.
    ///
    /// Returns the state the connection was in, `Closed` if it was unknown.
    pub fn disconnect(&self, connection: &ConnectionId) -> ConnectionState {
        let previous = self
            .sessions
            .remove(connection)
            .map_or(ConnectionState::Closed, |(_, session)| session.state);

        self.hooks.on_disconnect(connection);
        debug!(connection_id = %connection, previous = ?previous, "Connection closed");
        previous
    }

    /// Current state; connections that were never seen or already closed are `Closed`.
    pub fn state_of(&self, connection: &ConnectionId) -> ConnectionState {
        self.sessions
            .get(connection)
            .map_or(ConnectionState::Closed, |session| session.state)
    }

    pub fn identity_of(&self, connection: &ConnectionId) -> Option<Identity> {
        self.sessions
            .get(connection)
            .and_then(|session| session.identity.clone())
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}
