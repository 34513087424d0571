//! Connection Registry
//!
//! Bidirectional live map between user ids and connection ids, backed by two
//! sharded `DashMap` indices so operations on distinct users never contend
//! on a single lock.

use std::collections::HashSet;
use std::fmt;

use dashmap::DashMap;
use serde::Serialize;
use tracing::debug;

use crate::auth::UserId;

// == Connection Id ==
/// Unique identifier for a transport connection (server-generated)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConnectionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

// == Connection ==
/// A resolved `(user, connection)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub user_id: UserId,
    pub connection_id: ConnectionId,
}

/// Lookup key for either direction of the registry.
#[derive(Debug, Clone, Copy)]
pub enum ConnectionKey<'a> {
    User(&'a str),
    Connection(&'a ConnectionId),
}

// == Displaced Connection Policy ==
/// What happens to the reverse entry of a connection displaced by a reconnect.
///
/// With `Retain`, after `add(u, c1)` then `add(u, c2)` the stale `c1 -> u`
/// entry stays resolvable until `c1` disconnects. With `Evict`, the second
/// add removes it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DisplacedConnectionPolicy {
    #[default]
    Retain,
    Evict,
}

// == Connection Registry ==
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    /// Forward index: the live connection of each user
    by_user: DashMap<UserId, ConnectionId>,
    /// Reverse index: the owner of each connection
    by_connection: DashMap<ConnectionId, UserId>,
    policy: DisplacedConnectionPolicy,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: DisplacedConnectionPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    pub fn policy(&self) -> DisplacedConnectionPolicy {
        self.policy
    }

    // == Add ==
    /// Makes `user_id -> connection_id` and `connection_id -> user_id` resolvable.
    ///
    /// Any previous connection of `user_id` is overwritten in the forward
    /// index; its reverse entry is handled according to the policy.
    pub fn add_connection(&self, user_id: UserId, connection_id: ConnectionId) {
        let displaced = self
            .by_user
            .insert(user_id.clone(), connection_id.clone());
        self.by_connection
            .insert(connection_id.clone(), user_id.clone());

        let Some(previous) = displaced.filter(|previous| *previous != connection_id) else {
            return;
        };

        match self.policy {
            DisplacedConnectionPolicy::Retain => {
                debug!(
                    user_id = %user_id,
                    previous = %previous,
                    current = %connection_id,
                    "Reconnect displaced a connection; reverse entry retained"
                );
            }
            DisplacedConnectionPolicy::Evict => {
                self.by_connection
                    .remove_if(&previous, |_, owner| *owner == user_id);
                debug!(
                    user_id = %user_id,
                    previous = %previous,
                    current = %connection_id,
                    "Reconnect displaced a connection; reverse entry evicted"
                );
            }
        }
    }

    // == Get ==
    /// Resolves either direction. A miss is a normal `None`.
    pub fn get_connection(&self, key: ConnectionKey<'_>) -> Option<Connection> {
        match key {
            ConnectionKey::User(user_id) => {
                let connection_id = self.by_user.get(user_id)?.value().clone();
                Some(Connection {
                    user_id: user_id.to_string(),
                    connection_id,
                })
            }
            ConnectionKey::Connection(connection_id) => {
                let user_id = self.by_connection.get(connection_id)?.value().clone();
                Some(Connection {
                    user_id,
                    connection_id: connection_id.clone(),
                })
            }
        }
    }

    // == Get All ==
    /// Returns every live user connection, optionally restricted to `filter`.
    pub fn get_all_connections(&self, filter: Option<&HashSet<UserId>>) -> Vec<Connection> {
        self.by_user
            .iter()
            .filter(|entry| filter.map_or(true, |ids| ids.contains(entry.key())))
            .map(|entry| Connection {
                user_id: entry.key().clone(),
                connection_id: entry.value().clone(),
            })
            .collect()
    }

    // == Remove ==
    /// Resolves the pair for `key` and removes both of its directions.
    ///
    /// The forward entry is only removed while it still points at the
    /// resolved connection, so a stale connection closing never unregisters
    /// the user's newer connection. Returns whether a pair was found.
    pub fn remove_associated_connection(&self, key: ConnectionKey<'_>) -> bool {
        let Some(connection) = self.get_connection(key) else {
            return false;
        };

        self.by_connection.remove(&connection.connection_id);
        self.by_user
            .remove_if(&connection.user_id, |_, current| {
                *current == connection.connection_id
            });

        debug!(
            user_id = %connection.user_id,
            connection_id = %connection.connection_id,
            "Connection removed from registry"
        );
        true
    }

    // == Remove All ==
    pub fn remove_all_connections(&self) {
        self.by_user.clear();
        self.by_connection.clear();
    }

    // == Length ==
    /// Number of users with a live connection.
    pub fn len(&self) -> usize {
        self.by_user.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_user.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn(id: &str) -> ConnectionId {
        ConnectionId::from(id)
    }

    #[test]
    fn test_connection_ids_are_unique() {
        assert_ne!(ConnectionId::new(), ConnectionId::new());
    }

    #[test]
    fn test_add_resolves_both_directions() {
        let registry = ConnectionRegistry::new();
        registry.add_connection("u1".into(), conn("c1"));

        let expected = Connection {
            user_id: "u1".into(),
            connection_id: conn("c1"),
        };
        assert_eq!(registry.get_connection(ConnectionKey::User("u1")), Some(expected.clone()));
        assert_eq!(
            registry.get_connection(ConnectionKey::Connection(&conn("c1"))),
            Some(expected)
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_remove_by_connection_clears_user_lookup() {
        let registry = ConnectionRegistry::new();
        registry.add_connection("u1".into(), conn("c1"));

        assert!(registry.remove_associated_connection(ConnectionKey::Connection(&conn("c1"))));

        assert_eq!(registry.get_connection(ConnectionKey::User("u1")), None);
        assert_eq!(registry.get_connection(ConnectionKey::Connection(&conn("c1"))), None);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_remove_by_user() {
        let registry = ConnectionRegistry::new();
        registry.add_connection("u1".into(), conn("c1"));

        assert!(registry.remove_associated_connection(ConnectionKey::User("u1")));
        assert_eq!(registry.get_connection(ConnectionKey::Connection(&conn("c1"))), None);
    }

    #[test]
    fn test_remove_missing_returns_false() {
        let registry = ConnectionRegistry::new();
        assert!(!registry.remove_associated_connection(ConnectionKey::User("ghost")));
        assert!(!registry.remove_associated_connection(ConnectionKey::Connection(&conn("c9"))));
    }

    #[test]
    fn test_reconnect_retains_stale_reverse_entry_by_default() {
        let registry = ConnectionRegistry::new();
        registry.add_connection("u1".into(), conn("c1"));
        registry.add_connection("u1".into(), conn("c2"));

        let current = registry.get_connection(ConnectionKey::User("u1")).unwrap();
        assert_eq!(current.connection_id, conn("c2"));

        // Stale mapping: the displaced connection still resolves to its user
        let stale = registry
            .get_connection(ConnectionKey::Connection(&conn("c1")))
            .unwrap();
        assert_eq!(stale.user_id, "u1");
    }

    #[test]
    fn test_stale_disconnect_keeps_newer_connection() {
        let registry = ConnectionRegistry::new();
        registry.add_connection("u1".into(), conn("c1"));
        registry.add_connection("u1".into(), conn("c2"));

        assert!(registry.remove_associated_connection(ConnectionKey::Connection(&conn("c1"))));

        let current = registry.get_connection(ConnectionKey::User("u1")).unwrap();
        assert_eq!(current.connection_id, conn("c2"));
        assert_eq!(registry.get_connection(ConnectionKey::Connection(&conn("c1"))), None);
    }

    #[test]
    fn test_reconnect_evicts_stale_reverse_entry_when_configured() {
        let registry = ConnectionRegistry::with_policy(DisplacedConnectionPolicy::Evict);
        registry.add_connection("u1".into(), conn("c1"));
        registry.add_connection("u1".into(), conn("c2"));

        assert_eq!(registry.get_connection(ConnectionKey::Connection(&conn("c1"))), None);
        assert_eq!(
            registry
                .get_connection(ConnectionKey::Connection(&conn("c2")))
                .map(|c| c.user_id),
            Some("u1".to_string())
        );
    }

    #[test]
    fn test_readding_same_connection_is_not_a_displacement() {
        let registry = ConnectionRegistry::with_policy(DisplacedConnectionPolicy::Evict);
        registry.add_connection("u1".into(), conn("c1"));
        registry.add_connection("u1".into(), conn("c1"));

        assert!(registry.get_connection(ConnectionKey::Connection(&conn("c1"))).is_some());
    }

    #[test]
    fn test_get_all_connections_with_filter() {
        let registry = ConnectionRegistry::new();
        registry.add_connection("u1".into(), conn("c1"));
        registry.add_connection("u2".into(), conn("c2"));
        registry.add_connection("u3".into(), conn("c3"));

        assert_eq!(registry.get_all_connections(None).len(), 3);

        let filter: HashSet<UserId> = ["u1".to_string(), "u3".to_string(), "u9".to_string()].into();
        let mut users: Vec<UserId> = registry
            .get_all_connections(Some(&filter))
            .into_iter()
            .map(|c| c.user_id)
            .collect();
        users.sort();
        assert_eq!(users, vec!["u1".to_string(), "u3".to_string()]);
    }

    #[test]
    fn test_remove_all_connections() {
        let registry = ConnectionRegistry::new();
        registry.add_connection("u1".into(), conn("c1"));
        registry.add_connection("u2".into(), conn("c2"));

        registry.remove_all_connections();

        assert!(registry.is_empty());
        assert!(registry.get_all_connections(None).is_empty());
        assert_eq!(registry.get_connection(ConnectionKey::Connection(&conn("c2"))), None);
    }

    #[test]
    fn test_concurrent_distinct_users() {
        let registry = std::sync::Arc::new(ConnectionRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    for j in 0..100 {
                        let user = format!("u{}-{}", i, j);
                        registry.add_connection(user.clone(), ConnectionId::new());
                        if j % 2 == 0 {
                            registry.remove_associated_connection(ConnectionKey::User(&user));
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(registry.len(), 8 * 50);
    }
}
