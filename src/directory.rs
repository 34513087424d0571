//! Static Directory
//!
//! File-backed implementation of [`AuthService`], [`RecordStore`] and
//! [`ConversationAuthorizer`] so the gateway can run without the rest of the
//! platform. Credentials are opaque tokens mapped to users, each with an
//! optional expiry. Only listed members may join a conversation; conversations
//! the directory does not list cannot be joined.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use anyhow::{bail, Context};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::debug;

use crate::auth::{AuthService, ConversationAuthorizer, Identity, RecordStore, Role, UserId};
use crate::error::{AuthError, LookupError};

#[derive(Debug, Deserialize)]
struct DirectoryFile {
    #[serde(default)]
    users: Vec<UserRecord>,
    #[serde(default)]
    conversations: Vec<ConversationRecord>,
}

#[derive(Debug, Deserialize)]
struct ConversationRecord {
    id: String,
    #[serde(default)]
    members: Vec<UserId>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserRecord {
    #[serde(flatten)]
    identity: Identity,
    #[serde(default)]
    tokens: Vec<TokenRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenRecord {
    token: String,
    #[serde(default)]
    expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
struct Grant {
    user_id: UserId,
    expires_at: Option<DateTime<Utc>>,
}

// == Static Directory ==
#[derive(Debug, Default)]
pub struct StaticDirectory {
    users: HashMap<UserId, Identity>,
    grants: HashMap<String, Grant>,
    conversations: HashMap<String, HashSet<UserId>>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a directory from a JSON file of the form
    /// `{ "users": [{ "id", "role", "campusId"?, "tokens": [{ "token", "expiresAt"? }] }],
    ///    "conversations": [{ "id", "members": [<user id>] }] }`.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read directory file {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("invalid directory file {}", path.display()))
    }

    pub fn from_json(raw: &str) -> anyhow::Result<Self> {
        let file: DirectoryFile = serde_json::from_str(raw)?;
        let mut directory = Self::new();

        for record in file.users {
            let identity = record.identity;
            match (identity.role, &identity.campus_id) {
                (Role::CampusAdmin, None) => {
                    bail!("campus admin {} has no campusId", identity.id)
                }
                (Role::Student | Role::SuperAdmin, Some(_)) => {
                    bail!("only campus admins may carry a campusId ({})", identity.id)
                }
                _ => {}
            }
            for token in record.tokens {
                directory.grant(token.token, &identity.id, token.expires_at);
            }
            directory.users.insert(identity.id.clone(), identity);
        }

        for conversation in file.conversations {
            if let Some(unknown) = conversation
                .members
                .iter()
                .find(|member| !directory.users.contains_key(*member))
            {
                bail!("conversation {} lists unknown member {}", conversation.id, unknown)
            }
            directory
                .conversations
                .insert(conversation.id, conversation.members.into_iter().collect());
        }

        Ok(directory)
    }

    /// Adds a user with a non-expiring token.
    pub fn with_user(mut self, identity: Identity, token: impl Into<String>) -> Self {
        self.grant(token.into(), &identity.id, None);
        self.users.insert(identity.id.clone(), identity);
        self
    }

    /// Lists a conversation and the users allowed to join it.
    pub fn with_conversation<I, S>(mut self, conversation_id: impl Into<String>, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<UserId>,
    {
        self.conversations.insert(
            conversation_id.into(),
            members.into_iter().map(Into::into).collect(),
        );
        self
    }

    /// Adds a token for an existing or future user.
    pub fn grant(&mut self, token: String, user_id: &str, expires_at: Option<DateTime<Utc>>) {
        self.grants.insert(
            token,
            Grant {
                user_id: user_id.to_string(),
                expires_at,
            },
        );
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }
}

#[async_trait]
impl AuthService for StaticDirectory {
    async fn verify(&self, credential: &str) -> Result<Identity, AuthError> {
        let grant = self
            .grants
            .get(credential)
            .ok_or_else(|| AuthError::InvalidCredential("unknown token".to_string()))?;

        if grant.expires_at.is_some_and(|expires_at| expires_at <= Utc::now()) {
            return Err(AuthError::Expired);
        }

        self.users
            .get(&grant.user_id)
            .cloned()
            .ok_or_else(|| AuthError::InvalidCredential("token owner no longer exists".to_string()))
    }
}

#[async_trait]
impl RecordStore for StaticDirectory {
    async fn find_user_ids_by_campus_and_role(
        &self,
        campus_id: &str,
        role: Role,
    ) -> Result<Vec<UserId>, LookupError> {
        let mut ids: Vec<UserId> = self
            .users
            .values()
            .filter(|identity| identity.role == role)
            .filter(|identity| identity.campus_id.as_deref() == Some(campus_id))
            .map(|identity| identity.id.clone())
            .collect();
        ids.sort();

        debug!(campus_id, role = role.as_str(), matches = ids.len(), "Directory lookup");
        Ok(ids)
    }
}

#[async_trait]
impl ConversationAuthorizer for StaticDirectory {
    async fn can_join(&self, user_id: &str, conversation_id: &str) -> bool {
        self.conversations
            .get(conversation_id)
            .is_some_and(|members| members.contains(user_id))
    }
}
