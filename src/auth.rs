//! Authentication Contracts
//!
//! Identity types and the collaborators the gateway consumes: an
//! authentication service that verifies bearer credentials, a record store
//! that answers "which users hold role R on campus C", and an authorizer for
//! conversation room membership.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, LookupError};

/// User ids are opaque strings handed out by the authentication service.
pub type UserId = String;

/// Campus ids are opaque strings from the record store.
pub type CampusId = String;

// == Role ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
    CampusAdmin,
    SuperAdmin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::CampusAdmin => "campus_admin",
            Role::SuperAdmin => "super_admin",
        }
    }
}

// == Identity ==
/// The verified owner of a connection.
///
/// `campus_id` is only present for [`Role::CampusAdmin`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id: UserId,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub campus_id: Option<CampusId>,
}

impl Identity {
    pub fn student(id: impl Into<UserId>) -> Self {
        Self {
            id: id.into(),
            role: Role::Student,
            campus_id: None,
        }
    }

    pub fn super_admin(id: impl Into<UserId>) -> Self {
        Self {
            id: id.into(),
            role: Role::SuperAdmin,
            campus_id: None,
        }
    }

    pub fn campus_admin(id: impl Into<UserId>, campus_id: impl Into<CampusId>) -> Self {
        Self {
            id: id.into(),
            role: Role::CampusAdmin,
            campus_id: Some(campus_id.into()),
        }
    }

    /// Returns the administered campus, if this identity is a campus admin.
    pub fn administered_campus(&self) -> Option<&str> {
        match self.role {
            Role::CampusAdmin => self.campus_id.as_deref(),
            _ => None,
        }
    }
}

// == Authentication Service ==
/// Verifies bearer credentials.
#[async_trait]
pub trait AuthService: Send + Sync {
    /// Resolves a credential to an identity. Fails on any invalid, unknown or
    /// expired credential.
    async fn verify(&self, credential: &str) -> Result<Identity, AuthError>;
}

// == Record Store ==
/// Read-only view of user records.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn find_user_ids_by_campus_and_role(
        &self,
        campus_id: &str,
        role: Role,
    ) -> Result<Vec<UserId>, LookupError>;
}

// == Conversation Authorizer ==
/// Decides whether a user may join a conversation room.
///
/// Room membership is otherwise unchecked: any authenticated socket could
/// listen to any conversation it names.
#[async_trait]
pub trait ConversationAuthorizer: Send + Sync {
    async fn can_join(&self, user_id: &str, conversation_id: &str) -> bool;
}

/// Authorizer admitting every user to every conversation.
#[derive(Debug, Default, Clone, Copy)]
pub struct OpenConversations;

#[async_trait]
impl ConversationAuthorizer for OpenConversations {
    async fn can_join(&self, _user_id: &str, _conversation_id: &str) -> bool {
        true
    }
}
