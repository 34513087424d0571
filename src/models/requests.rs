//! Request DTOs for the internal emit API
//!
//! Defines the structure of incoming HTTP request bodies.

use serde::Deserialize;
use serde_json::Value;

use crate::auth::{CampusId, UserId};
use crate::gateway::events::{CONVERSATION_MESSAGE, NOTIFICATION};

/// Maximum accepted length of an event name, in characters
pub const MAX_EVENT_LENGTH: usize = 128;

fn default_event() -> String {
    NOTIFICATION.to_string()
}

fn default_conversation_event() -> String {
    CONVERSATION_MESSAGE.to_string()
}

fn validate_event(event: &str) -> Option<String> {
    if event.trim().is_empty() {
        return Some("Event cannot be empty".to_string());
    }
    if event.chars().count() > MAX_EVENT_LENGTH {
        return Some(format!(
            "Event exceeds maximum length of {} characters",
            MAX_EVENT_LENGTH
        ));
    }
    None
}

/// Request body for POST /emit/users
///
/// # Fields
/// - `userIds`: Users whose registered connection should receive the event
/// - `event`: Event name (default: `notification`)
/// - `payload`: Arbitrary JSON payload (default: null)
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmitToUsersRequest {
    pub user_ids: Vec<UserId>,
    #[serde(default = "default_event")]
    pub event: String,
    #[serde(default)]
    pub payload: Value,
}

impl EmitToUsersRequest {
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        validate_event(&self.event)
    }
}

/// Request body for POST /emit/user-rooms
///
/// Absent or empty `userIds` targets the global user room.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmitToUserRoomsRequest {
    #[serde(default)]
    pub user_ids: Option<Vec<UserId>>,
    #[serde(default = "default_event")]
    pub event: String,
    #[serde(default)]
    pub payload: Value,
}

impl EmitToUserRoomsRequest {
    pub fn validate(&self) -> Option<String> {
        validate_event(&self.event)
    }
}

/// Request body for POST /emit/campus-rooms
///
/// Absent or empty `campusIds` targets the global campus room.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmitToCampusRoomsRequest {
    #[serde(default)]
    pub campus_ids: Option<Vec<CampusId>>,
    #[serde(default = "default_event")]
    pub event: String,
    #[serde(default)]
    pub payload: Value,
}

impl EmitToCampusRoomsRequest {
    pub fn validate(&self) -> Option<String> {
        validate_event(&self.event)
    }
}

/// Request body for POST /emit/campus-admins
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmitToCampusAdminsRequest {
    pub campus_id: CampusId,
    #[serde(default = "default_event")]
    pub event: String,
    #[serde(default)]
    pub payload: Value,
}

impl EmitToCampusAdminsRequest {
    pub fn validate(&self) -> Option<String> {
        if self.campus_id.trim().is_empty() {
            return Some("Campus id cannot be empty".to_string());
        }
        validate_event(&self.event)
    }
}

/// Request body for POST /emit/conversation
///
/// `event` defaults to `conversation:message`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmitToConversationRequest {
    pub conversation_id: String,
    #[serde(default = "default_conversation_event")]
    pub event: String,
    #[serde(default)]
    pub payload: Value,
}

impl EmitToConversationRequest {
    pub fn validate(&self) -> Option<String> {
        if self.conversation_id.trim().is_empty() {
            return Some("Conversation id cannot be empty".to_string());
        }
        validate_event(&self.event)
    }
}
