//! Event names and client control frames.

use serde::Deserialize;

/// Server-to-client notification delivery
pub const NOTIFICATION: &str = "notification";
/// Message posted to a conversation room
pub const CONVERSATION_MESSAGE: &str = "conversation:message";
pub const CONVERSATION_JOIN: &str = "conversation:join";
pub const CONVERSATION_LEAVE: &str = "conversation:leave";
pub const CONVERSATION_CHANGE: &str = "conversation:change";

// == Control Event ==
/// Conversation-room control frames a client may send once authenticated.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ControlEvent {
    #[serde(rename = "conversation:join", rename_all = "camelCase")]
    JoinConversation { conversation_id: String },

    #[serde(rename = "conversation:leave", rename_all = "camelCase")]
    LeaveConversation { conversation_id: String },

    /// Leave `from` (if any) and join `to` in one step
    #[serde(rename = "conversation:change")]
    ChangeConversation {
        #[serde(default)]
        from: Option<String>,
        to: String,
    },
}

impl ControlEvent {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn event_name(&self) -> &'static str {
        match self {
            ControlEvent::JoinConversation { .. } => CONVERSATION_JOIN,
            ControlEvent::LeaveConversation { .. } => CONVERSATION_LEAVE,
            ControlEvent::ChangeConversation { .. } => CONVERSATION_CHANGE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_join() {
        let event =
            ControlEvent::parse(r#"{"event":"conversation:join","data":{"conversationId":"c1"}}"#)
                .unwrap();
        assert_eq!(
            event,
            ControlEvent::JoinConversation {
                conversation_id: "c1".into()
            }
        );
    }

    #[test]
    fn test_parse_change_without_from() {
        let event =
            ControlEvent::parse(r#"{"event":"conversation:change","data":{"to":"c2"}}"#).unwrap();
        assert_eq!(
            event,
            ControlEvent::ChangeConversation {
                from: None,
                to: "c2".into()
            }
        );
    }

    #[test]
    fn test_event_name_matches_wire_tag() {
        let event = ControlEvent::parse(
            r#"{"event":"conversation:leave","data":{"conversationId":"c1"}}"#,
        )
        .unwrap();
        assert_eq!(event.event_name(), CONVERSATION_LEAVE);
    }

    #[test]
    fn test_unknown_event_is_rejected() {
        assert!(ControlEvent::parse(r#"{"event":"notification","data":{}}"#).is_err());
        assert!(ControlEvent::parse("not json").is_err());
    }
}
