use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One turn of a user's conversation log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: ConversationRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationRole {
    User,
    Assistant,
}

impl ConversationRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationRole::User => "user",
            ConversationRole::Assistant => "assistant",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(ConversationRole::User),
            "assistant" => Some(ConversationRole::Assistant),
            _ => None,
        }
    }
}

impl ConversationMessage {
    pub fn new(role: ConversationRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_str() {
        assert_eq!(
            ConversationRole::parse(ConversationRole::User.as_str()),
            Some(ConversationRole::User)
        );
        assert_eq!(
            ConversationRole::parse(ConversationRole::Assistant.as_str()),
            Some(ConversationRole::Assistant)
        );
        assert_eq!(ConversationRole::parse("system"), None);
    }

    #[test]
    fn new_sets_timestamp() {
        let before = Utc::now();
        let msg = ConversationMessage::new(ConversationRole::User, "hello");
        let after = Utc::now();

        assert_eq!(msg.content, "hello");
        assert_eq!(msg.role, ConversationRole::User);
        assert!(msg.timestamp >= before && msg.timestamp <= after);
    }
}
