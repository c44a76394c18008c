//! Conversational support: history handling and reply extraction.

use serde::{Deserialize, Serialize};

use crate::reply::ModelReply;

/// How many past turns are sent to the model.
pub const HISTORY_LIMIT: usize = 10;

/// Returned to the user when generation fails.
pub const APOLOGY: &str = "I'm sorry, I couldn't process your message right now. Please try again later.";

/// Used when the model reply has neither `message` nor `response`.
pub const FALLBACK_REPLY: &str = "I'm not sure how to respond to that.";

/// Who wrote a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One turn of prior conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    /// Anything other than `"user"` counts as the assistant.
    #[serde(default)]
    pub sender: String,
    #[serde(default)]
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self { sender: "user".to_string(), content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { sender: "assistant".to_string(), content: content.into() }
    }

    pub fn role(&self) -> Role {
        if self.sender == "user" { Role::User } else { Role::Assistant }
    }
}

/// A chat message with its context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default = "default_user_name")]
    pub user_name: String,
    /// Emotion detected for the user, used to bias retrieval.
    #[serde(default)]
    pub emotion: Option<String>,
    #[serde(default)]
    pub chat_history: Vec<ChatTurn>,
}

fn default_user_name() -> String {
    "Patient".to_string()
}

impl ChatRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), user_name: default_user_name(), emotion: None, chat_history: Vec::new() }
    }

    pub fn with_emotion(mut self, emotion: impl Into<String>) -> Self {
        self.emotion = Some(emotion.into());
        self
    }

    pub fn with_history(mut self, history: Vec<ChatTurn>) -> Self {
        self.chat_history = history;
        self
    }

    /// The most recent [`HISTORY_LIMIT`] turns as `(role, content)`.
    pub fn recent_history(&self) -> Vec<(Role, &str)> {
        let skip = self.chat_history.len().saturating_sub(HISTORY_LIMIT);
        self.chat_history.iter().skip(skip).map(|turn| (turn.role(), turn.content.as_str())).collect()
    }
}

/// The assistant's answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub message: String,
    /// Set when generation failed; `message` is then [`APOLOGY`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// The full structured reply, when there is one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<ModelReply>,
    pub timestamp: String,
}

impl ChatResponse {
    /// Build the response from a gateway reply.
    pub fn from_reply(reply: ModelReply, timestamp: String) -> Self {
        if let Some(error) = reply.error_message() {
            return Self {
                message: APOLOGY.to_string(),
                error: Some(format!("Failed to generate response: {error}")),
                details: None,
                timestamp,
            };
        }
        let message = reply
            .get_str("message")
            .or_else(|| reply.get_str("response"))
            .unwrap_or(FALLBACK_REPLY)
            .to_string();
        Self { message, error: None, details: Some(reply), timestamp }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_keeps_the_last_ten_turns() {
        let history: Vec<ChatTurn> = (0..14)
            .map(|i| if i % 2 == 0 { ChatTurn::user(format!("u{i}")) } else { ChatTurn::assistant(format!("a{i}")) })
            .collect();
        let request = ChatRequest::new("hello").with_history(history);
        let recent = request.recent_history();
        assert_eq!(recent.len(), HISTORY_LIMIT);
        assert_eq!(recent[0], (Role::User, "u4"));
        assert_eq!(recent[9], (Role::Assistant, "a13"));
    }

    #[test]
    fn unknown_senders_are_the_assistant() {
        let turn: ChatTurn = serde_json::from_str(r#"{"sender": "bot", "content": "hi"}"#).unwrap();
        assert_eq!(turn.role(), Role::Assistant);
    }

    #[test]
    fn reply_text_prefers_message_then_response() {
        let reply = ModelReply::parse(r#"{"response": "from response"}"#);
        assert_eq!(ChatResponse::from_reply(reply, "t".into()).message, "from response");
        let reply = ModelReply::parse(r#"{"message": "m", "response": "r"}"#);
        assert_eq!(ChatResponse::from_reply(reply, "t".into()).message, "m");
        let reply = ModelReply::parse(r#"{"other": 1}"#);
        assert_eq!(ChatResponse::from_reply(reply, "t".into()).message, FALLBACK_REPLY);
    }

    #[test]
    fn failed_generation_apologises() {
        let response = ChatResponse::from_reply(ModelReply::error("timeout"), "t".into());
        assert_eq!(response.message, APOLOGY);
        assert_eq!(response.error.as_deref(), Some("Failed to generate response: timeout"));
    }
}
