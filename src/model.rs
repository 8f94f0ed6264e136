//! Wire data models for the assistant endpoints.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Role of the message sender.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A single prior turn of the conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Body of `POST /ai/chat`.
///
/// Sent as-is; the client performs no validation beyond what the types enforce.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatRequest {
    pub message: String,
    pub history: Vec<ChatMessage>,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>, history: Vec<ChatMessage>) -> Self {
        Self {
            message: message.into(),
            history,
        }
    }
}

/// `content: null` reads as an empty fragment.
fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// One decoded `data:` payload of the chat stream.
///
/// The server tags every payload with a `type` field. `token` is the tag an
/// older backend used for answer fragments and decodes to [`ChatEvent::Answer`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ChatEvent {
    /// A fragment of the assistant's answer.
    #[serde(alias = "token")]
    Answer {
        #[serde(default, deserialize_with = "null_as_empty")]
        content: String,
    },

    /// A fragment of the model's reasoning, shown separately from the answer.
    Thinking {
        #[serde(default, deserialize_with = "null_as_empty")]
        content: String,
    },

    /// The server finished the response.
    Done,

    /// The server reported a failure while generating the response.
    Error {
        #[serde(default, deserialize_with = "null_as_empty")]
        content: String,
    },

    /// Any `type` this client does not know about.
    #[serde(other)]
    Unknown,
}

impl ChatEvent {
    /// Parse a single `data:` payload.
    pub fn from_payload(payload: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(payload)
    }

    /// Whether the event ends the response from the server's point of view.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ChatEvent::Done | ChatEvent::Error { .. })
    }
}

/// Response of `GET /ai/health`.
///
/// The backend returns an arbitrary JSON object; `status` is the only field
/// the client relies on, everything else is kept in `extra`. Error bodies
/// such as `{"status":401,"error":"Unauthorized"}` are accepted too: a
/// non-string `status` or `message` is kept as its JSON text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthStatus {
    #[serde(default = "unknown_status", deserialize_with = "lenient_status")]
    pub status: String,

    #[serde(
        default,
        deserialize_with = "lenient_message",
        skip_serializing_if = "Option::is_none"
    )]
    pub message: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn unknown_status() -> String {
    "unknown".to_string()
}

fn value_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text),
        other => Some(other.to_string()),
    }
}

fn lenient_status<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(value_text(Value::deserialize(deserializer)?).unwrap_or_else(unknown_status))
}

fn lenient_message<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(value_text(Value::deserialize(deserializer)?))
}

impl HealthStatus {
    pub const OFFLINE: &'static str = "offline";

    /// Synthesized status for when the backend could not be reached or understood.
    pub fn offline(message: impl Into<String>) -> Self {
        Self {
            status: Self::OFFLINE.to_string(),
            message: Some(message.into()),
            extra: Map::new(),
        }
    }

    pub fn is_offline(&self) -> bool {
        self.status == Self::OFFLINE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_wire_shape() {
        let request = ChatRequest::new(
            "What was Q3 revenue?",
            vec![ChatMessage::user("hi"), ChatMessage::assistant("hello")],
        );
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "message": "What was Q3 revenue?",
                "history": [
                    {"role": "user", "content": "hi"},
                    {"role": "assistant", "content": "hello"}
                ]
            })
        );
    }

    #[test]
    fn test_token_is_alias_of_answer() {
        let answer = ChatEvent::from_payload(r#"{"type":"answer","content":"hi"}"#).unwrap();
        let token = ChatEvent::from_payload(r#"{"type":"token","content":"hi"}"#).unwrap();
        assert_eq!(answer, token);
        assert_eq!(answer, ChatEvent::Answer { content: "hi".to_string() });
    }

    #[test]
    fn test_terminal_events() {
        let done = ChatEvent::from_payload(r#"{"type":"done"}"#).unwrap();
        assert_eq!(done, ChatEvent::Done);
        assert!(done.is_terminal());

        let error = ChatEvent::from_payload(r#"{"type":"error","content":"quota exceeded"}"#).unwrap();
        assert_eq!(error, ChatEvent::Error { content: "quota exceeded".to_string() });
        assert!(error.is_terminal());
    }

    #[test]
    fn test_null_content_is_empty() {
        let answer = ChatEvent::from_payload(r#"{"type":"answer","content":null}"#).unwrap();
        assert_eq!(answer, ChatEvent::Answer { content: String::new() });

        let error = ChatEvent::from_payload(r#"{"type":"error","content":null}"#).unwrap();
        assert_eq!(error, ChatEvent::Error { content: String::new() });

        let thinking = ChatEvent::from_payload(r#"{"type":"thinking","content":null}"#).unwrap();
        assert_eq!(thinking, ChatEvent::Thinking { content: String::new() });

        let missing = ChatEvent::from_payload(r#"{"type":"token"}"#).unwrap();
        assert_eq!(missing, ChatEvent::Answer { content: String::new() });
    }

    #[test]
    fn test_unknown_type() {
        let event = ChatEvent::from_payload(r#"{"type":"usage","tokens":12}"#).unwrap();
        assert_eq!(event, ChatEvent::Unknown);
        assert!(!event.is_terminal());
    }

    #[test]
    fn test_malformed_payload() {
        assert!(ChatEvent::from_payload("{bad").is_err());
        assert!(ChatEvent::from_payload(r#"{"content":"no type"}"#).is_err());
    }

    #[test]
    fn test_health_keeps_extra_fields() {
        let health: HealthStatus =
            serde_json::from_value(json!({"status": "ok", "aiService": {"model": "qwen"}})).unwrap();
        assert_eq!(health.status, "ok");
        assert!(!health.is_offline());
        assert_eq!(health.extra["aiService"]["model"], "qwen");
    }

    #[test]
    fn test_health_accepts_error_bodies() {
        let health: HealthStatus =
            serde_json::from_value(json!({"status": 401, "error": "Unauthorized"})).unwrap();
        assert_eq!(health.status, "401");
        assert!(!health.is_offline());
        assert_eq!(health.extra["error"], "Unauthorized");

        let health: HealthStatus =
            serde_json::from_value(json!({"status": null, "message": {"code": 7}})).unwrap();
        assert_eq!(health.status, "unknown");
        assert_eq!(health.message.as_deref(), Some(r#"{"code":7}"#));

        let health: HealthStatus = serde_json::from_value(json!({"message": null})).unwrap();
        assert_eq!(health.status, "unknown");
        assert_eq!(health.message, None);
    }

    #[test]
    fn test_health_offline() {
        let health = HealthStatus::offline("connection refused");
        assert!(health.is_offline());
        assert_eq!(
            serde_json::to_value(&health).unwrap(),
            json!({"status": "offline", "message": "connection refused"})
        );
    }
}
