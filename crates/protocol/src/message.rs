use std::error::Error as StdError;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A message emitted by the agent during a session.
#[derive(Clone, Debug, PartialEq)]
pub enum Message {
    /// A user turn, either the echoed prompt or tool results.
    User(UserMessage),
    /// An assistant turn.
    Assistant(AssistantMessage),
    /// A system notification such as the `init` message.
    System(SystemMessage),
    /// The final message of a response, carrying the accounting data.
    Result(ResultMessage),
    /// A raw partial-message event, only sent when partial messages are
    /// requested.
    StreamEvent(StreamEvent),
}

/// Content of a user message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserContent {
    /// Plain text.
    Text(String),
    /// Structured content, usually tool results.
    Blocks(Vec<ContentBlock>),
}

/// A user turn.
#[derive(Clone, Debug, PartialEq)]
pub struct UserMessage {
    /// The content of the turn.
    pub content: UserContent,
    /// Set when the turn belongs to a sub-agent tool call.
    pub parent_tool_use_id: Option<String>,
}

/// An assistant turn.
#[derive(Clone, Debug, PartialEq)]
pub struct AssistantMessage {
    /// Content blocks in the order the model produced them.
    pub content: Vec<ContentBlock>,
    /// The model that produced the turn, as reported by the router.
    pub model: String,
    /// Set when the turn belongs to a sub-agent tool call.
    pub parent_tool_use_id: Option<String>,
}

impl AssistantMessage {
    /// Iterates over the text blocks of this message.
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.content.iter().filter_map(|block| match block {
            ContentBlock::Text(text) => Some(text.text.as_str()),
            _ => None,
        })
    }
}

/// A system notification.
#[derive(Clone, Debug, PartialEq)]
pub struct SystemMessage {
    /// The notification subtype, e.g. `init`.
    pub subtype: String,
    /// The complete object as received.
    pub data: Value,
}

/// The final message of a response.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResultMessage {
    /// `success` or one of the error subtypes.
    pub subtype: String,
    /// Wall time spent on the response.
    pub duration_ms: u64,
    /// Time spent waiting for the model API.
    pub duration_api_ms: u64,
    /// Whether the response ended with an error.
    pub is_error: bool,
    /// Number of model turns taken.
    pub num_turns: u32,
    /// The session the response belongs to.
    pub session_id: String,
    /// The accumulated cost, if the provider reports one.
    #[serde(default)]
    pub total_cost_usd: Option<f64>,
    /// Token usage as reported by the provider.
    #[serde(default)]
    pub usage: Option<Value>,
    /// The final text result.
    #[serde(default)]
    pub result: Option<String>,
}

/// A raw partial-message event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StreamEvent {
    /// Unique id of the event.
    pub uuid: String,
    /// The session the event belongs to.
    pub session_id: String,
    /// The provider event, passed through untouched.
    pub event: Value,
    /// Set when the event belongs to a sub-agent tool call.
    #[serde(default)]
    pub parent_tool_use_id: Option<String>,
}

/// A block of message content.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Text produced by the model.
    Text(TextBlock),
    /// Extended thinking.
    Thinking(ThinkingBlock),
    /// A tool call requested by the model.
    ToolUse(ToolUseBlock),
    /// The outcome of a tool call.
    ToolResult(ToolResultBlock),
    /// A block type this crate doesn't know about.
    #[serde(other)]
    Unknown,
}

/// Text produced by the model.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextBlock {
    /// The text.
    pub text: String,
}

/// Extended thinking.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ThinkingBlock {
    /// The thinking text.
    pub thinking: String,
    /// Signature of the thinking block.
    #[serde(default)]
    pub signature: String,
}

/// A tool call requested by the model.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolUseBlock {
    /// The unique identifier for the call.
    pub id: String,
    /// The tool name.
    pub name: String,
    /// The input passed to the tool.
    pub input: Value,
}

/// The outcome of a tool call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResultBlock {
    /// The call this result answers.
    pub tool_use_id: String,
    /// The tool output, either a string or a list of blocks.
    #[serde(default)]
    pub content: Option<Value>,
    /// Whether the tool failed.
    #[serde(default)]
    pub is_error: Option<bool>,
}

/// An error produced while turning a JSON value into a [`Message`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParseError {
    /// The value has no string `type` field.
    MissingType,
    /// The `type` is not a message type this crate knows about.
    UnknownType(String),
    /// The value has a known type but doesn't have the expected shape.
    Invalid {
        /// The `type` of the value.
        message_type: String,
        /// What went wrong.
        reason: String,
    },
}

impl ParseError {
    /// Returns `true` if the value was well-formed but of an unknown type.
    #[inline]
    pub fn is_unknown_type(&self) -> bool {
        matches!(self, ParseError::UnknownType(_))
    }

    fn invalid(message_type: &str, reason: impl Display) -> Self {
        ParseError::Invalid {
            message_type: message_type.to_owned(),
            reason: reason.to_string(),
        }
    }
}

impl Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::MissingType => {
                write!(f, "message is missing the 'type' field")
            }
            ParseError::UnknownType(ty) => {
                write!(f, "unknown message type: {ty}")
            }
            ParseError::Invalid {
                message_type,
                reason,
            } => write!(f, "invalid {message_type} message: {reason}"),
        }
    }
}

impl StdError for ParseError {}

#[derive(Deserialize)]
struct UserWire {
    message: UserPayload,
    #[serde(default)]
    parent_tool_use_id: Option<String>,
}

#[derive(Deserialize)]
struct UserPayload {
    content: UserContent,
}

#[derive(Deserialize)]
struct AssistantWire {
    message: AssistantPayload,
    #[serde(default)]
    parent_tool_use_id: Option<String>,
}

#[derive(Deserialize)]
struct AssistantPayload {
    content: Vec<ContentBlock>,
    #[serde(default)]
    model: String,
}

impl Message {
    /// Converts a JSON value read from the agent into a message.
    pub fn from_value(value: Value) -> Result<Self, ParseError> {
        let Some(ty) = value.get("type").and_then(Value::as_str) else {
            return Err(ParseError::MissingType);
        };
        let ty = ty.to_owned();

        match ty.as_str() {
            "user" => {
                let wire: UserWire = serde_json::from_value(value)
                    .map_err(|err| ParseError::invalid(&ty, err))?;
                Ok(Message::User(UserMessage {
                    content: wire.message.content,
                    parent_tool_use_id: wire.parent_tool_use_id,
                }))
            }
            "assistant" => {
                let wire: AssistantWire = serde_json::from_value(value)
                    .map_err(|err| ParseError::invalid(&ty, err))?;
                Ok(Message::Assistant(AssistantMessage {
                    content: wire.message.content,
                    model: wire.message.model,
                    parent_tool_use_id: wire.parent_tool_use_id,
                }))
            }
            "system" => {
                let Some(subtype) = value.get("subtype").and_then(Value::as_str)
                else {
                    return Err(ParseError::invalid(&ty, "missing subtype"));
                };
                Ok(Message::System(SystemMessage {
                    subtype: subtype.to_owned(),
                    data: value,
                }))
            }
            "result" => serde_json::from_value(value)
                .map(Message::Result)
                .map_err(|err| ParseError::invalid(&ty, err)),
            "stream_event" => serde_json::from_value(value)
                .map(Message::StreamEvent)
                .map_err(|err| ParseError::invalid(&ty, err)),
            _ => Err(ParseError::UnknownType(ty)),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_parse_assistant() {
        let value = json!({
            "type": "assistant",
            "message": {
                "model": "deepseek,deepseek-chat",
                "content": [
                    {"type": "text", "text": "Let me check."},
                    {
                        "type": "tool_use",
                        "id": "toolu_1",
                        "name": "Bash",
                        "input": {"command": "pwd"}
                    },
                    {"type": "redacted_thinking", "data": "..."}
                ]
            },
            "parent_tool_use_id": null,
            "session_id": "abc"
        });
        let Message::Assistant(msg) = Message::from_value(value).unwrap()
        else {
            panic!("expected an assistant message");
        };
        assert_eq!(msg.model, "deepseek,deepseek-chat");
        assert_eq!(msg.texts().collect::<Vec<_>>(), ["Let me check."]);
        assert_eq!(
            msg.content[1],
            ContentBlock::ToolUse(ToolUseBlock {
                id: "toolu_1".to_owned(),
                name: "Bash".to_owned(),
                input: json!({"command": "pwd"}),
            })
        );
        assert_eq!(msg.content[2], ContentBlock::Unknown);
    }

    #[test]
    fn test_parse_user_content_shapes() {
        let text = json!({
            "type": "user",
            "message": {"role": "user", "content": "hi"}
        });
        assert_eq!(
            Message::from_value(text).unwrap(),
            Message::User(UserMessage {
                content: UserContent::Text("hi".to_owned()),
                parent_tool_use_id: None,
            })
        );

        let blocks = json!({
            "type": "user",
            "message": {
                "role": "user",
                "content": [{
                    "type": "tool_result",
                    "tool_use_id": "toolu_1",
                    "content": "/home/me",
                    "is_error": false
                }]
            },
            "parent_tool_use_id": "toolu_0"
        });
        let Message::User(msg) = Message::from_value(blocks).unwrap() else {
            panic!("expected a user message");
        };
        assert_eq!(msg.parent_tool_use_id.as_deref(), Some("toolu_0"));
        let UserContent::Blocks(blocks) = msg.content else {
            panic!("expected blocks");
        };
        assert!(matches!(
            &blocks[0],
            ContentBlock::ToolResult(ToolResultBlock { tool_use_id, .. })
                if tool_use_id == "toolu_1"
        ));
    }

    #[test]
    fn test_parse_result() {
        let value = json!({
            "type": "result",
            "subtype": "success",
            "duration_ms": 1200,
            "duration_api_ms": 900,
            "is_error": false,
            "num_turns": 1,
            "session_id": "3f1c",
            "total_cost_usd": 0.000123,
            "result": "4"
        });
        let Message::Result(msg) = Message::from_value(value).unwrap() else {
            panic!("expected a result message");
        };
        assert_eq!(msg.session_id, "3f1c");
        assert_eq!(msg.total_cost_usd, Some(0.000123));
        assert_eq!(msg.usage, None);
        assert_eq!(msg.result.as_deref(), Some("4"));
    }

    #[test]
    fn test_parse_system_keeps_data() {
        let value = json!({
            "type": "system",
            "subtype": "init",
            "session_id": "3f1c",
            "tools": ["Bash", "Read"]
        });
        let Message::System(msg) =
            Message::from_value(value.clone()).unwrap()
        else {
            panic!("expected a system message");
        };
        assert_eq!(msg.subtype, "init");
        assert_eq!(msg.data, value);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            Message::from_value(json!({"message": {}})).unwrap_err(),
            ParseError::MissingType
        );

        let err = Message::from_value(json!({"type": "telemetry"}))
            .unwrap_err();
        assert!(err.is_unknown_type());

        let err = Message::from_value(json!({"type": "assistant"}))
            .unwrap_err();
        assert!(matches!(
            err,
            ParseError::Invalid { ref message_type, .. }
                if message_type == "assistant"
        ));
        assert!(!err.is_unknown_type());
    }
}
