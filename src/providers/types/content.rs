use serde::{Deserialize, Serialize};
use serde_json::Value;

// Base trait for all content types
pub trait ContentType: Send + Sync {
    fn content_type(&self) -> &'static str;
    fn summary(&self) -> String;
}

// Text content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Text {
    pub text: String,
}

impl ContentType for Text {
    fn content_type(&self) -> &'static str {
        "Text"
    }

    fn summary(&self) -> String {
        format!("content:text\n{}", self.text)
    }
}

/// A tool call requested by the model.
///
/// `arguments` is the JSON-encoded argument string exactly as the model sent it,
/// so it can be replayed verbatim on the follow-up call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolUse {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

impl ToolUse {
    pub fn new<I, N, A>(id: I, name: N, arguments: A) -> Self
    where
        I: Into<String>,
        N: Into<String>,
        A: Into<String>,
    {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }
}

impl ContentType for ToolUse {
    fn content_type(&self) -> &'static str {
        "ToolUse"
    }

    fn summary(&self) -> String {
        format!(
            "content:tool_use:{}:{}\narguments:{}",
            self.name, self.id, self.arguments
        )
    }
}

/// The outcome of one tool call, answered back to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool_call_id: String,
    pub tool_name: String,
    /// JSON-encoded success payload or `{"error": ...}`.
    pub output: String,
    #[serde(default)]
    pub is_error: bool,
}

impl ToolResult {
    /// Build a result from a dispatch payload, flagging `{"error": ...}` payloads.
    pub fn from_payload(request: &ToolUse, payload: &Value) -> Self {
        Self {
            tool_call_id: request.id.clone(),
            tool_name: request.name.clone(),
            output: payload.to_string(),
            is_error: payload.get("error").is_some(),
        }
    }
}

impl ContentType for ToolResult {
    fn content_type(&self) -> &'static str {
        "ToolResult"
    }

    fn summary(&self) -> String {
        format!(
            "content:tool_result:{}:error={}\noutput:{}",
            self.tool_name, self.is_error, self.output
        )
    }
}

// Enum to handle all content types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Content {
    Text(Text),
    ToolUse(ToolUse),
    ToolResult(ToolResult),
}

impl Content {
    pub fn text<S: Into<String>>(text: S) -> Self {
        Content::Text(Text { text: text.into() })
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Content::Text(t) => t.content_type(),
            Content::ToolUse(t) => t.content_type(),
            Content::ToolResult(t) => t.content_type(),
        }
    }

    pub fn summary(&self) -> String {
        match self {
            Content::Text(t) => t.summary(),
            Content::ToolUse(t) => t.summary(),
            Content::ToolResult(t) => t.summary(),
        }
    }
}
