use anyhow::{anyhow, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};

use super::types::{
    content::{Content, Text, ToolUse},
    message::{Message, Role},
    tool::ToolSpec,
};

/// Convert internal Message format to OpenAI's API message specification
pub fn messages_to_openai_spec(messages: &[Message]) -> Vec<Value> {
    let mut messages_spec = Vec::new();

    for message in messages {
        let mut converted = json!({
            "role": message.role
        });

        for content in &message.content {
            match content {
                Content::Text(Text { text }) => {
                    converted["content"] = json!(text);
                }
                Content::ToolUse(tool_use) => {
                    let entry = json!({
                        "id": tool_use.id,
                        "type": "function",
                        "function": {
                            "name": tool_use.name,
                            "arguments": tool_use.arguments,
                        }
                    });
                    match converted.get_mut("tool_calls").and_then(Value::as_array_mut) {
                        Some(tool_calls) => tool_calls.push(entry),
                        None => converted["tool_calls"] = json!([entry]),
                    }
                }
                Content::ToolResult(tool_result) => {
                    converted["tool_call_id"] = json!(tool_result.tool_call_id);
                    converted["name"] = json!(tool_result.tool_name);
                    converted["content"] = json!(tool_result.output);
                }
            }
        }

        // Assistant turns that only call tools still carry a content field
        if converted.get("content").is_none() {
            converted["content"] = json!("");
        }
        messages_spec.push(converted);
    }

    messages_spec
}

/// Convert internal tool specs to OpenAI's API tool specification
pub fn tools_to_openai_spec(tools: &[ToolSpec]) -> Result<Vec<Value>> {
    let mut tool_names = std::collections::HashSet::new();
    let mut result = Vec::new();

    for tool in tools {
        if !tool_names.insert(&tool.name) {
            return Err(anyhow!("Duplicate tool name: {}", tool.name));
        }

        result.push(json!({
            "type": "function",
            "function": {
                "name": tool.name,
                "description": tool.description,
                "parameters": tool.parameters,
            }
        }));
    }

    Ok(result)
}

/// Convert OpenAI's API response to internal Message format
pub fn openai_response_to_message(response: &Value) -> Result<Message> {
    let original = response
        .get("choices")
        .and_then(|choices| choices.get(0))
        .and_then(|choice| choice.get("message"))
        .filter(|message| message.is_object())
        .ok_or_else(|| anyhow!("Unexpected response shape: no choices[0].message"))?;

    let text = original
        .get("content")
        .and_then(Value::as_str)
        .unwrap_or_default();

    let mut tool_calls = Vec::new();
    if let Some(tool_calls_array) = original.get("tool_calls").and_then(Value::as_array) {
        for tool_call in tool_calls_array {
            let id = tool_call["id"].as_str().unwrap_or_default();
            let function_name = tool_call["function"]["name"].as_str().unwrap_or_default();
            // Arguments normally arrive as a JSON string; re-encode the odd object form
            let arguments = match &tool_call["function"]["arguments"] {
                Value::String(raw) => raw.clone(),
                Value::Null => String::new(),
                other => other.to_string(),
            };
            tool_calls.push(ToolUse::new(id, function_name, arguments));
        }
    }

    if tool_calls.is_empty() {
        Message::new(Role::Assistant, vec![Content::text(text)])
    } else {
        Message::assistant_with_tool_calls(text, tool_calls)
    }
}

static FUNCTION_NAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-zA-Z0-9_-]+$").unwrap());

pub fn is_valid_function_name(name: &str) -> bool {
    FUNCTION_NAME_RE.is_match(name)
}

#[derive(Debug, thiserror::Error)]
#[error("Input message too long. Message: {0}")]
pub struct ContextLengthExceededError(String);

pub fn check_openai_context_length_error(error: &Value) -> Option<ContextLengthExceededError> {
    let code = error.get("code")?.as_str()?;
    if code == "context_length_exceeded" || code == "string_above_max_length" {
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("Unknown error")
            .to_string();
        Some(ContextLengthExceededError(message))
    } else {
        None
    }
}
