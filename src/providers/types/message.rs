use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use super::content::{Content, Text, ToolResult, ToolUse};
use super::objectid::create_object_id;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub id: String,
    pub created: i64,
    pub content: Vec<Content>,
}

impl Message {
    pub fn new(role: Role, content: Vec<Content>) -> Result<Self> {
        let msg = Self {
            role,
            id: create_object_id("msg"),
            created: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs() as i64)
                .unwrap_or_default(),
            content,
        };
        msg.validate()?;
        Ok(msg)
    }

    fn validate(&self) -> Result<()> {
        match self.role {
            Role::User => {
                if !self.has_text() {
                    return Err(anyhow!("User message must include Text"));
                }
                if self.has_tool_use() || self.has_tool_result() {
                    return Err(anyhow!("User message only supports Text"));
                }
            }
            Role::Assistant => {
                if !self.has_text() && !self.has_tool_use() {
                    return Err(anyhow!("Assistant message must include a Text or ToolUse"));
                }
                if self.has_tool_result() {
                    return Err(anyhow!("Assistant message does not support ToolResult"));
                }
            }
            Role::Tool => {
                if self.content.len() != 1 || !self.has_tool_result() {
                    return Err(anyhow!("Tool message must hold exactly one ToolResult"));
                }
            }
        }
        Ok(())
    }

    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|content| match content {
                Content::Text(text) => Some(text.text.clone()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn tool_use(&self) -> Vec<ToolUse> {
        self.content
            .iter()
            .filter_map(|content| match content {
                Content::ToolUse(tool_use) => Some(tool_use.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn tool_result(&self) -> Option<&ToolResult> {
        self.content.iter().find_map(|content| match content {
            Content::ToolResult(tool_result) => Some(tool_result),
            _ => None,
        })
    }

    fn has_text(&self) -> bool {
        self.content.iter().any(|c| matches!(c, Content::Text(_)))
    }

    pub fn has_tool_use(&self) -> bool {
        self.content.iter().any(|c| matches!(c, Content::ToolUse(_)))
    }

    fn has_tool_result(&self) -> bool {
        self.content.iter().any(|c| matches!(c, Content::ToolResult(_)))
    }

    pub fn user(text: &str) -> Result<Self> {
        Self::new(
            Role::User,
            vec![Content::Text(Text {
                text: text.to_string(),
            })],
        )
    }

    pub fn assistant(text: &str) -> Result<Self> {
        Self::new(
            Role::Assistant,
            vec![Content::Text(Text {
                text: text.to_string(),
            })],
        )
    }

    /// An assistant turn that requests tool calls. Empty text is dropped, matching
    /// what the API sends when the model only calls tools.
    pub fn assistant_with_tool_calls(text: &str, tool_calls: Vec<ToolUse>) -> Result<Self> {
        let mut content = Vec::with_capacity(tool_calls.len() + 1);
        if !text.is_empty() {
            content.push(Content::text(text));
        }
        content.extend(tool_calls.into_iter().map(Content::ToolUse));
        Self::new(Role::Assistant, content)
    }

    pub fn tool(result: ToolResult) -> Result<Self> {
        Self::new(Role::Tool, vec![Content::ToolResult(result)])
    }

    pub fn summary(&self) -> String {
        let content_summaries: Vec<String> = self.content.iter().map(|c| c.summary()).collect();
        format!("message:{:?}\n{}", self.role, content_summaries.join("\n"))
    }
}
