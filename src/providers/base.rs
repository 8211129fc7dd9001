use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::types::message::Message;
use super::types::tool::{ToolChoice, ToolSpec};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: Option<i32>,
    pub output_tokens: Option<i32>,
    pub total_tokens: Option<i32>,
}

impl Usage {
    pub fn new(
        input_tokens: Option<i32>,
        output_tokens: Option<i32>,
        total_tokens: Option<i32>,
    ) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens,
        }
    }
}

/// Everything a provider needs for one completion.
#[derive(Debug, Clone)]
pub struct CompletionRequest<'a> {
    pub model: &'a str,
    /// Sent ahead of `messages` when non-empty.
    pub system: &'a str,
    pub messages: &'a [Message],
    /// Tool declarations; empty means tools are not offered on this call.
    pub tools: &'a [ToolSpec],
    pub tool_choice: Option<ToolChoice>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<i32>,
}

/// Base trait for AI providers (OpenAI, Groq, etc)
pub trait Provider: Send + Sync {
    /// Generate the next message. Blocks until the model answers.
    fn complete(&self, request: &CompletionRequest<'_>) -> Result<(Message, Usage)>;
}

impl<P: Provider + ?Sized> Provider for std::sync::Arc<P> {
    fn complete(&self, request: &CompletionRequest<'_>) -> Result<(Message, Usage)> {
        (**self).complete(request)
    }
}
