use anyhow::{anyhow, Context, Result};
use reqwest::blocking::Client; // blocking API: a turn waits on each model call
use reqwest::StatusCode;
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::debug;

use super::{
    base::{CompletionRequest, Provider, Usage},
    configs::openai::OpenAiProviderConfig,
    types::message::Message,
    utils::{
        check_openai_context_length_error, messages_to_openai_spec, openai_response_to_message,
        tools_to_openai_spec,
    },
};

pub struct OpenAiProvider {
    client: Client,
    config: OpenAiProviderConfig,
}

impl OpenAiProvider {
    pub fn new(config: OpenAiProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600)) // 10 minutes timeout
            .build()?;

        Ok(Self { client, config })
    }

    fn get_usage(data: &Value) -> Usage {
        let Some(usage) = data.get("usage") else {
            return Usage::default();
        };

        let input_tokens = usage
            .get("prompt_tokens")
            .and_then(|v| v.as_i64())
            .map(|v| v as i32);

        let output_tokens = usage
            .get("completion_tokens")
            .and_then(|v| v.as_i64())
            .map(|v| v as i32);

        let total_tokens = usage
            .get("total_tokens")
            .and_then(|v| v.as_i64())
            .map(|v| v as i32)
            .or_else(|| match (input_tokens, output_tokens) {
                (Some(input), Some(output)) => Some(input + output),
                _ => None,
            });

        Usage::new(input_tokens, output_tokens, total_tokens)
    }

    fn build_payload(request: &CompletionRequest<'_>) -> Result<Value> {
        let mut messages_array = Vec::with_capacity(request.messages.len() + 1);
        if !request.system.is_empty() {
            messages_array.push(json!({
                "role": "system",
                "content": request.system
            }));
        }
        messages_array.extend(messages_to_openai_spec(request.messages));

        let mut payload = Map::new();
        payload.insert("model".to_string(), json!(request.model));
        payload.insert("messages".to_string(), Value::Array(messages_array));

        // Tool choice only means something when tools are offered
        if !request.tools.is_empty() {
            let tools_spec = tools_to_openai_spec(request.tools)?;
            payload.insert("tools".to_string(), json!(tools_spec));
            if let Some(choice) = request.tool_choice {
                payload.insert("tool_choice".to_string(), json!(choice));
            }
        }
        if let Some(temp) = request.temperature {
            payload.insert("temperature".to_string(), json!(temp));
        }
        if let Some(tokens) = request.max_tokens {
            payload.insert("max_completion_tokens".to_string(), json!(tokens));
        }

        Ok(Value::Object(payload))
    }

    fn post(&self, payload: &Value) -> Result<Value> {
        let url = format!(
            "{}/v1/chat/completions",
            self.config.host.trim_end_matches('/')
        );
        debug!(%url, "posting chat completion");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(payload)
            .send()
            .with_context(|| format!("Request to {} failed", url))?;

        match response.status() {
            StatusCode::OK => Ok(response.json().context("Response body was not JSON")?),
            status if status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() >= 500 => {
                Err(anyhow!("Server error: {}", status))
            }
            status => {
                // The body usually explains auth and validation failures
                let body = response.text().unwrap_or_default();
                Err(anyhow!("Request failed: {}\n{}", status, body))
            }
        }
    }
}

impl Provider for OpenAiProvider {
    fn complete(&self, request: &CompletionRequest<'_>) -> Result<(Message, Usage)> {
        let payload = Self::build_payload(request)?;

        let response = self.post(&payload)?;

        // Raise specific error if context length is exceeded
        if let Some(error) = response.get("error") {
            if let Some(err) = check_openai_context_length_error(error) {
                return Err(err.into());
            }
            return Err(anyhow!("Model API error: {}", error));
        }

        let message = openai_response_to_message(&response)?;
        let usage = Self::get_usage(&response);

        Ok((message, usage))
    }
}
