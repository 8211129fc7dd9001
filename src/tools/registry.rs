use anyhow::{bail, Result};
use jsonschema::JSONSchema;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fmt::Debug;
use tracing::{debug, warn};

use super::schema;
use crate::errors::{ToolError, ToolResult};
use crate::providers::types::tool::ToolSpec;
use crate::providers::utils::is_valid_function_name;

/// The function that powers a tool. Failures are returned, never raised.
pub type ToolHandler = Box<dyn Fn(&Value) -> ToolResult<Value> + Send + Sync>;

/// Tool name -> (spec, handler), fixed once the session starts.
#[derive(Default)]
pub struct ToolRegistry {
    specs: Vec<ToolSpec>,
    handlers: HashMap<String, Registered>,
}

struct Registered {
    parameters: JSONSchema,
    handler: ToolHandler,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        spec: ToolSpec,
        handler: impl Fn(&Value) -> ToolResult<Value> + Send + Sync + 'static,
    ) -> Result<()> {
        if !is_valid_function_name(&spec.name) {
            bail!(
                "Tool name '{}' has invalid characters, it must match [a-zA-Z0-9_-]+",
                spec.name
            );
        }
        if self.handlers.contains_key(&spec.name) {
            bail!("Duplicate tool name: {}", spec.name);
        }
        let parameters = schema::compile(&spec.name, &spec.parameters)?;
        self.handlers.insert(
            spec.name.clone(),
            Registered {
                parameters,
                handler: Box::new(handler),
            },
        );
        self.specs.push(spec);
        Ok(())
    }

    /// Specs in registration order.
    pub fn specs(&self) -> &[ToolSpec] {
        &self.specs
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Run a tool against its JSON-encoded arguments. Every failure, including an
    /// unknown name, comes back as an `{"error": ...}` payload.
    pub fn dispatch(&self, name: &str, arguments: &str) -> Value {
        match self.try_dispatch(name, arguments) {
            Ok(payload) => {
                debug!(tool = name, "tool call succeeded");
                payload
            }
            Err(err) => {
                warn!(tool = name, error = %err, "tool call failed");
                json!({ "error": err.to_string() })
            }
        }
    }

    fn try_dispatch(&self, name: &str, arguments: &str) -> ToolResult<Value> {
        let tool = self
            .handlers
            .get(name)
            .ok_or_else(|| ToolError::ToolNotFound(name.to_string()))?;

        let args: Value = if arguments.trim().is_empty() {
            json!({})
        } else {
            serde_json::from_str(arguments).map_err(|e| {
                ToolError::InvalidParameters(format!("arguments are not valid JSON: {}", e))
            })?
        };

        schema::validate(&tool.parameters, &args)?;
        (tool.handler)(&args)
    }
}

impl Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("specs", &self.specs)
            .field("handlers", &"<function>")
            .finish()
    }
}
