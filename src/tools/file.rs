use anyhow::Result;
use serde_json::{json, Value};
use std::fs;

use super::registry::ToolRegistry;
use super::schema::required_str;
use crate::errors::{ToolError, ToolResult};
use crate::providers::types::tool::ToolSpec;

pub fn register(registry: &mut ToolRegistry) -> Result<()> {
    registry.register(
        ToolSpec::new(
            "read_file",
            "Read contents of a file",
            json!({
                "type": "object",
                "properties": {
                    "file_path": {
                        "type": "string",
                        "description": "Path to the file to read"
                    }
                },
                "required": ["file_path"]
            }),
        ),
        read_file,
    )?;

    registry.register(
        ToolSpec::new(
            "write_file",
            "Write content to a file",
            json!({
                "type": "object",
                "properties": {
                    "file_path": {
                        "type": "string",
                        "description": "Path to the file to write"
                    },
                    "content": {
                        "type": "string",
                        "description": "Content to write to the file"
                    }
                },
                "required": ["file_path", "content"]
            }),
        ),
        write_file,
    )?;

    Ok(())
}

pub fn read_file(args: &Value) -> ToolResult<Value> {
    let file_path = required_str(args, "file_path")?;
    let content = fs::read_to_string(file_path)
        .map_err(|e| io_error(file_path, e).context("Error reading file"))?;
    Ok(json!({ "content": content }))
}

/// Creates or truncates the file.
pub fn write_file(args: &Value) -> ToolResult<Value> {
    let file_path = required_str(args, "file_path")?;
    let content = required_str(args, "content")?;
    fs::write(file_path, content)
        .map_err(|e| io_error(file_path, e).context("Error writing file"))?;
    Ok(json!({
        "success": true,
        "message": format!("Successfully wrote to {}", file_path)
    }))
}

fn io_error(path: &str, err: std::io::Error) -> ToolError {
    ToolError::ExecutionError(format!("{}: '{}'", err, path))
}
