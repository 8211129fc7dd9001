//! Tool argument validation against the JSON schema each tool declares, and
//! typed accessors for handlers reading validated arguments.

use anyhow::{anyhow, Result};
use jsonschema::{JSONSchema, ValidationError};
use serde_json::{Map, Value};

use crate::errors::{ToolError, ToolResult};

/// At most this many violations are reported back to the model.
const MAX_REPORTED_ERRORS: usize = 3;

/// Compile a tool's parameter schema. A schema that does not itself conform to
/// JSON Schema is rejected here, at registration.
pub fn compile(name: &str, parameters: &Value) -> Result<JSONSchema> {
    JSONSchema::compile(parameters)
        .map_err(|e| anyhow!("Tool '{}' has an invalid parameter schema: {}", name, e))
}

/// Check decoded arguments against a compiled schema. Object members that are
/// `null` count as omitted, so an optional argument may be sent as null while
/// a required one may not.
pub fn validate(schema: &JSONSchema, args: &Value) -> ToolResult<()> {
    let args = without_nulls(args);
    let result = schema.validate(&args);
    if let Err(errors) = result {
        let messages: Vec<String> = errors.take(MAX_REPORTED_ERRORS).map(describe).collect();
        return Err(invalid(messages.join("; ")));
    }
    Ok(())
}

fn without_nulls(args: &Value) -> Value {
    match args {
        Value::Object(object) => Value::Object(
            object
                .iter()
                .filter(|(_, value)| !value.is_null())
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn describe(err: ValidationError<'_>) -> String {
    let path = err.instance_path.to_string();
    if path.is_empty() {
        err.to_string()
    } else {
        format!("{} at {}", err, path)
    }
}

fn invalid(message: String) -> ToolError {
    ToolError::InvalidParameters(message)
}

// Accessors for arguments that already passed `validate`. Handlers can also be
// called directly, so these return errors too.

pub fn required_str<'a>(args: &'a Value, name: &str) -> ToolResult<&'a str> {
    args.get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| invalid(format!("'{}' must be a string", name)))
}

pub fn optional_i64(args: &Value, name: &str) -> ToolResult<Option<i64>> {
    match args.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => as_integer(value)
            .map(Some)
            .ok_or_else(|| invalid(format!("'{}' must be an integer", name))),
    }
}

// JSON Schema counts `1.0` as an integer, so integral floats are accepted.
fn as_integer(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64)
            .map(|f| f as i64)
    })
}

pub fn required_i64(args: &Value, name: &str) -> ToolResult<i64> {
    optional_i64(args, name)?.ok_or_else(|| invalid(format!("'{}' must be an integer", name)))
}

pub fn string_list(value: &Value, name: &str) -> ToolResult<Vec<String>> {
    value
        .as_array()
        .ok_or_else(|| invalid(format!("'{}' must be a list of strings", name)))?
        .iter()
        .map(|item| {
            item.as_str()
                .map(str::to_string)
                .ok_or_else(|| invalid(format!("'{}' must be a list of strings", name)))
        })
        .collect()
}

pub fn required_string_list(args: &Value, name: &str) -> ToolResult<Vec<String>> {
    string_list(args.get(name).unwrap_or(&Value::Null), name)
}

pub fn required_rows(args: &Value, name: &str) -> ToolResult<Vec<Vec<String>>> {
    args.get(name)
        .and_then(Value::as_array)
        .ok_or_else(|| invalid(format!("'{}' must be a list of rows", name)))?
        .iter()
        .enumerate()
        .map(|(index, row)| string_list(row, &format!("{}[{}]", name, index)))
        .collect()
}

pub fn required_object<'a>(args: &'a Value, name: &str) -> ToolResult<&'a Map<String, Value>> {
    args.get(name)
        .and_then(Value::as_object)
        .ok_or_else(|| invalid(format!("'{}' must be an object", name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> JSONSchema {
        compile(
            "read_csv",
            &json!({
                "type": "object",
                "properties": {
                    "file_path": {"type": "string"},
                    "num_rows": {"type": "integer"},
                    "data": {
                        "type": "array",
                        "items": {"type": "array", "items": {"type": "string"}}
                    },
                    "new_columns": {
                        "type": "object",
                        "additionalProperties": {"type": "array", "items": {"type": "string"}}
                    }
                },
                "required": ["file_path"]
            }),
        )
        .unwrap()
    }

    fn error_of(args: Value) -> String {
        validate(&schema(), &args).unwrap_err().to_string()
    }

    #[test]
    fn test_valid_arguments() {
        let args = json!({
            "file_path": "a.csv",
            "num_rows": 2,
            "data": [["1", "2"]],
            "new_columns": {"c": ["x"]}
        });
        assert!(validate(&schema(), &args).is_ok());
    }

    #[test]
    fn test_optional_null_is_allowed() {
        assert!(validate(&schema(), &json!({"file_path": "a", "num_rows": null})).is_ok());
    }

    #[test]
    fn test_integral_float_is_an_integer() {
        assert!(validate(&schema(), &json!({"file_path": "a", "num_rows": 1.0})).is_ok());
    }

    #[test]
    fn test_missing_required() {
        assert_eq!(
            error_of(json!({})),
            "Invalid parameters: \"file_path\" is a required property"
        );
        assert!(error_of(json!({"file_path": null})).contains("\"file_path\" is a required property"));
    }

    #[test]
    fn test_not_an_object() {
        assert!(error_of(json!(["a.csv"])).contains("is not of type \"object\""));
    }

    #[test]
    fn test_wrong_types() {
        assert_eq!(
            error_of(json!({"file_path": 3})),
            "Invalid parameters: 3 is not of type \"string\" at /file_path"
        );
        assert!(error_of(json!({"file_path": "a", "num_rows": 1.5}))
            .contains("is not of type \"integer\" at /num_rows"));
        assert!(error_of(json!({"file_path": "a", "data": [["1", 2]]}))
            .contains("2 is not of type \"string\" at /data/0/1"));
        assert!(error_of(json!({"file_path": "a", "new_columns": {"c": "x"}}))
            .contains("is not of type \"array\" at /new_columns/c"));
    }

    #[test]
    fn test_reports_at_most_three_violations() {
        let message = error_of(json!({"file_path": "a", "data": [[1, 2, 3, 4, 5]]}));
        assert_eq!(message.matches("is not of type").count(), MAX_REPORTED_ERRORS);
    }

    #[test]
    fn test_compile_rejects_malformed_schema() {
        let err = compile("broken", &json!({"type": 5})).unwrap_err();
        assert!(err.to_string().contains("Tool 'broken' has an invalid parameter schema"));
    }

    #[test]
    fn test_accessors() -> ToolResult<()> {
        let args = json!({
            "file_path": "a.csv",
            "row_index": 4,
            "headers": ["a", "b"],
            "data": [["1", "2"], ["3", "4"]],
            "new_columns": {"c": ["x", "y"]}
        });
        assert_eq!(required_str(&args, "file_path")?, "a.csv");
        assert_eq!(required_i64(&args, "row_index")?, 4);
        assert_eq!(required_i64(&json!({"row_index": 1.0}), "row_index")?, 1);
        assert!(required_i64(&json!({"row_index": 1.5}), "row_index").is_err());
        assert_eq!(optional_i64(&args, "num_rows")?, None);
        assert_eq!(required_string_list(&args, "headers")?, vec!["a", "b"]);
        assert_eq!(required_rows(&args, "data")?[1], vec!["3", "4"]);
        assert_eq!(required_object(&args, "new_columns")?.len(), 1);
        assert!(required_str(&args, "missing").is_err());
        Ok(())
    }
}
