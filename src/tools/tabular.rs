//! CSV tools. Every cell is kept as a string; headers come from the first row.

use anyhow::Result;
use serde_json::{json, Value};
use std::path::Path;

use super::query::Filter;
use super::registry::ToolRegistry;
use super::schema::{
    optional_i64, required_i64, required_object, required_rows, required_str,
    required_string_list, string_list,
};
use super::table::{render_preview, Table};
use crate::errors::{ToolError, ToolResult};
use crate::providers::types::tool::ToolSpec;

fn rows_schema(description: &str) -> Value {
    json!({
        "type": "array",
        "items": {
            "type": "array",
            "items": {"type": "string"}
        },
        "description": description
    })
}

pub fn register(registry: &mut ToolRegistry) -> Result<()> {
    registry.register(
        ToolSpec::new(
            "create_csv",
            "Create a new CSV file with headers and data",
            json!({
                "type": "object",
                "properties": {
                    "file_path": {
                        "type": "string",
                        "description": "Path to the CSV file to create"
                    },
                    "headers": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "List of column headers"
                    },
                    "data": rows_schema("List of rows, where each row is a list of values")
                },
                "required": ["file_path", "headers", "data"]
            }),
        ),
        create_csv,
    )?;

    registry.register(
        ToolSpec::new(
            "read_csv",
            "Read contents of a CSV file",
            json!({
                "type": "object",
                "properties": {
                    "file_path": {
                        "type": "string",
                        "description": "Path to the CSV file to read"
                    },
                    "num_rows": {
                        "type": "integer",
                        "description": "Optional: Number of rows to read (reads all if not specified)"
                    }
                },
                "required": ["file_path"]
            }),
        ),
        read_csv,
    )?;

    registry.register(
        ToolSpec::new(
            "append_csv",
            "Append rows to an existing CSV file",
            json!({
                "type": "object",
                "properties": {
                    "file_path": {
                        "type": "string",
                        "description": "Path to the CSV file"
                    },
                    "data": rows_schema("List of rows to append, where each row is a list of values")
                },
                "required": ["file_path", "data"]
            }),
        ),
        append_csv,
    )?;

    registry.register(
        ToolSpec::new(
            "update_csv",
            "Update a specific cell in a CSV file",
            json!({
                "type": "object",
                "properties": {
                    "file_path": {
                        "type": "string",
                        "description": "Path to the CSV file"
                    },
                    "row_index": {
                        "type": "integer",
                        "description": "Index of the row to update (0-based)"
                    },
                    "column_name": {
                        "type": "string",
                        "description": "Name of the column to update"
                    },
                    "new_value": {
                        "type": "string",
                        "description": "New value to set"
                    }
                },
                "required": ["file_path", "row_index", "column_name", "new_value"]
            }),
        ),
        update_csv,
    )?;

    registry.register(
        ToolSpec::new(
            "query_csv",
            "Query a CSV file with a row filter expression",
            json!({
                "type": "object",
                "properties": {
                    "file_path": {
                        "type": "string",
                        "description": "Path to the CSV file"
                    },
                    "query": {
                        "type": "string",
                        "description": "Filter expression over column names, e.g. 'age > 25 and city == \"New York\"'. Supports == != < <= > >=, in / not in [..], and / or / not, parentheses and `backticked column names`"
                    }
                },
                "required": ["file_path", "query"]
            }),
        ),
        query_csv,
    )?;

    registry.register(
        ToolSpec::new(
            "add_columns_csv",
            "Add new columns to an existing CSV file",
            json!({
                "type": "object",
                "properties": {
                    "file_path": {
                        "type": "string",
                        "description": "Path to the CSV file"
                    },
                    "new_columns": {
                        "type": "object",
                        "description": "Dictionary of column names and their data",
                        "additionalProperties": {
                            "type": "array",
                            "items": {"type": "string"}
                        }
                    }
                },
                "required": ["file_path", "new_columns"]
            }),
        ),
        add_columns_csv,
    )?;

    Ok(())
}

/// Overwrites any existing file.
pub fn create_csv(args: &Value) -> ToolResult<Value> {
    let file_path = required_str(args, "file_path")?;
    let headers = required_string_list(args, "headers")?;
    let data = required_rows(args, "data")?;

    Table::new(headers, data)
        .and_then(|table| table.write(Path::new(file_path)))
        .map_err(|e| e.context("Error creating CSV file"))?;

    Ok(json!({
        "success": true,
        "message": format!("Successfully created CSV file at {}", file_path)
    }))
}

/// `num_rows` absent or zero reads every row; a negative count drops that
/// many rows from the end.
pub fn read_csv(args: &Value) -> ToolResult<Value> {
    let file_path = required_str(args, "file_path")?;
    let num_rows = optional_i64(args, "num_rows")?;

    let table = Table::read(Path::new(file_path)).map_err(|e| e.context("Error reading CSV file"))?;
    let table = match num_rows {
        None | Some(0) => table,
        Some(n) if n > 0 => table.head(n as usize),
        Some(n) => {
            let keep = table.rows.len().saturating_sub(n.unsigned_abs() as usize);
            table.head(keep)
        }
    };

    Ok(json!({
        "headers": &table.headers,
        "data": &table.rows,
        "shape": shape(&table),
        "preview": table.preview()
    }))
}

pub fn append_csv(args: &Value) -> ToolResult<Value> {
    let file_path = required_str(args, "file_path")?;
    let data = required_rows(args, "data")?;
    let path = Path::new(file_path);

    Table::read(path)
        .and_then(|table| table.append_rows(path, &data))
        .map_err(|e| e.context("Error appending to CSV file"))?;

    Ok(json!({
        "success": true,
        "message": format!("Successfully appended {} rows to {}", data.len(), file_path)
    }))
}

/// The file is only rewritten once the row and column are known to exist.
pub fn update_csv(args: &Value) -> ToolResult<Value> {
    let file_path = required_str(args, "file_path")?;
    let row_index = required_i64(args, "row_index")?;
    let column_name = required_str(args, "column_name")?;
    let new_value = required_str(args, "new_value")?;
    let path = Path::new(file_path);

    let mut table = Table::read(path).map_err(|e| e.context("Error updating CSV file"))?;

    let row = usize::try_from(row_index)
        .ok()
        .filter(|&row| row < table.rows.len())
        .ok_or_else(|| {
            ToolError::ExecutionError(format!("Row index {} out of bounds", row_index))
        })?;
    let column = table.column_index(column_name).ok_or_else(|| {
        ToolError::ExecutionError(format!("Column '{}' not found", column_name))
    })?;

    table.rows[row][column] = new_value.to_string();
    table
        .write(path)
        .map_err(|e| e.context("Error updating CSV file"))?;

    Ok(json!({
        "success": true,
        "message": format!(
            "Successfully updated cell at row {}, column '{}'",
            row_index, column_name
        )
    }))
}

/// Matching rows keep their original positions as preview labels.
pub fn query_csv(args: &Value) -> ToolResult<Value> {
    let file_path = required_str(args, "file_path")?;
    let query = required_str(args, "query")?;

    let (labels, rows, headers) = Table::read(Path::new(file_path))
        .and_then(|table| {
            let filter = Filter::parse(query, &table.headers)?;
            let labels = filter.select(&table.rows)?;
            let rows: Vec<Vec<String>> =
                labels.iter().map(|&index| table.rows[index].clone()).collect();
            Ok((labels, rows, table.headers))
        })
        .map_err(|e| e.context("Error querying CSV file"))?;

    let preview = render_preview(&headers, &rows, &labels);
    Ok(json!({
        "shape": [rows.len(), headers.len()],
        "data": rows,
        "preview": preview
    }))
}

/// Columns that already exist are replaced in place. Nothing is written
/// unless every new column has one value per row.
pub fn add_columns_csv(args: &Value) -> ToolResult<Value> {
    let file_path = required_str(args, "file_path")?;
    let new_columns = required_object(args, "new_columns")?;
    let path = Path::new(file_path);

    let mut table = Table::read(path).map_err(|e| e.context("Error adding columns to CSV file"))?;

    let mut columns = Vec::with_capacity(new_columns.len());
    for (name, values) in new_columns {
        let values = string_list(values, name)?;
        if values.len() != table.rows.len() {
            return Err(ToolError::ExecutionError(format!(
                "Column {} data length ({}) does not match CSV length ({})",
                name,
                values.len(),
                table.rows.len()
            )));
        }
        columns.push((name.as_str(), values));
    }

    for (name, values) in &columns {
        match table.column_index(name) {
            Some(index) => {
                for (row, value) in table.rows.iter_mut().zip(values) {
                    row[index] = value.clone();
                }
            }
            None => {
                table.headers.push(name.to_string());
                for (row, value) in table.rows.iter_mut().zip(values) {
                    row.push(value.clone());
                }
            }
        }
    }

    table
        .write(path)
        .map_err(|e| e.context("Error adding columns to CSV file"))?;

    let names: Vec<&str> = columns.iter().map(|(name, _)| *name).collect();
    Ok(json!({
        "success": true,
        "message": format!("Successfully added columns: {}", names.join(", ")),
        "preview": table.preview()
    }))
}

fn shape(table: &Table) -> Value {
    let (rows, columns) = table.shape();
    json!([rows, columns])
}
