use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use crate::errors::{ToolError, ToolResult};

/// A CSV file held in memory: a header row plus string cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Build a table, checking every row against the header width.
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> ToolResult<Self> {
        if headers.is_empty() {
            return Err(ToolError::InvalidParameters(
                "a table needs at least one column".to_string(),
            ));
        }
        let table = Self { headers, rows };
        table.check_widths(&table.rows, 0)?;
        Ok(table)
    }

    pub fn read(path: &Path) -> ToolResult<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(path)
            .map_err(|e| execution(path, e))?;

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| execution(path, e))?
            .iter()
            .map(str::to_string)
            .collect();
        if headers.is_empty() || headers.iter().all(String::is_empty) {
            return Err(ToolError::ExecutionError(
                "No columns to parse from file".to_string(),
            ));
        }

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| execution(path, e))?;
            rows.push(record.iter().map(str::to_string).collect());
        }

        Ok(Self { headers, rows })
    }

    /// Replace the file with this table.
    pub fn write(&self, path: &Path) -> ToolResult<()> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer
            .write_record(&self.headers)
            .map_err(|e| execution(path, e))?;
        for row in &self.rows {
            writer.write_record(row).map_err(|e| execution(path, e))?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| ToolError::ExecutionError(e.to_string()))?;
        fs::write(path, bytes).map_err(|e| execution(path, e))
    }

    /// Append rows to the file without rewriting what is already there.
    pub fn append_rows(&self, path: &Path, rows: &[Vec<String>]) -> ToolResult<()> {
        self.check_widths(rows, self.rows.len())?;
        let existing = fs::read(path).map_err(|e| execution(path, e))?;
        let mut file = OpenOptions::new()
            .append(true)
            .open(path)
            .map_err(|e| execution(path, e))?;
        if !existing.is_empty() && !existing.ends_with(b"\n") {
            file.write_all(b"\n").map_err(|e| execution(path, e))?;
        }
        let mut writer = csv::Writer::from_writer(file);
        for row in rows {
            writer.write_record(row).map_err(|e| execution(path, e))?;
        }
        writer.flush().map_err(|e| execution(path, e))
    }

    /// (rows, columns)
    pub fn shape(&self) -> (usize, usize) {
        (self.rows.len(), self.headers.len())
    }

    pub fn head(&self, n: usize) -> Table {
        Table {
            headers: self.headers.clone(),
            rows: self.rows.iter().take(n).cloned().collect(),
        }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Text rendering with row labels 0..n.
    pub fn preview(&self) -> String {
        let labels: Vec<usize> = (0..self.rows.len()).collect();
        render_preview(&self.headers, &self.rows, &labels)
    }

    fn check_widths(&self, rows: &[Vec<String>], first_index: usize) -> ToolResult<()> {
        for (offset, row) in rows.iter().enumerate() {
            if row.len() != self.headers.len() {
                return Err(ToolError::InvalidParameters(format!(
                    "row {} has {} values but the table has {} columns",
                    first_index + offset,
                    row.len(),
                    self.headers.len()
                )));
            }
        }
        Ok(())
    }
}

/// Fixed-width text table: a left-aligned label column, then right-aligned
/// columns separated by two spaces.
pub fn render_preview(headers: &[String], rows: &[Vec<String>], labels: &[usize]) -> String {
    if rows.is_empty() {
        return format!(
            "Empty DataFrame\nColumns: [{}]\nIndex: []",
            headers.join(", ")
        );
    }

    let labels: Vec<String> = labels.iter().map(usize::to_string).collect();
    let label_width = labels.iter().map(|l| l.chars().count()).max().unwrap_or(0);

    let widths: Vec<usize> = headers
        .iter()
        .enumerate()
        .map(|(column, header)| {
            rows.iter()
                .filter_map(|row| row.get(column))
                .map(|cell| cell.chars().count())
                .chain(std::iter::once(header.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut lines = Vec::with_capacity(rows.len() + 1);

    let mut header_line = " ".repeat(label_width);
    for (header, width) in headers.iter().zip(&widths) {
        header_line.push_str(&format!("  {:>width$}", header, width = width));
    }
    lines.push(header_line);

    for (label, row) in labels.iter().zip(rows) {
        let mut line = format!("{:<width$}", label, width = label_width);
        for (column, width) in widths.iter().enumerate() {
            let cell = row.get(column).map(String::as_str).unwrap_or("");
            line.push_str(&format!("  {:>width$}", cell, width = width));
        }
        lines.push(line);
    }

    lines.join("\n")
}

fn execution(path: &Path, err: impl std::fmt::Display) -> ToolError {
    ToolError::ExecutionError(format!("{}: {}", path.display(), err))
}
