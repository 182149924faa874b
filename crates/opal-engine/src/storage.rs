//! Textual table persistence.
//!
//! Each table is saved as `<lowercased name>.tbl`: the display name on the
//! first line, a tab-separated header of `name:TYPE[:NOTNULL]` column specs
//! on the second, the row count on the third, then one tab-separated line
//! per row. Round-trip identity is not guaranteed for numeric values whose
//! string form differs after a parse.

use std::fs;
use std::io::Write;
use std::path::Path;

use crate::error::{EngineError, Result};
use crate::schema::{Column, DataType};
use crate::table::Table;

/// A table read back from disk.
#[derive(Debug)]
pub struct LoadedTable {
    /// Display name.
    pub name: String,
    /// Column schema.
    pub columns: Vec<Column>,
    /// Rows, verbatim.
    pub rows: Vec<Vec<String>>,
}

/// File extension used for table files.
pub const TABLE_FILE_EXTENSION: &str = "tbl";

fn column_spec(column: &Column) -> String {
    if column.not_null {
        format!("{}:{}:NOTNULL", column.name, column.data_type)
    } else {
        format!("{}:{}", column.name, column.data_type)
    }
}

fn parse_column_spec(spec: &str) -> Result<Column> {
    let mut parts = spec.split(':');
    let name = parts
        .next()
        .filter(|n| !n.is_empty())
        .ok_or_else(|| EngineError::Schema(format!("malformed column spec '{spec}'")))?;
    let type_name = parts
        .next()
        .ok_or_else(|| EngineError::Schema(format!("malformed column spec '{spec}'")))?;
    let not_null = parts.next() == Some("NOTNULL");
    let column = Column::new(name, DataType::parse(type_name));
    Ok(if not_null { column.not_null() } else { column })
}

/// Writes one table to `<dir>/<name>.tbl`.
///
/// # Errors
///
/// Fails on I/O errors.
pub fn save_table(table: &Table, dir: &Path) -> Result<()> {
    let path = dir.join(format!(
        "{}.{TABLE_FILE_EXTENSION}",
        table.name().to_lowercase()
    ));
    let mut file = fs::File::create(path)?;

    writeln!(file, "{}", table.name())?;
    let header: Vec<String> = table.columns().iter().map(column_spec).collect();
    writeln!(file, "{}", header.join("\t"))?;
    writeln!(file, "{}", table.row_count())?;
    for row in table.rows() {
        writeln!(file, "{}", row.join("\t"))?;
    }
    Ok(())
}

/// Reads one table file.
///
/// # Errors
///
/// Fails on I/O errors or a malformed file.
pub fn load_table(path: &Path) -> Result<LoadedTable> {
    let content = fs::read_to_string(path)?;
    let mut lines = content.lines();

    let name = lines
        .next()
        .filter(|n| !n.is_empty())
        .ok_or_else(|| malformed(path, "missing table name"))?
        .to_string();
    let header = lines.next().ok_or_else(|| malformed(path, "missing header"))?;
    let columns: Vec<Column> = header
        .split('\t')
        .filter(|s| !s.is_empty())
        .map(parse_column_spec)
        .collect::<Result<_>>()?;
    let count: usize = lines
        .next()
        .and_then(|line| line.trim().parse().ok())
        .ok_or_else(|| malformed(path, "missing row count"))?;

    let mut rows = Vec::with_capacity(count);
    for _ in 0..count {
        let line = lines.next().ok_or_else(|| malformed(path, "missing row"))?;
        let mut row: Vec<String> = line.split('\t').map(ToString::to_string).collect();
        // Trailing empty cells serialize shorter than the column count;
        // pad them back out.
        if row.len() < columns.len() {
            row.resize(columns.len(), String::new());
        }
        if row.len() != columns.len() {
            return Err(malformed(path, "row width mismatch"));
        }
        rows.push(row);
    }

    Ok(LoadedTable {
        name,
        columns,
        rows,
    })
}

fn malformed(path: &Path, what: &str) -> EngineError {
    EngineError::Schema(format!(
        "malformed table file '{}': {what}",
        path.display()
    ))
}

/// Reads every `.tbl` file under a directory, sorted by file name.
///
/// # Errors
///
/// Fails on I/O errors or a malformed file.
pub fn load_dir(dir: &Path) -> Result<Vec<LoadedTable>> {
    let mut paths: Vec<_> = fs::read_dir(dir)?
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .is_some_and(|ext| ext == TABLE_FILE_EXTENSION)
        })
        .collect();
    paths.sort();

    paths.iter().map(|path| load_table(path)).collect()
}
