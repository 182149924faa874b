//! Secondary index: a column-value to row-ordinal map.

use std::collections::HashMap;

/// An equality index over one column of a row list.
#[derive(Debug, Clone, Default)]
pub struct Index {
    column: String,
    entries: HashMap<String, Vec<usize>>,
}

impl Index {
    /// Creates an empty index for the named column.
    #[must_use]
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            entries: HashMap::new(),
        }
    }

    /// The indexed column name.
    #[must_use]
    pub fn column(&self) -> &str {
        &self.column
    }

    /// Rebuilds the index from rows, taking values at `column_index`.
    pub fn build(&mut self, rows: &[Vec<String>], column_index: usize) {
        self.entries.clear();
        for (ordinal, row) in rows.iter().enumerate() {
            if let Some(value) = row.get(column_index) {
                self.entries.entry(value.clone()).or_default().push(ordinal);
            }
        }
    }

    /// Returns the row ordinals holding the value.
    #[must_use]
    pub fn lookup(&self, value: &str) -> Vec<usize> {
        self.entries.get(value).cloned().unwrap_or_default()
    }
}
