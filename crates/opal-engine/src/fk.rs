//! Cross-table foreign-key validation.
//!
//! The registry maps lowercased table names to probe closures supplied at
//! registration time. It is an explicit value owned by the database rather
//! than process-global state, which keeps tests hermetic. The internal
//! mutex is always released before a registered closure runs, since the
//! closure will take the referenced table's own lock.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::schema::{Constraint, ConstraintKind};

/// Probe: does `column` contain `value` in the registered table?
pub type ValueExistsFn = Box<dyn Fn(&str, &str) -> bool + Send + Sync>;

/// Probe: all current rows of the registered table.
pub type AllRowsFn = Box<dyn Fn() -> Vec<Vec<String>> + Send + Sync>;

/// A registered table: its column names plus the two probes.
pub struct FkEntry {
    /// Case-preserving table name.
    pub table_name: String,
    /// Column names, in table order.
    pub columns: Vec<String>,
    value_exists: ValueExistsFn,
    all_rows: AllRowsFn,
}

impl std::fmt::Debug for FkEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FkEntry")
            .field("table_name", &self.table_name)
            .field("columns", &self.columns)
            .finish_non_exhaustive()
    }
}

/// Registry of tables participating in foreign-key relationships.
#[derive(Debug, Default)]
pub struct ForeignKeyRegistry {
    tables: Mutex<HashMap<String, Arc<FkEntry>>>,
}

fn is_null_value(value: &str) -> bool {
    value.is_empty() || value.eq_ignore_ascii_case("null")
}

fn position_of(name: &str, columns: &[String]) -> Option<usize> {
    columns.iter().position(|c| c.eq_ignore_ascii_case(name))
}

impl ForeignKeyRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or re-registers) a table with its probes.
    pub fn register_table(
        &self,
        table_name: &str,
        columns: Vec<String>,
        value_exists: ValueExistsFn,
        all_rows: AllRowsFn,
    ) {
        let entry = Arc::new(FkEntry {
            table_name: table_name.to_string(),
            columns,
            value_exists,
            all_rows,
        });
        self.tables
            .lock()
            .insert(table_name.to_lowercase(), entry);
        debug!(table = table_name, "table registered with FK validator");
    }

    /// Removes a table from the registry.
    pub fn unregister_table(&self, table_name: &str) {
        self.tables.lock().remove(&table_name.to_lowercase());
        debug!(table = table_name, "table unregistered from FK validator");
    }

    /// Whether the table is currently registered.
    #[must_use]
    pub fn is_registered(&self, table_name: &str) -> bool {
        self.tables.lock().contains_key(&table_name.to_lowercase())
    }

    /// Validates one foreign-key constraint for a candidate row.
    ///
    /// `source_columns` names the positions of `row` in the referencing
    /// table. A row whose FK columns are all present is satisfied when a
    /// referenced row matches component-wise by exact string equality; any
    /// NULL (empty or "null") FK value satisfies the constraint outright.
    #[must_use]
    pub fn validate(
        &self,
        constraint: &Constraint,
        row: &[String],
        source_columns: &[String],
    ) -> bool {
        let ConstraintKind::ForeignKey {
            referenced_table,
            referenced_columns,
            ..
        } = &constraint.kind
        else {
            return false;
        };

        // Clone the entry out so the registry guard drops before any probe
        // runs.
        let entry = {
            let tables = self.tables.lock();
            match tables.get(&referenced_table.to_lowercase()) {
                Some(entry) => Arc::clone(entry),
                None => {
                    debug!(
                        constraint = %constraint.name,
                        table = %referenced_table,
                        "referenced table not registered"
                    );
                    return false;
                }
            }
        };

        let mut fk_values = Vec::with_capacity(constraint.columns.len());
        for column in &constraint.columns {
            let Some(idx) = position_of(column, source_columns) else {
                debug!(constraint = %constraint.name, column = %column, "FK column not found");
                return false;
            };
            let Some(value) = row.get(idx) else {
                return false;
            };
            if is_null_value(value) {
                return true;
            }
            fk_values.push(value.as_str());
        }

        let mut referenced_positions = Vec::with_capacity(referenced_columns.len());
        for column in referenced_columns {
            let Some(idx) = position_of(column, &entry.columns) else {
                debug!(
                    constraint = %constraint.name,
                    column = %column,
                    "referenced column not found"
                );
                return false;
            };
            referenced_positions.push(idx);
        }

        if fk_values.len() != referenced_positions.len() {
            return false;
        }

        // Single-column references get a direct probe.
        if let ([value], [_]) = (fk_values.as_slice(), referenced_positions.as_slice()) {
            return (entry.value_exists)(&referenced_columns[0], value);
        }

        let rows = (entry.all_rows)();
        rows.iter().any(|candidate| {
            fk_values
                .iter()
                .zip(&referenced_positions)
                .all(|(value, &idx)| candidate.get(idx).map(String::as_str) == Some(*value))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_with_parent(rows: Vec<Vec<String>>) -> ForeignKeyRegistry {
        let registry = ForeignKeyRegistry::new();
        let shared = Arc::new(rows);
        let for_exists = Arc::clone(&shared);
        let for_rows = Arc::clone(&shared);
        registry.register_table(
            "Parent",
            vec!["id".to_string(), "region".to_string()],
            Box::new(move |column, value| {
                let idx = match column.to_lowercase().as_str() {
                    "id" => 0,
                    "region" => 1,
                    _ => return false,
                };
                for_exists.iter().any(|r| r[idx] == value)
            }),
            Box::new(move || for_rows.as_ref().clone()),
        );
        registry
    }

    fn fk(columns: &[&str], referenced: &[&str]) -> Constraint {
        Constraint::foreign_key(
            "fk_child_parent",
            columns.iter().map(ToString::to_string).collect(),
            "parent",
            referenced.iter().map(ToString::to_string).collect(),
        )
    }

    fn row(values: &[&str]) -> Vec<String> {
        values.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_single_column_probe() {
        let registry = registry_with_parent(vec![row(&["1", "eu"]), row(&["2", "us"])]);
        let constraint = fk(&["pid"], &["id"]);
        let source = row(&["pid"]);

        assert!(registry.validate(&constraint, &row(&["1"]), &source));
        assert!(registry.validate(&constraint, &row(&["2"]), &source));
        assert!(!registry.validate(&constraint, &row(&["3"]), &source));
    }

    #[test]
    fn test_null_fk_value_satisfies() {
        let registry = registry_with_parent(vec![row(&["1", "eu"])]);
        let constraint = fk(&["pid"], &["id"]);
        let source = row(&["pid"]);

        assert!(registry.validate(&constraint, &row(&[""]), &source));
        assert!(registry.validate(&constraint, &row(&["NULL"]), &source));
        assert!(registry.validate(&constraint, &row(&["null"]), &source));
    }

    #[test]
    fn test_multi_column_row_scan() {
        let registry = registry_with_parent(vec![row(&["1", "eu"]), row(&["2", "us"])]);
        let constraint = fk(&["pid", "pregion"], &["id", "region"]);
        let source = row(&["pid", "pregion"]);

        assert!(registry.validate(&constraint, &row(&["1", "eu"]), &source));
        assert!(!registry.validate(&constraint, &row(&["1", "us"]), &source));
    }

    #[test]
    fn test_unregistered_table_violates() {
        let registry = ForeignKeyRegistry::new();
        let constraint = fk(&["pid"], &["id"]);
        assert!(!registry.validate(&constraint, &row(&["1"]), &row(&["pid"])));
    }

    #[test]
    fn test_unregister_pairs_with_register() {
        let registry = registry_with_parent(vec![row(&["1", "eu"])]);
        assert!(registry.is_registered("parent"));
        registry.unregister_table("PARENT");
        assert!(!registry.is_registered("parent"));
    }

    #[test]
    fn test_missing_source_column_violates() {
        let registry = registry_with_parent(vec![row(&["1", "eu"])]);
        let constraint = fk(&["nope"], &["id"]);
        assert!(!registry.validate(&constraint, &row(&["1"]), &row(&["pid"])));
    }
}
