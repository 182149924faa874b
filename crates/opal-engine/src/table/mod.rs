//! Table model: schema, rows, constraints, and DML.
//!
//! A table stores every cell as a string; type semantics are applied by the
//! operators that consume values. Rows keep insertion order, and a
//! monotonic row-id counter advances on every insert. Concurrency control
//! wraps each table in `Arc<RwLock<Table>>` at the database level; the
//! methods here assume the caller holds the appropriate guard.

mod join;

pub use join::{
    full_outer_join, inner_join, join, left_outer_join, natural_join, right_outer_join,
    set_except, set_intersect, set_union, JoinType,
};

use regex::Regex;

use crate::aggregate;
use crate::error::{EngineError, Result};
use crate::fk::ForeignKeyRegistry;
use crate::predicate::{parse_predicate, resolve_column};
use crate::schema::{Column, Constraint, ConstraintKind};

/// A materialized query result: output labels plus rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowSet {
    /// Output column labels.
    pub columns: Vec<String>,
    /// Result rows.
    pub rows: Vec<Vec<String>>,
}

/// One ORDER BY key.
#[derive(Debug, Clone, PartialEq)]
pub struct SortKey {
    /// Column (or output label) to sort by.
    pub column: String,
    /// True for DESC.
    pub descending: bool,
}

impl SortKey {
    /// Ascending key.
    #[must_use]
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: false,
        }
    }

    /// Descending key.
    #[must_use]
    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: true,
        }
    }
}

/// An in-memory table.
#[derive(Debug, Clone)]
pub struct Table {
    name: String,
    columns: Vec<Column>,
    rows: Vec<Vec<String>>,
    constraints: Vec<Constraint>,
    next_row_id: u64,
}

fn is_null_value(value: &str) -> bool {
    value.is_empty() || value.eq_ignore_ascii_case("null")
}

impl Table {
    /// Creates an empty table.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            rows: Vec::new(),
            constraints: Vec::new(),
            next_row_id: 1,
        }
    }

    /// The table name (case-preserving).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Column definitions in declaration order.
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Column names in declaration order.
    #[must_use]
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Current rows in insertion order.
    #[must_use]
    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// Number of rows.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Table constraints.
    #[must_use]
    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    /// Next row id the table will assign.
    #[must_use]
    pub fn next_row_id(&self) -> u64 {
        self.next_row_id
    }

    /// Replaces the row list wholesale, bypassing constraint checks.
    ///
    /// Used by rollback restore and by the storage loader, both of which
    /// reinstate rows that were valid when captured.
    pub fn set_rows(&mut self, rows: Vec<Vec<String>>) {
        self.rows = rows;
    }

    /// Removes every row.
    pub fn clear_rows(&mut self) {
        self.rows.clear();
    }

    /// Resolves a column name to its position, case-insensitively.
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Whether the named column exists.
    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    // Schema operations

    /// Appends a column; existing rows get an empty (NULL) cell.
    ///
    /// # Errors
    ///
    /// Fails when the name collides with an existing column.
    pub fn add_column(&mut self, column: Column) -> Result<()> {
        if self.has_column(&column.name) {
            return Err(EngineError::duplicate("column", &column.name));
        }
        self.columns.push(column);
        for row in &mut self.rows {
            row.push(String::new());
        }
        Ok(())
    }

    /// Drops a column, removing its cell from every row.
    ///
    /// # Errors
    ///
    /// Fails when the column does not exist.
    pub fn drop_column(&mut self, name: &str) -> Result<()> {
        let idx = self
            .column_index(name)
            .ok_or_else(|| EngineError::unknown_column(&self.name, name))?;
        self.columns.remove(idx);
        for row in &mut self.rows {
            if idx < row.len() {
                row.remove(idx);
            }
        }
        Ok(())
    }

    /// Renames a column; metadata-only.
    ///
    /// # Errors
    ///
    /// Fails when the old name is unknown or the new name collides.
    pub fn rename_column(&mut self, old_name: &str, new_name: &str) -> Result<()> {
        let idx = self
            .column_index(old_name)
            .ok_or_else(|| EngineError::unknown_column(&self.name, old_name))?;
        if !old_name.eq_ignore_ascii_case(new_name) && self.has_column(new_name) {
            return Err(EngineError::duplicate("column", new_name));
        }
        self.columns[idx].name = new_name.to_string();
        Ok(())
    }

    /// Adds a constraint.
    ///
    /// # Errors
    ///
    /// Fails when the constraint name is already taken in this table.
    pub fn add_constraint(&mut self, constraint: Constraint) -> Result<()> {
        if self
            .constraints
            .iter()
            .any(|c| c.name.eq_ignore_ascii_case(&constraint.name))
        {
            return Err(EngineError::duplicate("constraint", &constraint.name));
        }
        self.constraints.push(constraint);
        Ok(())
    }

    /// Drops a constraint by name.
    ///
    /// # Errors
    ///
    /// Fails when no constraint carries the name.
    pub fn drop_constraint(&mut self, name: &str) -> Result<()> {
        let before = self.constraints.len();
        self.constraints
            .retain(|c| !c.name.eq_ignore_ascii_case(name));
        if self.constraints.len() == before {
            return Err(EngineError::Schema(format!(
                "constraint '{name}' does not exist on table '{}'",
                self.name
            )));
        }
        Ok(())
    }

    // DML operations

    /// Validates and appends a row, returning its row id.
    ///
    /// # Errors
    ///
    /// Fails on a length mismatch or any constraint violation.
    pub fn add_row(&mut self, values: Vec<String>, fk: &ForeignKeyRegistry) -> Result<u64> {
        if values.len() != self.columns.len() {
            return Err(EngineError::Schema(format!(
                "table '{}' expects {} values, got {}",
                self.name,
                self.columns.len(),
                values.len()
            )));
        }
        self.validate_row(&values, fk, None)?;
        self.rows.push(values);
        let row_id = self.next_row_id;
        self.next_row_id += 1;
        Ok(row_id)
    }

    /// Applies assignments to every row matching the condition.
    ///
    /// The condition string is parsed once; each matching row is rewritten
    /// and re-validated before it replaces the original. Returns the number
    /// of rows updated.
    ///
    /// # Errors
    ///
    /// Fails on a parse error, an unknown assignment column, or a
    /// constraint violation by a rewritten row.
    pub fn update_rows(
        &mut self,
        updates: &[(String, String)],
        condition: &str,
        fk: &ForeignKeyRegistry,
    ) -> Result<usize> {
        let expr = parse_predicate(condition)?;
        let columns = self.column_names();

        let mut assignments = Vec::with_capacity(updates.len());
        for (column, value) in updates {
            let idx = self
                .column_index(column)
                .ok_or_else(|| EngineError::unknown_column(&self.name, column))?;
            assignments.push((idx, value.clone()));
        }

        let mut updated = 0;
        for i in 0..self.rows.len() {
            if !expr.evaluate(&self.rows[i], &columns) {
                continue;
            }
            let mut candidate = self.rows[i].clone();
            for (idx, value) in &assignments {
                candidate[*idx].clone_from(value);
            }
            self.validate_row(&candidate, fk, Some(i))?;
            self.rows[i] = candidate;
            updated += 1;
        }
        Ok(updated)
    }

    /// Removes every row matching the condition, returning the removed
    /// rows (the caller enforces referential integrity across tables).
    ///
    /// # Errors
    ///
    /// Fails when the condition does not parse.
    pub fn delete_rows(&mut self, condition: &str) -> Result<Vec<Vec<String>>> {
        let expr = parse_predicate(condition)?;
        let columns = self.column_names();

        let mut kept = Vec::with_capacity(self.rows.len());
        let mut removed = Vec::new();
        for row in self.rows.drain(..) {
            if expr.evaluate(&row, &columns) {
                removed.push(row);
            } else {
                kept.push(row);
            }
        }
        self.rows = kept;
        Ok(removed)
    }

    /// Evaluates a query against the table and materializes the result.
    ///
    /// `select_columns` may contain `*`, plain or aggregate entries. With a
    /// non-empty `group_by` (or any aggregate in the select list) rows are
    /// partitioned by the group key, aggregates fold per group, and the
    /// HAVING predicate filters groups. ORDER BY sorts numerically when
    /// every key value parses as a number, lexicographically otherwise.
    ///
    /// # Errors
    ///
    /// Fails on parse errors or unknown columns.
    pub fn select_rows(
        &self,
        select_columns: &[String],
        condition: &str,
        order_by: &[SortKey],
        group_by: &[String],
        having: &str,
    ) -> Result<RowSet> {
        let expr = parse_predicate(condition)?;
        let columns = self.column_names();

        let filtered: Vec<&Vec<String>> = self
            .rows
            .iter()
            .filter(|row| expr.evaluate(row, &columns))
            .collect();

        let has_aggregates = select_columns
            .iter()
            .any(|c| parse_aggregate_call(c).is_some());

        if !group_by.is_empty() || has_aggregates {
            return self.select_grouped(
                select_columns,
                &columns,
                &filtered,
                order_by,
                group_by,
                having,
            );
        }

        let mut rows: Vec<Vec<String>> = filtered.into_iter().cloned().collect();
        sort_rows(&mut rows, &columns, order_by)?;
        project(&columns, &rows, select_columns)
    }

    fn select_grouped(
        &self,
        select_columns: &[String],
        columns: &[String],
        filtered: &[&Vec<String>],
        order_by: &[SortKey],
        group_by: &[String],
        having: &str,
    ) -> Result<RowSet> {
        let mut group_indices = Vec::with_capacity(group_by.len());
        for name in group_by {
            let idx = resolve_column(name, columns)
                .ok_or_else(|| EngineError::unknown_column(&self.name, name))?;
            group_indices.push(idx);
        }

        // Partition preserving first-appearance order of each group key.
        let mut groups: Vec<(Vec<String>, Vec<&Vec<String>>)> = Vec::new();
        for row in filtered {
            let key: Vec<String> = group_indices
                .iter()
                .map(|&i| row.get(i).cloned().unwrap_or_default())
                .collect();
            match groups.iter_mut().find(|(k, _)| *k == key) {
                Some((_, members)) => members.push(*row),
                None => groups.push((key, vec![*row])),
            }
        }

        // A pure-aggregate query over zero group columns folds everything
        // into a single group.
        if group_by.is_empty() {
            groups = vec![(Vec::new(), filtered.to_vec())];
        }

        let labels: Vec<String> = if select_columns.iter().any(|c| c == "*") {
            if group_by.is_empty() {
                columns.to_vec()
            } else {
                group_by.to_vec()
            }
        } else {
            select_columns.to_vec()
        };

        let having_rewrite = rewrite_aggregate_calls(having);

        let mut output = Vec::new();
        for (_, members) in &groups {
            let group_rows: Vec<Vec<String>> =
                members.iter().map(|r| (*r).clone()).collect();

            if !having.is_empty() {
                let first = members.first().map_or_else(Vec::new, |r| (*r).clone());
                let mut extended_columns = columns.to_vec();
                let mut extended_row = first;
                extended_row.resize(extended_columns.len(), String::new());
                for (placeholder, func, arg) in &having_rewrite.calls {
                    extended_columns.push(placeholder.clone());
                    extended_row.push(apply_aggregate(func, arg, &group_rows, columns)?);
                }
                let predicate = parse_predicate(&having_rewrite.condition)?;
                if !predicate.evaluate(&extended_row, &extended_columns) {
                    continue;
                }
            }

            let mut out_row = Vec::with_capacity(labels.len());
            for label in &labels {
                if let Some((func, arg)) = parse_aggregate_call(label) {
                    out_row.push(apply_aggregate(&func, &arg, &group_rows, columns)?);
                } else {
                    let idx = resolve_column(label, columns)
                        .ok_or_else(|| EngineError::unknown_column(&self.name, label))?;
                    out_row.push(
                        members
                            .first()
                            .and_then(|r| r.get(idx))
                            .cloned()
                            .unwrap_or_default(),
                    );
                }
            }
            output.push(out_row);
        }

        sort_rows(&mut output, &labels, order_by)?;
        Ok(RowSet {
            columns: labels,
            rows: output,
        })
    }

    // Constraint validation

    /// Validates one candidate row against every constraint, in order:
    /// NOT NULL, UNIQUE, PRIMARY KEY, CHECK, FOREIGN KEY.
    ///
    /// `skip` excludes a row ordinal from uniqueness scans (the row being
    /// updated).
    pub fn validate_row(
        &self,
        row: &[String],
        fk: &ForeignKeyRegistry,
        skip: Option<usize>,
    ) -> Result<()> {
        let columns = self.column_names();

        // 1. NOT NULL: column flags, then NOT_NULL constraints.
        for (i, column) in self.columns.iter().enumerate() {
            if column.not_null && row.get(i).is_none_or(|v| is_null_value(v)) {
                return Err(EngineError::constraint(
                    "NOT NULL",
                    format!("column '{}' is null", column.name),
                ));
            }
        }
        for constraint in &self.constraints {
            if constraint.kind == ConstraintKind::NotNull {
                self.check_not_null(constraint, row)?;
            }
        }

        // 2. UNIQUE.
        for constraint in &self.constraints {
            if constraint.kind == ConstraintKind::Unique {
                self.check_unique(constraint, row, skip)?;
            }
        }

        // 3. PRIMARY KEY = UNIQUE + NOT NULL across the key columns.
        for constraint in &self.constraints {
            if constraint.kind == ConstraintKind::PrimaryKey {
                self.check_not_null(constraint, row)?;
                self.check_unique(constraint, row, skip)?;
            }
        }

        // 4. CHECK: the predicate is parsed lazily, per validation.
        for constraint in &self.constraints {
            if let ConstraintKind::Check { expression } = &constraint.kind {
                let predicate = parse_predicate(expression)?;
                if !predicate.evaluate(row, &columns) {
                    return Err(EngineError::constraint(
                        constraint.name.clone(),
                        format!("check expression '{expression}' is false"),
                    ));
                }
            }
        }

        // 5. FOREIGN KEY.
        for constraint in &self.constraints {
            if matches!(constraint.kind, ConstraintKind::ForeignKey { .. })
                && !fk.validate(constraint, row, &columns)
            {
                return Err(EngineError::constraint(
                    constraint.name.clone(),
                    "referenced row does not exist",
                ));
            }
        }

        Ok(())
    }

    fn check_not_null(&self, constraint: &Constraint, row: &[String]) -> Result<()> {
        for column in &constraint.columns {
            let idx = self
                .column_index(column)
                .ok_or_else(|| EngineError::unknown_column(&self.name, column))?;
            if row.get(idx).is_none_or(|v| is_null_value(v)) {
                return Err(EngineError::constraint(
                    constraint.name.clone(),
                    format!("column '{column}' is null"),
                ));
            }
        }
        Ok(())
    }

    fn check_unique(
        &self,
        constraint: &Constraint,
        row: &[String],
        skip: Option<usize>,
    ) -> Result<()> {
        let mut indices = Vec::with_capacity(constraint.columns.len());
        for column in &constraint.columns {
            let idx = self
                .column_index(column)
                .ok_or_else(|| EngineError::unknown_column(&self.name, column))?;
            indices.push(idx);
        }

        for (ordinal, existing) in self.rows.iter().enumerate() {
            if skip == Some(ordinal) {
                continue;
            }
            let clash = indices
                .iter()
                .all(|&i| existing.get(i) == row.get(i) && row.get(i).is_some());
            if clash {
                return Err(EngineError::constraint(
                    constraint.name.clone(),
                    format!(
                        "duplicate value for columns ({})",
                        constraint.columns.join(", ")
                    ),
                ));
            }
        }
        Ok(())
    }
}

/// Projects rows onto the selected columns. `*` expands to all columns.
pub(crate) fn project(
    columns: &[String],
    rows: &[Vec<String>],
    select_columns: &[String],
) -> Result<RowSet> {
    if select_columns.is_empty() || select_columns.iter().any(|c| c == "*") {
        return Ok(RowSet {
            columns: columns.to_vec(),
            rows: rows.to_vec(),
        });
    }

    let mut indices = Vec::with_capacity(select_columns.len());
    for name in select_columns {
        let idx = resolve_column(name, columns).ok_or_else(|| {
            EngineError::Schema(format!("column '{name}' is not in the result"))
        })?;
        indices.push(idx);
    }

    let projected = rows
        .iter()
        .map(|row| {
            indices
                .iter()
                .map(|&i| row.get(i).cloned().unwrap_or_default())
                .collect()
        })
        .collect();

    Ok(RowSet {
        columns: select_columns.to_vec(),
        rows: projected,
    })
}

/// Sorts rows by the keys; numeric when every key value parses, else
/// lexicographic. Keys are applied with a stable sort, least significant
/// last.
pub(crate) fn sort_rows(
    rows: &mut [Vec<String>],
    columns: &[String],
    order_by: &[SortKey],
) -> Result<()> {
    for key in order_by.iter().rev() {
        let idx = resolve_column(&key.column, columns).ok_or_else(|| {
            EngineError::Schema(format!("unknown ORDER BY column '{}'", key.column))
        })?;

        let numeric = rows.iter().all(|row| {
            row.get(idx)
                .is_some_and(|v| v.trim().parse::<f64>().is_ok())
        }) && !rows.is_empty();

        rows.sort_by(|a, b| {
            let left = a.get(idx).map(String::as_str).unwrap_or_default();
            let right = b.get(idx).map(String::as_str).unwrap_or_default();
            let ordering = if numeric {
                let l: f64 = left.trim().parse().unwrap_or_default();
                let r: f64 = right.trim().parse().unwrap_or_default();
                l.total_cmp(&r)
            } else {
                left.cmp(right)
            };
            if key.descending {
                ordering.reverse()
            } else {
                ordering
            }
        });
    }
    Ok(())
}

/// Splits an aggregate call like `SUM(price)` into `("SUM", "price")`.
///
/// Returns `None` for anything that is not a recognized aggregate call.
#[must_use]
pub fn parse_aggregate_call(entry: &str) -> Option<(String, String)> {
    let open = entry.find('(')?;
    if !entry.ends_with(')') {
        return None;
    }
    let func = entry[..open].trim().to_uppercase();
    let arg = entry[open + 1..entry.len() - 1].trim().to_string();
    const FUNCTIONS: &[&str] = &[
        "COUNT", "SUM", "AVG", "MEAN", "MIN", "MAX", "MEDIAN", "MODE", "STDDEV", "VARIANCE",
        "STRING_CONCAT", "PERCENTILE",
    ];
    if FUNCTIONS.contains(&func.as_str()) {
        Some((func, arg))
    } else {
        None
    }
}

/// The aggregate call grammar has no parameter slot, so `PERCENTILE(col)`
/// computes the 90th percentile; `aggregate::percentile` keeps the
/// explicit `p` for API callers.
const PERCENTILE_DEFAULT_P: f64 = 90.0;

fn apply_aggregate(
    func: &str,
    arg: &str,
    rows: &[Vec<String>],
    columns: &[String],
) -> Result<String> {
    if func == "COUNT" && arg == "*" {
        return Ok(rows.len().to_string());
    }

    let idx = resolve_column(arg, columns)
        .ok_or_else(|| EngineError::Schema(format!("unknown aggregate column '{arg}'")))?;
    let values: Vec<String> = rows
        .iter()
        .map(|row| row.get(idx).cloned().unwrap_or_default())
        .collect();

    Ok(match func {
        "COUNT" => aggregate::count(&values, false).to_string(),
        "SUM" => aggregate::format_number(aggregate::sum(&values)),
        "AVG" | "MEAN" => aggregate::format_number(aggregate::mean(&values)),
        "MIN" => aggregate::format_number(aggregate::min(&values)),
        "MAX" => aggregate::format_number(aggregate::max(&values)),
        "MEDIAN" => aggregate::median(&values),
        "MODE" => aggregate::mode(&values),
        "STDDEV" => aggregate::format_number(aggregate::stddev(&values, true)),
        "VARIANCE" => aggregate::format_number(aggregate::variance(&values, true)),
        "STRING_CONCAT" => aggregate::string_concat(&values, ","),
        "PERCENTILE" => {
            aggregate::format_number(aggregate::percentile(&values, PERCENTILE_DEFAULT_P))
        }
        other => {
            return Err(EngineError::Schema(format!(
                "unknown aggregate function '{other}'"
            )))
        }
    })
}

struct AggregateRewrite {
    condition: String,
    calls: Vec<(String, String, String)>,
}

/// Replaces aggregate calls in a HAVING condition with placeholder column
/// names so the predicate grammar can parse it. The placeholders are bound
/// per group during evaluation.
fn rewrite_aggregate_calls(condition: &str) -> AggregateRewrite {
    let pattern = Regex::new(
        r"(?i)\b(COUNT|SUM|AVG|MEAN|MIN|MAX|MEDIAN|MODE|STDDEV|VARIANCE|STRING_CONCAT|PERCENTILE)\s*\(\s*([\w.*]*)\s*\)",
    )
    .expect("aggregate call pattern is valid");

    let mut calls = Vec::new();
    let rewritten = pattern
        .replace_all(condition, |caps: &regex::Captures<'_>| {
            let placeholder = format!("__agg{}", calls.len());
            calls.push((
                placeholder.clone(),
                caps[1].to_uppercase(),
                caps[2].to_string(),
            ));
            placeholder
        })
        .into_owned();

    AggregateRewrite {
        condition: rewritten,
        calls,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::DataType;

    fn registry() -> ForeignKeyRegistry {
        ForeignKeyRegistry::new()
    }

    fn sample_table() -> Table {
        let mut table = Table::new("emp");
        table
            .add_column(Column::new("name", DataType::Varchar).not_null())
            .unwrap();
        table.add_column(Column::new("dept", DataType::Varchar)).unwrap();
        table.add_column(Column::new("salary", DataType::Integer)).unwrap();
        let fk = registry();
        for (name, dept, salary) in [
            ("ann", "eng", "100"),
            ("bob", "eng", "80"),
            ("cid", "ops", "60"),
        ] {
            table
                .add_row(
                    vec![name.to_string(), dept.to_string(), salary.to_string()],
                    &fk,
                )
                .unwrap();
        }
        table
    }

    fn row(values: &[&str]) -> Vec<String> {
        values.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_add_row_checks_length() {
        let mut table = sample_table();
        let err = table.add_row(row(&["x", "y"]), &registry()).unwrap_err();
        assert!(matches!(err, EngineError::Schema(_)));
        assert_eq!(table.row_count(), 3);
    }

    #[test]
    fn test_row_id_advances() {
        let mut table = sample_table();
        assert_eq!(table.next_row_id(), 4);
        let id = table.add_row(row(&["dan", "ops", "70"]), &registry()).unwrap();
        assert_eq!(id, 4);
        assert_eq!(table.next_row_id(), 5);
    }

    #[test]
    fn test_not_null_column_flag() {
        let mut table = sample_table();
        let err = table.add_row(row(&["", "eng", "50"]), &registry()).unwrap_err();
        assert!(matches!(err, EngineError::Constraint { .. }));
        // "null" spelled out is also NULL.
        let err = table
            .add_row(row(&["NULL", "eng", "50"]), &registry())
            .unwrap_err();
        assert!(matches!(err, EngineError::Constraint { .. }));
    }

    #[test]
    fn test_unique_constraint() {
        let mut table = sample_table();
        table
            .add_constraint(Constraint::unique("u_name", vec!["name".into()]))
            .unwrap();
        let err = table
            .add_row(row(&["ann", "ops", "90"]), &registry())
            .unwrap_err();
        match err {
            EngineError::Constraint { constraint, .. } => assert_eq!(constraint, "u_name"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_primary_key_is_unique_and_not_null() {
        let mut table = Table::new("t");
        table.add_column(Column::new("id", DataType::Integer)).unwrap();
        table
            .add_constraint(Constraint::primary_key("pk_t", vec!["id".into()]))
            .unwrap();
        let fk = registry();
        table.add_row(row(&["1"]), &fk).unwrap();
        assert!(table.add_row(row(&["1"]), &fk).is_err());
        assert!(table.add_row(row(&[""]), &fk).is_err());
        assert!(table.add_row(row(&["2"]), &fk).is_ok());
    }

    #[test]
    fn test_check_constraint() {
        let mut table = sample_table();
        table
            .add_constraint(Constraint::check("chk_salary", "salary > 0"))
            .unwrap();
        assert!(table.add_row(row(&["eve", "eng", "10"]), &registry()).is_ok());
        let err = table
            .add_row(row(&["fay", "eng", "-5"]), &registry())
            .unwrap_err();
        match err {
            EngineError::Constraint { constraint, .. } => assert_eq!(constraint, "chk_salary"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_update_rows_validates_rewritten_row() {
        let mut table = sample_table();
        table
            .add_constraint(Constraint::check("chk_salary", "salary > 0"))
            .unwrap();
        let updated = table
            .update_rows(
                &[("salary".into(), "90".into())],
                "dept = 'eng'",
                &registry(),
            )
            .unwrap();
        assert_eq!(updated, 2);
        assert_eq!(table.rows()[0][2], "90");
        assert_eq!(table.rows()[2][2], "60");

        let err = table
            .update_rows(&[("salary".into(), "-1".into())], "name = 'cid'", &registry())
            .unwrap_err();
        assert!(matches!(err, EngineError::Constraint { .. }));
    }

    #[test]
    fn test_update_allows_rewriting_unique_row_in_place() {
        let mut table = Table::new("t");
        table.add_column(Column::new("id", DataType::Integer)).unwrap();
        table.add_column(Column::new("v", DataType::Varchar)).unwrap();
        table
            .add_constraint(Constraint::primary_key("pk_t", vec!["id".into()]))
            .unwrap();
        let fk = registry();
        table.add_row(row(&["1", "a"]), &fk).unwrap();
        // Touching the row without changing the key must not trip the
        // uniqueness scan against itself.
        let updated = table
            .update_rows(&[("v".into(), "b".into())], "id = 1", &fk)
            .unwrap();
        assert_eq!(updated, 1);
    }

    #[test]
    fn test_delete_rows_returns_removed() {
        let mut table = sample_table();
        let removed = table.delete_rows("dept = 'eng'").unwrap();
        assert_eq!(removed.len(), 2);
        assert_eq!(table.row_count(), 1);
        assert_eq!(table.rows()[0][0], "cid");
    }

    #[test]
    fn test_select_wildcard_and_condition() {
        let table = sample_table();
        let result = table
            .select_rows(&["*".into()], "salary > 70", &[], &[], "")
            .unwrap();
        assert_eq!(result.columns, vec!["name", "dept", "salary"]);
        assert_eq!(result.rows.len(), 2);
    }

    #[test]
    fn test_select_projection() {
        let table = sample_table();
        let result = table
            .select_rows(&["name".into()], "", &[], &[], "")
            .unwrap();
        assert_eq!(result.columns, vec!["name"]);
        assert_eq!(result.rows, vec![row(&["ann"]), row(&["bob"]), row(&["cid"])]);
    }

    #[test]
    fn test_order_by_numeric_and_desc() {
        let table = sample_table();
        let result = table
            .select_rows(
                &["name".into()],
                "",
                &[SortKey::desc("salary")],
                &[],
                "",
            )
            .unwrap();
        assert_eq!(result.rows, vec![row(&["ann"]), row(&["bob"]), row(&["cid"])]);

        let result = table
            .select_rows(&["name".into()], "", &[SortKey::asc("name")], &[], "")
            .unwrap();
        assert_eq!(result.rows[0], row(&["ann"]));
    }

    #[test]
    fn test_numeric_sort_wins_over_lexicographic() {
        let mut table = Table::new("t");
        table.add_column(Column::new("x", DataType::Integer)).unwrap();
        let fk = registry();
        for v in ["10", "9", "100"] {
            table.add_row(row(&[v]), &fk).unwrap();
        }
        let result = table
            .select_rows(&["x".into()], "", &[SortKey::asc("x")], &[], "")
            .unwrap();
        assert_eq!(result.rows, vec![row(&["9"]), row(&["10"]), row(&["100"])]);
    }

    #[test]
    fn test_group_by_with_aggregates() {
        let table = sample_table();
        let result = table
            .select_rows(
                &["dept".into(), "COUNT(*)".into(), "SUM(salary)".into()],
                "",
                &[],
                &["dept".into()],
                "",
            )
            .unwrap();
        assert_eq!(result.columns, vec!["dept", "COUNT(*)", "SUM(salary)"]);
        assert_eq!(result.rows.len(), 2);
        assert_eq!(result.rows[0], row(&["eng", "2", "180"]));
        assert_eq!(result.rows[1], row(&["ops", "1", "60"]));
    }

    #[test]
    fn test_having_filters_groups() {
        let table = sample_table();
        let result = table
            .select_rows(
                &["dept".into(), "COUNT(*)".into()],
                "",
                &[],
                &["dept".into()],
                "COUNT(*) > 1",
            )
            .unwrap();
        assert_eq!(result.rows, vec![row(&["eng", "2"])]);
    }

    #[test]
    fn test_aggregate_without_group_by_folds_all_rows() {
        let table = sample_table();
        let result = table
            .select_rows(&["COUNT(*)".into()], "", &[], &[], "")
            .unwrap();
        assert_eq!(result.rows, vec![row(&["3"])]);
        let result = table
            .select_rows(&["MEDIAN(salary)".into()], "", &[], &[], "")
            .unwrap();
        assert_eq!(result.rows, vec![row(&["80"])]);
    }

    #[test]
    fn test_percentile_defaults_to_90th() {
        let table = sample_table();
        // Salaries 100, 80, 60: rank 1.8 interpolates 80 and 100.
        let result = table
            .select_rows(&["PERCENTILE(salary)".into()], "", &[], &[], "")
            .unwrap();
        assert_eq!(result.rows, vec![row(&["96"])]);
    }

    #[test]
    fn test_schema_mutations_keep_rows_aligned() {
        let mut table = sample_table();
        table.add_column(Column::new("note", DataType::Text)).unwrap();
        assert!(table.rows().iter().all(|r| r.len() == 4));
        assert_eq!(table.rows()[0][3], "");

        table.drop_column("dept").unwrap();
        assert!(table.rows().iter().all(|r| r.len() == 3));
        assert_eq!(table.rows()[0][0], "ann");
        assert_eq!(table.rows()[0][1], "100");

        table.rename_column("note", "comment").unwrap();
        assert!(table.has_column("comment"));
        assert!(table.rename_column("comment", "NAME").is_err());
    }
}
