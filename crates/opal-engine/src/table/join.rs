//! Join algorithms and set operations over result tables.
//!
//! Every join takes two tables and a condition string. The combined row is
//! left columns followed by right columns, labeled in qualified
//! `table.column` form; conditions and projections resolve plain names by
//! qualified-suffix match.

use std::fmt;

use super::{project, RowSet, Table};
use crate::error::{EngineError, Result};
use crate::predicate::parse_predicate;

/// Join type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    /// INNER JOIN.
    Inner,
    /// LEFT OUTER JOIN.
    LeftOuter,
    /// RIGHT OUTER JOIN.
    RightOuter,
    /// FULL OUTER JOIN.
    FullOuter,
    /// NATURAL JOIN (the condition is ignored).
    Natural,
}

impl JoinType {
    /// Returns the SQL spelling.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Inner => "INNER",
            Self::LeftOuter => "LEFT OUTER",
            Self::RightOuter => "RIGHT OUTER",
            Self::FullOuter => "FULL OUTER",
            Self::Natural => "NATURAL",
        }
    }

    /// Parses a join-type name case-insensitively.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_uppercase().replace(" JOIN", "").trim() {
            "INNER" | "" => Some(Self::Inner),
            "LEFT" | "LEFT OUTER" => Some(Self::LeftOuter),
            "RIGHT" | "RIGHT OUTER" => Some(Self::RightOuter),
            "FULL" | "FULL OUTER" => Some(Self::FullOuter),
            "NATURAL" => Some(Self::Natural),
            _ => None,
        }
    }
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dispatches to the join algorithm for `join_type`.
///
/// # Errors
///
/// Fails when the condition does not parse or a selected column is
/// unknown.
pub fn join(
    left: &Table,
    right: &Table,
    join_type: JoinType,
    condition: &str,
    select_columns: &[String],
) -> Result<RowSet> {
    match join_type {
        JoinType::Inner => inner_join(left, right, condition, select_columns),
        JoinType::LeftOuter => left_outer_join(left, right, condition, select_columns),
        JoinType::RightOuter => right_outer_join(left, right, condition, select_columns),
        JoinType::FullOuter => full_outer_join(left, right, condition, select_columns),
        JoinType::Natural => natural_join(left, right, select_columns),
    }
}

fn qualified_columns(table: &Table) -> Vec<String> {
    table
        .columns()
        .iter()
        .map(|c| format!("{}.{}", table.name(), c.name))
        .collect()
}

fn combined_columns(left: &Table, right: &Table) -> Vec<String> {
    let mut columns = qualified_columns(left);
    columns.extend(qualified_columns(right));
    columns
}

fn combine(left_row: &[String], right_row: &[String]) -> Vec<String> {
    let mut row = left_row.to_vec();
    row.extend_from_slice(right_row);
    row
}

fn null_row(len: usize) -> Vec<String> {
    vec![String::new(); len]
}

/// INNER JOIN: the cross product filtered by the condition.
///
/// # Errors
///
/// Fails when the condition does not parse or a selected column is
/// unknown.
pub fn inner_join(
    left: &Table,
    right: &Table,
    condition: &str,
    select_columns: &[String],
) -> Result<RowSet> {
    let columns = combined_columns(left, right);
    let expr = parse_predicate(condition)?;

    let mut rows = Vec::new();
    for left_row in left.rows() {
        for right_row in right.rows() {
            let combined = combine(left_row, right_row);
            if expr.evaluate(&combined, &columns) {
                rows.push(combined);
            }
        }
    }
    project(&columns, &rows, select_columns)
}

/// LEFT OUTER JOIN: every left row, with NULLs for unmatched right
/// columns.
///
/// # Errors
///
/// Fails when the condition does not parse or a selected column is
/// unknown.
pub fn left_outer_join(
    left: &Table,
    right: &Table,
    condition: &str,
    select_columns: &[String],
) -> Result<RowSet> {
    let columns = combined_columns(left, right);
    let expr = parse_predicate(condition)?;

    let mut rows = Vec::new();
    for left_row in left.rows() {
        let mut matched = false;
        for right_row in right.rows() {
            let combined = combine(left_row, right_row);
            if expr.evaluate(&combined, &columns) {
                rows.push(combined);
                matched = true;
            }
        }
        if !matched {
            rows.push(combine(left_row, &null_row(right.columns().len())));
        }
    }
    project(&columns, &rows, select_columns)
}

/// RIGHT OUTER JOIN: every right row, with NULLs for unmatched left
/// columns.
///
/// # Errors
///
/// Fails when the condition does not parse or a selected column is
/// unknown.
pub fn right_outer_join(
    left: &Table,
    right: &Table,
    condition: &str,
    select_columns: &[String],
) -> Result<RowSet> {
    let columns = combined_columns(left, right);
    let expr = parse_predicate(condition)?;

    let mut rows = Vec::new();
    for right_row in right.rows() {
        let mut matched = false;
        for left_row in left.rows() {
            let combined = combine(left_row, right_row);
            if expr.evaluate(&combined, &columns) {
                rows.push(combined);
                matched = true;
            }
        }
        if !matched {
            rows.push(combine(&null_row(left.columns().len()), right_row));
        }
    }
    project(&columns, &rows, select_columns)
}

/// FULL OUTER JOIN: the union of LEFT and RIGHT with matched pairs
/// de-duplicated.
///
/// # Errors
///
/// Fails when the condition does not parse or a selected column is
/// unknown.
pub fn full_outer_join(
    left: &Table,
    right: &Table,
    condition: &str,
    select_columns: &[String],
) -> Result<RowSet> {
    let columns = combined_columns(left, right);
    let expr = parse_predicate(condition)?;

    let mut rows = Vec::new();
    let mut right_matched = vec![false; right.rows().len()];

    for left_row in left.rows() {
        let mut matched = false;
        for (j, right_row) in right.rows().iter().enumerate() {
            let combined = combine(left_row, right_row);
            if expr.evaluate(&combined, &columns) {
                rows.push(combined);
                matched = true;
                right_matched[j] = true;
            }
        }
        if !matched {
            rows.push(combine(left_row, &null_row(right.columns().len())));
        }
    }
    for (j, right_row) in right.rows().iter().enumerate() {
        if !right_matched[j] {
            rows.push(combine(&null_row(left.columns().len()), right_row));
        }
    }
    project(&columns, &rows, select_columns)
}

/// NATURAL JOIN: an equi-join on every same-named column, with shared
/// columns appearing once in the output.
///
/// # Errors
///
/// Fails when a selected column is unknown.
pub fn natural_join(left: &Table, right: &Table, select_columns: &[String]) -> Result<RowSet> {
    // Pair up same-named columns (case-insensitive).
    let mut common: Vec<(usize, usize)> = Vec::new();
    for (i, lcol) in left.columns().iter().enumerate() {
        if let Some(j) = right.column_index(&lcol.name) {
            common.push((i, j));
        }
    }

    let right_kept: Vec<usize> = (0..right.columns().len())
        .filter(|j| !common.iter().any(|(_, cj)| cj == j))
        .collect();

    let mut columns = qualified_columns(left);
    let right_qualified = qualified_columns(right);
    for &j in &right_kept {
        columns.push(right_qualified[j].clone());
    }

    let mut rows = Vec::new();
    for left_row in left.rows() {
        for right_row in right.rows() {
            let all_match = common
                .iter()
                .all(|&(i, j)| left_row.get(i) == right_row.get(j));
            if all_match {
                let mut row = left_row.clone();
                for &j in &right_kept {
                    row.push(right_row.get(j).cloned().unwrap_or_default());
                }
                rows.push(row);
            }
        }
    }
    project(&columns, &rows, select_columns)
}

fn check_compatible(left: &RowSet, right: &RowSet) -> Result<()> {
    if left.columns.len() != right.columns.len() {
        return Err(EngineError::Schema(format!(
            "set operation arity mismatch: {} vs {} columns",
            left.columns.len(),
            right.columns.len()
        )));
    }
    Ok(())
}

/// UNION / UNION ALL. Row equality is element-wise string equality.
///
/// # Errors
///
/// Fails on a column-count mismatch.
pub fn set_union(left: &RowSet, right: &RowSet, all: bool) -> Result<RowSet> {
    check_compatible(left, right)?;
    let mut rows = left.rows.clone();
    rows.extend(right.rows.iter().cloned());
    if !all {
        let mut seen: Vec<Vec<String>> = Vec::new();
        rows.retain(|row| {
            if seen.contains(row) {
                false
            } else {
                seen.push(row.clone());
                true
            }
        });
    }
    Ok(RowSet {
        columns: left.columns.clone(),
        rows,
    })
}

/// INTERSECT: rows present in both inputs, distinct.
///
/// # Errors
///
/// Fails on a column-count mismatch.
pub fn set_intersect(left: &RowSet, right: &RowSet) -> Result<RowSet> {
    check_compatible(left, right)?;
    let mut rows = Vec::new();
    for row in &left.rows {
        if right.rows.contains(row) && !rows.contains(row) {
            rows.push(row.clone());
        }
    }
    Ok(RowSet {
        columns: left.columns.clone(),
        rows,
    })
}

/// EXCEPT: rows of the left input absent from the right, distinct.
///
/// # Errors
///
/// Fails on a column-count mismatch.
pub fn set_except(left: &RowSet, right: &RowSet) -> Result<RowSet> {
    check_compatible(left, right)?;
    let mut rows = Vec::new();
    for row in &left.rows {
        if !right.rows.contains(row) && !rows.contains(row) {
            rows.push(row.clone());
        }
    }
    Ok(RowSet {
        columns: left.columns.clone(),
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fk::ForeignKeyRegistry;
    use crate::schema::{Column, DataType};

    fn row(values: &[&str]) -> Vec<String> {
        values.iter().map(ToString::to_string).collect()
    }

    fn table(name: &str, columns: &[&str], rows: &[&[&str]]) -> Table {
        let mut t = Table::new(name);
        for c in columns {
            t.add_column(Column::new(*c, DataType::Varchar)).unwrap();
        }
        let fk = ForeignKeyRegistry::new();
        for r in rows {
            t.add_row(r.iter().map(ToString::to_string).collect(), &fk)
                .unwrap();
        }
        t
    }

    fn users() -> Table {
        table(
            "users",
            &["id", "name"],
            &[&["1", "ann"], &["2", "bob"], &["3", "cid"]],
        )
    }

    fn orders() -> Table {
        table(
            "orders",
            &["uid", "item"],
            &[&["1", "pen"], &["1", "ink"], &["2", "pad"], &["9", "gum"]],
        )
    }

    #[test]
    fn test_inner_join() {
        let result = inner_join(
            &users(),
            &orders(),
            "users.id = orders.uid",
            &["name".into(), "item".into()],
        )
        .unwrap();
        assert_eq!(
            result.rows,
            vec![row(&["ann", "pen"]), row(&["ann", "ink"]), row(&["bob", "pad"])]
        );
    }

    #[test]
    fn test_left_outer_join_pads_with_nulls() {
        let result = left_outer_join(
            &users(),
            &orders(),
            "users.id = orders.uid",
            &["name".into(), "item".into()],
        )
        .unwrap();
        assert_eq!(result.rows.len(), 4);
        assert_eq!(result.rows[3], row(&["cid", ""]));
    }

    #[test]
    fn test_right_outer_join_pads_with_nulls() {
        let result = right_outer_join(
            &users(),
            &orders(),
            "users.id = orders.uid",
            &["name".into(), "item".into()],
        )
        .unwrap();
        assert_eq!(result.rows.len(), 4);
        assert_eq!(result.rows[3], row(&["", "gum"]));
    }

    #[test]
    fn test_full_outer_join_dedups_matches() {
        let result = full_outer_join(
            &users(),
            &orders(),
            "users.id = orders.uid",
            &["name".into(), "item".into()],
        )
        .unwrap();
        // 3 matches + unmatched cid + unmatched gum.
        assert_eq!(result.rows.len(), 5);
        assert!(result.rows.contains(&row(&["cid", ""])));
        assert!(result.rows.contains(&row(&["", "gum"])));
    }

    #[test]
    fn test_natural_join_on_shared_column() {
        let left = table("l", &["id", "a"], &[&["1", "x"], &["2", "y"]]);
        let right = table("r", &["id", "b"], &[&["1", "p"], &["3", "q"]]);
        let result = natural_join(&left, &right, &["*".into()]).unwrap();
        assert_eq!(result.columns, vec!["l.id", "l.a", "r.b"]);
        assert_eq!(result.rows, vec![row(&["1", "x", "p"])]);
    }

    #[test]
    fn test_qualified_projection_disambiguates() {
        let left = table("l", &["id"], &[&["1"]]);
        let right = table("r", &["id"], &[&["1"]]);
        let result = inner_join(&left, &right, "l.id = r.id", &["r.id".into()]).unwrap();
        assert_eq!(result.columns, vec!["r.id"]);
        assert_eq!(result.rows, vec![row(&["1"])]);
    }

    fn rowset(columns: &[&str], rows: &[&[&str]]) -> RowSet {
        RowSet {
            columns: columns.iter().map(ToString::to_string).collect(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(ToString::to_string).collect())
                .collect(),
        }
    }

    #[test]
    fn test_union_distinct_and_all() {
        let a = rowset(&["x"], &[&["1"], &["2"]]);
        let b = rowset(&["x"], &[&["2"], &["3"]]);
        assert_eq!(
            set_union(&a, &b, false).unwrap().rows,
            vec![row(&["1"]), row(&["2"]), row(&["3"])]
        );
        assert_eq!(set_union(&a, &b, true).unwrap().rows.len(), 4);
    }

    #[test]
    fn test_union_commutative_modulo_ordering() {
        let a = rowset(&["x"], &[&["1"], &["2"]]);
        let b = rowset(&["x"], &[&["3"]]);
        let mut ab = set_union(&a, &b, false).unwrap().rows;
        let mut ba = set_union(&b, &a, false).unwrap().rows;
        ab.sort();
        ba.sort();
        assert_eq!(ab, ba);
    }

    #[test]
    fn test_intersect_and_except() {
        let a = rowset(&["x"], &[&["1"], &["2"], &["2"], &["3"]]);
        let b = rowset(&["x"], &[&["2"], &["3"], &["4"]]);
        assert_eq!(
            set_intersect(&a, &b).unwrap().rows,
            vec![row(&["2"]), row(&["3"])]
        );
        assert_eq!(set_except(&a, &b).unwrap().rows, vec![row(&["1"])]);
    }

    #[test]
    fn test_arity_mismatch_rejected() {
        let a = rowset(&["x"], &[&["1"]]);
        let b = rowset(&["x", "y"], &[&["1", "2"]]);
        assert!(set_union(&a, &b, false).is_err());
    }
}
