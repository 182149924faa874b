//! Statement-level command parsing.
//!
//! The shell grammar is deliberately simple: the first keywords classify
//! the statement, clause keywords (WHERE, GROUP BY, ...) split the rest.
//! Predicate strings are passed through verbatim for the engine's
//! predicate parser.

use anyhow::{anyhow, bail, Result};

use opal_engine::{Column, Constraint, DataType, JoinType, SortKey};

/// A join clause within a SELECT.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinSpec {
    /// Join algorithm.
    pub join_type: JoinType,
    /// Right-hand table.
    pub right: String,
    /// ON condition (empty for NATURAL).
    pub condition: String,
}

/// A parsed shell statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    CreateTable {
        name: String,
        columns: Vec<Column>,
        constraints: Vec<Constraint>,
    },
    DropTable {
        name: String,
    },
    AlterAddColumn {
        table: String,
        column: Column,
    },
    AlterDropColumn {
        table: String,
        column: String,
    },
    AlterRenameColumn {
        table: String,
        old: String,
        new: String,
    },
    Insert {
        table: String,
        rows: Vec<Vec<String>>,
    },
    Select {
        table: String,
        join: Option<JoinSpec>,
        columns: Vec<String>,
        condition: String,
        group_by: Vec<String>,
        having: String,
        order_by: Vec<SortKey>,
    },
    Update {
        table: String,
        assignments: Vec<(String, String)>,
        condition: String,
    },
    Delete {
        table: String,
        condition: String,
    },
    Truncate {
        table: String,
    },
    RenameTable {
        old: String,
        new: String,
    },
    Begin,
    Commit,
    Rollback,
    Savepoint {
        name: String,
    },
    CreateIndex {
        name: String,
        table: String,
        column: String,
    },
    DropIndex {
        name: String,
    },
    CreateView {
        name: String,
        definition: String,
    },
    DropView {
        name: String,
    },
    CreateType {
        name: String,
        attributes: Vec<(String, String)>,
    },
    DropType {
        name: String,
    },
    CreateAssertion {
        name: String,
        condition: String,
    },
    DropAssertion {
        name: String,
    },
    CreateUser {
        name: String,
        password: String,
    },
    Grant {
        privilege: String,
        object: String,
        user: String,
        with_grant_option: bool,
    },
    Revoke {
        privilege: String,
        object: String,
        user: String,
    },
    ShowTables,
    ShowViews,
    Describe {
        name: String,
    },
    /// MERGE INTO / REPLACE INTO, both with upsert semantics.
    Upsert {
        table: String,
        rows: Vec<Vec<String>>,
    },
    Save {
        dir: String,
    },
    Load {
        dir: String,
    },
    Exit,
}

/// Parses one command line into a statement.
///
/// # Errors
///
/// Fails on unknown or malformed commands.
pub fn parse(input: &str) -> Result<Statement> {
    let input = input.trim().trim_end_matches(';').trim();
    if input.is_empty() {
        bail!("empty command");
    }
    let upper = input.to_uppercase();

    if upper == "EXIT" || upper == "QUIT" {
        return Ok(Statement::Exit);
    }
    if upper == "BEGIN" || upper == "BEGIN TRANSACTION" {
        return Ok(Statement::Begin);
    }
    if upper == "COMMIT" {
        return Ok(Statement::Commit);
    }
    if upper == "ROLLBACK" {
        return Ok(Statement::Rollback);
    }
    if upper == "SHOW TABLES" {
        return Ok(Statement::ShowTables);
    }
    if upper == "SHOW VIEWS" {
        return Ok(Statement::ShowViews);
    }
    if let Some(rest) = strip_keyword(input, "SAVEPOINT") {
        return Ok(Statement::Savepoint {
            name: rest.trim().to_string(),
        });
    }
    if let Some(rest) = strip_keyword(input, "DESCRIBE") {
        return Ok(Statement::Describe {
            name: rest.trim().to_string(),
        });
    }
    if let Some(rest) = strip_keyword(input, "SAVE") {
        return Ok(Statement::Save {
            dir: clean_value(rest),
        });
    }
    if let Some(rest) = strip_keyword(input, "LOAD") {
        return Ok(Statement::Load {
            dir: clean_value(rest),
        });
    }

    if let Some(rest) = strip_keyword(input, "CREATE TABLE") {
        return parse_create_table(rest);
    }
    if let Some(rest) = strip_keyword(input, "DROP TABLE") {
        return Ok(Statement::DropTable {
            name: rest.trim().to_string(),
        });
    }
    if let Some(rest) = strip_keyword(input, "ALTER TABLE") {
        return parse_alter_table(rest);
    }
    if let Some(rest) = strip_keyword(input, "INSERT INTO") {
        let (table, rows) = parse_values_clause(rest)?;
        return Ok(Statement::Insert { table, rows });
    }
    if let Some(rest) = strip_keyword(input, "SELECT") {
        return parse_select(rest);
    }
    if let Some(rest) = strip_keyword(input, "UPDATE") {
        return parse_update(rest);
    }
    if let Some(rest) = strip_keyword(input, "DELETE FROM") {
        let (table, condition) = split_clause(rest, "WHERE");
        return Ok(Statement::Delete {
            table: table.trim().to_string(),
            condition: condition.trim().to_string(),
        });
    }
    if let Some(rest) = strip_keyword(input, "TRUNCATE TABLE") {
        return Ok(Statement::Truncate {
            table: rest.trim().to_string(),
        });
    }
    if let Some(rest) = strip_keyword(input, "TRUNCATE") {
        return Ok(Statement::Truncate {
            table: rest.trim().to_string(),
        });
    }
    if let Some(rest) = strip_keyword(input, "RENAME TABLE") {
        let (old, new) = split_clause(rest, "TO");
        if new.trim().is_empty() {
            bail!("RENAME TABLE requires: RENAME TABLE <old> TO <new>");
        }
        return Ok(Statement::RenameTable {
            old: old.trim().to_string(),
            new: new.trim().to_string(),
        });
    }
    if let Some(rest) = strip_keyword(input, "CREATE INDEX") {
        return parse_create_index(rest);
    }
    if let Some(rest) = strip_keyword(input, "DROP INDEX") {
        return Ok(Statement::DropIndex {
            name: rest.trim().to_string(),
        });
    }
    if let Some(rest) = strip_keyword(input, "CREATE VIEW") {
        let (name, definition) = split_clause(rest, "AS");
        if definition.trim().is_empty() {
            bail!("CREATE VIEW requires: CREATE VIEW <name> AS <query>");
        }
        return Ok(Statement::CreateView {
            name: name.trim().to_string(),
            definition: definition.trim().to_string(),
        });
    }
    if let Some(rest) = strip_keyword(input, "DROP VIEW") {
        return Ok(Statement::DropView {
            name: rest.trim().to_string(),
        });
    }
    if let Some(rest) = strip_keyword(input, "CREATE TYPE") {
        return parse_create_type(rest);
    }
    if let Some(rest) = strip_keyword(input, "DROP TYPE") {
        return Ok(Statement::DropType {
            name: rest.trim().to_string(),
        });
    }
    if let Some(rest) = strip_keyword(input, "CREATE ASSERTION") {
        let (name, check) = split_clause(rest, "CHECK");
        let condition = check.trim();
        let condition = condition
            .strip_prefix('(')
            .and_then(|c| c.strip_suffix(')'))
            .unwrap_or(condition);
        return Ok(Statement::CreateAssertion {
            name: name.trim().to_string(),
            condition: condition.trim().to_string(),
        });
    }
    if let Some(rest) = strip_keyword(input, "DROP ASSERTION") {
        return Ok(Statement::DropAssertion {
            name: rest.trim().to_string(),
        });
    }
    if let Some(rest) = strip_keyword(input, "CREATE USER") {
        let (name, password) = split_clause(rest, "PASSWORD");
        if password.trim().is_empty() {
            bail!("CREATE USER requires: CREATE USER <name> PASSWORD '<password>'");
        }
        return Ok(Statement::CreateUser {
            name: name.trim().to_string(),
            password: clean_value(&password),
        });
    }
    if let Some(rest) = strip_keyword(input, "GRANT") {
        return parse_grant(rest);
    }
    if let Some(rest) = strip_keyword(input, "REVOKE") {
        return parse_revoke(rest);
    }
    if let Some(rest) = strip_keyword(input, "MERGE INTO") {
        let (table, rows) = parse_values_clause(rest)?;
        return Ok(Statement::Upsert { table, rows });
    }
    if let Some(rest) = strip_keyword(input, "REPLACE INTO") {
        let (table, rows) = parse_values_clause(rest)?;
        return Ok(Statement::Upsert { table, rows });
    }

    bail!("unrecognized command: {input}")
}

/// Strips a leading keyword (case-insensitive) followed by whitespace or
/// end of input.
fn strip_keyword<'a>(input: &'a str, keyword: &str) -> Option<&'a str> {
    if input.len() < keyword.len() {
        return None;
    }
    let (head, tail) = input.split_at(keyword.len());
    if !head.eq_ignore_ascii_case(keyword) {
        return None;
    }
    if tail.is_empty() {
        return Some(tail);
    }
    tail.starts_with(char::is_whitespace).then(|| tail.trim_start())
}

/// Splits `input` at the first top-level occurrence of a clause keyword,
/// returning `(before, after)`; `after` is empty when absent.
fn split_clause(input: &str, keyword: &str) -> (String, String) {
    let upper = input.to_uppercase();
    let needle = format!(" {} ", keyword.to_uppercase());
    let mut depth = 0usize;
    let mut in_quotes = false;
    for (i, ch) in upper.char_indices() {
        match ch {
            '\'' => in_quotes = !in_quotes,
            '(' if !in_quotes => depth += 1,
            ')' if !in_quotes => depth = depth.saturating_sub(1),
            _ => {}
        }
        if depth == 0 && !in_quotes && upper[i..].starts_with(&needle) {
            let before = input[..i].to_string();
            let after = input[i + needle.len()..].to_string();
            return (before, after);
        }
    }
    (input.to_string(), String::new())
}

/// Splits on a separator at paren depth zero, outside quotes.
fn split_top_level(input: &str, separator: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut in_quotes = false;
    for ch in input.chars() {
        match ch {
            '\'' => {
                in_quotes = !in_quotes;
                current.push(ch);
            }
            '(' if !in_quotes => {
                depth += 1;
                current.push(ch);
            }
            ')' if !in_quotes => {
                depth = depth.saturating_sub(1);
                current.push(ch);
            }
            c if c == separator && depth == 0 && !in_quotes => {
                parts.push(current.trim().to_string());
                current.clear();
            }
            c => current.push(c),
        }
    }
    if !current.trim().is_empty() {
        parts.push(current.trim().to_string());
    }
    parts
}

/// Strips surrounding single quotes; NULL becomes the empty string.
fn clean_value(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('\'') && trimmed.ends_with('\'') {
        return trimmed[1..trimmed.len() - 1].to_string();
    }
    if trimmed.eq_ignore_ascii_case("NULL") {
        return String::new();
    }
    trimmed.to_string()
}

fn body_in_parens(input: &str) -> Result<(&str, &str)> {
    let open = input
        .find('(')
        .ok_or_else(|| anyhow!("expected a parenthesized list"))?;
    let close = input
        .rfind(')')
        .ok_or_else(|| anyhow!("missing closing parenthesis"))?;
    if close < open {
        bail!("missing closing parenthesis");
    }
    Ok((input[..open].trim(), &input[open + 1..close]))
}

fn parse_create_table(rest: &str) -> Result<Statement> {
    let (name, body) = body_in_parens(rest)?;
    if name.is_empty() {
        bail!("CREATE TABLE requires a table name");
    }

    let mut columns = Vec::new();
    let mut constraints = Vec::new();
    let mut check_counter = 0usize;

    for item in split_top_level(body, ',') {
        let upper = item.to_uppercase();
        if upper.starts_with("PRIMARY KEY") {
            let (_, cols) = body_in_parens(&item)?;
            constraints.push(Constraint::primary_key(
                format!("pk_{name}"),
                split_top_level(cols, ',').into_iter().collect(),
            ));
        } else if upper.starts_with("UNIQUE(") || upper.starts_with("UNIQUE (") {
            let (_, cols) = body_in_parens(&item)?;
            let cols: Vec<String> = split_top_level(cols, ',').into_iter().collect();
            constraints.push(Constraint::unique(
                format!("uq_{name}_{}", cols.join("_")),
                cols,
            ));
        } else if upper.starts_with("CHECK(") || upper.starts_with("CHECK (") {
            let (_, expr) = body_in_parens(&item)?;
            check_counter += 1;
            constraints.push(Constraint::check(
                format!("chk_{name}_{check_counter}"),
                expr.trim(),
            ));
        } else if upper.starts_with("FOREIGN KEY") {
            constraints.push(parse_foreign_key(name, &item)?);
        } else {
            columns.push(parse_column_def(&item)?);
        }
    }

    Ok(Statement::CreateTable {
        name: name.to_string(),
        columns,
        constraints,
    })
}

fn parse_column_def(item: &str) -> Result<Column> {
    let mut words = item.split_whitespace();
    let name = words
        .next()
        .ok_or_else(|| anyhow!("empty column definition"))?;
    let type_name = words
        .next()
        .ok_or_else(|| anyhow!("column '{name}' is missing a type"))?;
    let tail: Vec<String> = words.map(str::to_uppercase).collect();
    let column = Column::new(name, DataType::parse(type_name));
    if tail.join(" ").contains("NOT NULL") {
        Ok(column.not_null())
    } else {
        Ok(column)
    }
}

fn parse_foreign_key(table: &str, item: &str) -> Result<Constraint> {
    // FOREIGN KEY (cols) REFERENCES other (cols) [ON DELETE CASCADE]
    let upper = item.to_uppercase();
    let references = upper
        .find("REFERENCES")
        .ok_or_else(|| anyhow!("FOREIGN KEY requires a REFERENCES clause"))?;

    let (_, fk_cols) = body_in_parens(&item[..references])?;
    let fk_cols: Vec<String> = split_top_level(fk_cols, ',');

    let after = &item[references + "REFERENCES".len()..];
    let (ref_table, ref_cols) = body_in_parens(after)?;
    let ref_cols: Vec<String> = split_top_level(ref_cols, ',');
    if ref_table.is_empty() {
        bail!("FOREIGN KEY REFERENCES requires a table name");
    }

    let mut constraint = Constraint::foreign_key(
        format!("fk_{table}_{ref_table}"),
        fk_cols,
        ref_table,
        ref_cols,
    );
    if upper.contains("ON DELETE CASCADE") {
        constraint = constraint.with_cascade_delete();
    }
    if upper.contains("ON UPDATE CASCADE") {
        constraint = constraint.with_cascade_update();
    }
    Ok(constraint)
}

fn parse_alter_table(rest: &str) -> Result<Statement> {
    let upper = rest.to_uppercase();
    if let Some(at) = upper.find(" ADD COLUMN ") {
        let table = rest[..at].trim().to_string();
        let column = parse_column_def(rest[at + " ADD COLUMN ".len()..].trim())?;
        return Ok(Statement::AlterAddColumn { table, column });
    }
    if let Some(at) = upper.find(" DROP COLUMN ") {
        let table = rest[..at].trim().to_string();
        let column = rest[at + " DROP COLUMN ".len()..].trim().to_string();
        return Ok(Statement::AlterDropColumn { table, column });
    }
    if let Some(at) = upper.find(" RENAME COLUMN ") {
        let table = rest[..at].trim().to_string();
        let (old, new) = split_clause(rest[at + " RENAME COLUMN ".len()..].trim(), "TO");
        if new.trim().is_empty() {
            bail!("ALTER TABLE RENAME COLUMN requires: ... RENAME COLUMN <old> TO <new>");
        }
        return Ok(Statement::AlterRenameColumn {
            table,
            old: old.trim().to_string(),
            new: new.trim().to_string(),
        });
    }
    bail!("unsupported ALTER TABLE form")
}

fn parse_values_clause(rest: &str) -> Result<(String, Vec<Vec<String>>)> {
    let (table, values) = split_clause(rest, "VALUES");
    let table = table.trim().to_string();
    if table.is_empty() || values.trim().is_empty() {
        bail!("expected: <table> VALUES (v, ...), ...");
    }

    let mut rows = Vec::new();
    for group in split_top_level(&values, ',') {
        let group = group.trim();
        let inner = group
            .strip_prefix('(')
            .and_then(|g| g.strip_suffix(')'))
            .ok_or_else(|| anyhow!("VALUES rows must be parenthesized"))?;
        rows.push(
            split_top_level(inner, ',')
                .iter()
                .map(|v| clean_value(v))
                .collect(),
        );
    }
    Ok((table, rows))
}

fn parse_select(rest: &str) -> Result<Statement> {
    let (column_part, after_from) = split_clause(rest, "FROM");
    if after_from.trim().is_empty() {
        bail!("SELECT requires a FROM clause");
    }
    let columns: Vec<String> = split_top_level(&column_part, ',');

    let (from_part, order_part) = split_clause(&after_from, "ORDER BY");
    let (from_part, having) = split_clause(&from_part, "HAVING");
    let (from_part, group_part) = split_clause(&from_part, "GROUP BY");
    let (from_part, condition) = split_clause(&from_part, "WHERE");

    let (table, join) = parse_from_clause(from_part.trim())?;

    let group_by: Vec<String> = if group_part.trim().is_empty() {
        Vec::new()
    } else {
        split_top_level(&group_part, ',')
    };

    let order_by: Vec<SortKey> = if order_part.trim().is_empty() {
        Vec::new()
    } else {
        split_top_level(&order_part, ',')
            .iter()
            .map(|entry| {
                let upper = entry.to_uppercase();
                if upper.ends_with(" DESC") {
                    SortKey::desc(entry[..entry.len() - " DESC".len()].trim())
                } else if upper.ends_with(" ASC") {
                    SortKey::asc(entry[..entry.len() - " ASC".len()].trim())
                } else {
                    SortKey::asc(entry.trim())
                }
            })
            .collect()
    };

    Ok(Statement::Select {
        table,
        join,
        columns,
        condition: condition.trim().to_string(),
        group_by,
        having: having.trim().to_string(),
        order_by,
    })
}

fn parse_from_clause(from: &str) -> Result<(String, Option<JoinSpec>)> {
    let upper = from.to_uppercase();

    const FORMS: &[(&str, JoinType)] = &[
        (" NATURAL JOIN ", JoinType::Natural),
        (" INNER JOIN ", JoinType::Inner),
        (" LEFT OUTER JOIN ", JoinType::LeftOuter),
        (" LEFT JOIN ", JoinType::LeftOuter),
        (" RIGHT OUTER JOIN ", JoinType::RightOuter),
        (" RIGHT JOIN ", JoinType::RightOuter),
        (" FULL OUTER JOIN ", JoinType::FullOuter),
        (" FULL JOIN ", JoinType::FullOuter),
        (" JOIN ", JoinType::Inner),
    ];

    for (form, join_type) in FORMS {
        if let Some(at) = upper.find(form) {
            let table = from[..at].trim().to_string();
            let tail = &from[at + form.len()..];
            let (right, condition) = split_clause(tail, "ON");
            let right = right.trim().to_string();
            if right.is_empty() {
                bail!("JOIN requires a right-hand table");
            }
            return Ok((
                table,
                Some(JoinSpec {
                    join_type: *join_type,
                    right,
                    condition: condition.trim().to_string(),
                }),
            ));
        }
    }

    Ok((from.to_string(), None))
}

fn parse_update(rest: &str) -> Result<Statement> {
    let (table, after_set) = split_clause(rest, "SET");
    if after_set.trim().is_empty() {
        bail!("UPDATE requires a SET clause");
    }
    let (assign_part, condition) = split_clause(&after_set, "WHERE");

    let mut assignments = Vec::new();
    for entry in split_top_level(&assign_part, ',') {
        let (column, value) = entry
            .split_once('=')
            .ok_or_else(|| anyhow!("malformed assignment '{entry}'"))?;
        assignments.push((column.trim().to_string(), clean_value(value)));
    }

    Ok(Statement::Update {
        table: table.trim().to_string(),
        assignments,
        condition: condition.trim().to_string(),
    })
}

fn parse_create_index(rest: &str) -> Result<Statement> {
    // CREATE INDEX name ON table (column)
    let (name, on_part) = split_clause(rest, "ON");
    if on_part.trim().is_empty() {
        bail!("CREATE INDEX requires: CREATE INDEX <name> ON <table> (<column>)");
    }
    let (table, column) = body_in_parens(&on_part)?;
    Ok(Statement::CreateIndex {
        name: name.trim().to_string(),
        table: table.to_string(),
        column: column.trim().to_string(),
    })
}

fn parse_create_type(rest: &str) -> Result<Statement> {
    // CREATE TYPE name AS (attr TYPE, ...)
    let (name, as_part) = split_clause(rest, "AS");
    if as_part.trim().is_empty() {
        bail!("CREATE TYPE requires: CREATE TYPE <name> AS (<attr> <type>, ...)");
    }
    let (_, body) = body_in_parens(&as_part)?;
    let mut attributes = Vec::new();
    for item in split_top_level(body, ',') {
        let mut words = item.split_whitespace();
        let attr = words
            .next()
            .ok_or_else(|| anyhow!("empty type attribute"))?;
        let type_name = words
            .next()
            .ok_or_else(|| anyhow!("attribute '{attr}' is missing a type"))?;
        attributes.push((attr.to_string(), type_name.to_string()));
    }
    Ok(Statement::CreateType {
        name: name.trim().to_string(),
        attributes,
    })
}

fn parse_grant(rest: &str) -> Result<Statement> {
    // GRANT priv ON object TO user [WITH GRANT OPTION]
    let (privilege, on_part) = split_clause(rest, "ON");
    let (object, to_part) = split_clause(&on_part, "TO");
    if to_part.trim().is_empty() {
        bail!("GRANT requires: GRANT <privilege> ON <object> TO <user>");
    }
    let upper = to_part.to_uppercase();
    let with_grant_option = upper.contains("WITH GRANT OPTION");
    let user = if with_grant_option {
        let at = upper.find("WITH GRANT OPTION").unwrap_or(to_part.len());
        to_part[..at].trim().to_string()
    } else {
        to_part.trim().to_string()
    };
    Ok(Statement::Grant {
        privilege: privilege.trim().to_string(),
        object: object.trim().to_string(),
        user,
        with_grant_option,
    })
}

fn parse_revoke(rest: &str) -> Result<Statement> {
    // REVOKE priv ON object FROM user
    let (privilege, on_part) = split_clause(rest, "ON");
    let (object, from_part) = split_clause(&on_part, "FROM");
    if from_part.trim().is_empty() {
        bail!("REVOKE requires: REVOKE <privilege> ON <object> FROM <user>");
    }
    Ok(Statement::Revoke {
        privilege: privilege.trim().to_string(),
        object: object.trim().to_string(),
        user: from_part.trim().to_string(),
    })
}
